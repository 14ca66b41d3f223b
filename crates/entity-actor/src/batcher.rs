//! # Write-Behind Batcher
//!
//! Turns an actor's append-only log of applied records into batched writes against a
//! [`RecordSink`] without ever blocking the actor's request loop.
//!
//! ## Triggers
//! - **Debounce**: the first record entering an empty queue arms a timer of
//!   `flush_interval`. When it fires, whatever is pending gets flushed.
//! - **Size**: reaching `flush_threshold` pending records flushes immediately.
//!
//! ## Flow
//! The batcher is owned by the actor task. Starting a flush moves at most
//! `flush_threshold` records out of the queue and spawns a task that writes them under
//! `flush_timeout`. The outcome comes back on a channel that the actor loop polls, and
//! only then is the queue touched again: records the sink did not commit go back to the
//! front, ahead of anything that arrived meanwhile. At most one flush is in flight.

use crate::config::ActorConfig;
use crate::entity::ActorEntity;
use crate::sink::RecordSink;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Result of one flush attempt, reported back to the owning actor.
#[derive(Debug)]
pub struct FlushOutcome<R> {
    /// Size of the batch that was attempted.
    pub attempted: usize,
    /// Uncommitted records, in their original order.
    pub retry: Vec<R>,
    /// Why the flush failed, if it did.
    pub error: Option<String>,
}

impl<R> FlushOutcome<R> {
    pub fn committed(&self) -> usize {
        self.attempted - self.retry.len()
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-actor write-behind queue.
pub struct WriteBehind<T: ActorEntity> {
    sink: Arc<dyn RecordSink<T>>,
    pending: VecDeque<T::Record>,
    in_flight: Option<Vec<T::Record>>,
    deadline: Option<Instant>,
    /// Set by a failed flush; the size trigger stays off until the next flush starts.
    backoff: bool,
    threshold: usize,
    interval: Duration,
    timeout: Duration,
    done_tx: mpsc::UnboundedSender<FlushOutcome<T::Record>>,
    done_rx: mpsc::UnboundedReceiver<FlushOutcome<T::Record>>,
}

impl<T: ActorEntity> WriteBehind<T> {
    pub fn new(sink: Arc<dyn RecordSink<T>>, config: &ActorConfig) -> Self {
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        Self {
            sink,
            pending: VecDeque::new(),
            in_flight: None,
            deadline: None,
            backoff: false,
            threshold: config.flush_threshold.max(1),
            interval: config.flush_interval,
            timeout: config.flush_timeout,
            done_tx,
            done_rx,
        }
    }

    /// Appends a freshly applied record.
    pub fn push(&mut self, record: T::Record) {
        self.pending.push_back(record);
        self.arm();
    }

    /// Puts records recovered from a snapshot back in the queue, oldest first.
    pub fn restore(&mut self, records: Vec<T::Record>) {
        if records.is_empty() {
            return;
        }
        self.pending.extend(records);
        self.arm();
    }

    fn arm(&mut self) {
        if self.deadline.is_none() {
            self.deadline = Some(Instant::now() + self.interval);
        }
    }

    /// When the debounce timer fires, if armed.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The size trigger: enough records queued, nothing in flight, and no failure
    /// waiting out its debounce interval.
    pub fn threshold_reached(&self) -> bool {
        !self.backoff && self.in_flight.is_none() && self.pending.len() >= self.threshold
    }

    /// A failed flush is waiting for the debounce timer before the next attempt.
    pub fn is_backing_off(&self) -> bool {
        self.backoff
    }

    pub fn is_flushing(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.as_ref().map_or(0, Vec::len)
    }

    /// Every record not yet committed downstream, oldest first.
    pub fn uncommitted(&self) -> Vec<T::Record> {
        self.in_flight
            .iter()
            .flatten()
            .chain(self.pending.iter())
            .cloned()
            .collect()
    }

    fn take_batch(&mut self) -> Vec<T::Record> {
        let size = self.pending.len().min(self.threshold);
        self.pending.drain(..size).collect()
    }

    /// Starts a background flush. Returns `false` if one is already running or there is
    /// nothing to flush.
    pub fn start(&mut self, id: &T::Id) -> bool {
        self.deadline = None;
        self.backoff = false;
        if self.in_flight.is_some() || self.pending.is_empty() {
            return false;
        }
        let batch = self.take_batch();
        self.in_flight = Some(batch.clone());
        debug!(%id, records = batch.len(), queued = self.pending.len(), "Flush started");

        let sink = Arc::clone(&self.sink);
        let done = self.done_tx.clone();
        let id = id.clone();
        let timeout = self.timeout;
        tokio::spawn(async move {
            let outcome = flush_batch(sink.as_ref(), &id, batch, timeout).await;
            let _ = done.send(outcome);
        });
        true
    }

    /// Waits for the in-flight flush to report back. Pending forever when idle, so it can
    /// sit in a `select!`.
    pub async fn next_outcome(&mut self) -> Option<FlushOutcome<T::Record>> {
        if self.in_flight.is_none() {
            return std::future::pending().await;
        }
        self.done_rx.recv().await
    }

    /// Merges a flush outcome back into the queue.
    pub fn complete(&mut self, id: &T::Id, outcome: FlushOutcome<T::Record>) {
        self.in_flight = None;
        let committed = outcome.committed();
        match &outcome.error {
            None => debug!(%id, committed, queued = self.pending.len(), "Flush complete"),
            Some(error) => warn!(
                %id,
                committed,
                requeued = outcome.retry.len(),
                error = %error,
                "Flush failed, records re-queued"
            ),
        }
        let failed = !outcome.is_success();
        for record in outcome.retry.into_iter().rev() {
            self.pending.push_front(record);
        }
        if failed {
            // Only the debounce timer (or an explicit flush) retries a failing sink.
            self.backoff = true;
            self.deadline = Some(Instant::now() + self.interval);
        } else if !self.pending.is_empty() {
            self.arm();
        }
    }

    /// Flushes everything synchronously, used when the actor stops.
    ///
    /// Waits for the in-flight flush first, then writes the queue batch by batch until it
    /// is empty or a batch fails. Returns how many records remain uncommitted.
    pub async fn drain(&mut self, id: &T::Id) -> usize {
        if self.in_flight.is_some() {
            if let Some(outcome) = self.done_rx.recv().await {
                self.complete(id, outcome);
            }
        }
        while !self.pending.is_empty() {
            let batch = self.take_batch();
            self.in_flight = Some(batch.clone());
            let outcome = flush_batch(self.sink.as_ref(), id, batch, self.timeout).await;
            let failed = !outcome.is_success();
            self.complete(id, outcome);
            if failed {
                break;
            }
        }
        self.deadline = None;
        self.backoff = false;
        self.pending.len()
    }
}

async fn flush_batch<T: ActorEntity>(
    sink: &dyn RecordSink<T>,
    id: &T::Id,
    mut batch: Vec<T::Record>,
    timeout: Duration,
) -> FlushOutcome<T::Record> {
    let attempted = batch.len();
    let result = tokio::time::timeout(timeout, sink.write_batch(id, &batch)).await;
    match result {
        Ok(Ok(())) => FlushOutcome {
            attempted,
            retry: Vec::new(),
            error: None,
        },
        Ok(Err(e)) => {
            let committed = e.committed.min(attempted);
            let retry = batch.split_off(committed);
            FlushOutcome {
                attempted,
                retry,
                error: Some(e.to_string()),
            }
        }
        // Whether anything was applied is unknown; idempotent writes make a full retry safe.
        Err(_) => FlushOutcome {
            attempted,
            retry: batch,
            error: Some(format!("flush timed out after {timeout:?}")),
        },
    }
}
