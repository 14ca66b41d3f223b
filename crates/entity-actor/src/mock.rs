//! # Mock Framework & Testing Guide
//!
//! Test doubles for both seams of an entity actor:
//!
//! - [`MockHandle<T>`] hands out a real [`EntityHandle<T>`] whose mailbox is served by
//!   queued expectations instead of an actor, so wrapper clients can be tested without
//!   hydration, flushing or timers.
//! - [`RecordingSink<T>`] is a [`RecordSink`] that keeps every batch it receives and can
//!   be told to fail, partially commit, or stall.
//!
//! ## When to use Mocks vs Real Actors
//!
//! | Feature | MockHandle | Real Actor |
//! |---------|------------|------------|
//! | **Speed** | Instant (in-memory) | Fast (but involves tokio spawn) |
//! | **Determinism** | 100% Deterministic | Subject to scheduler and timers |
//! | **State** | No real state (expectations) | Real state, snapshots, flushes |
//! | **Use Case** | Logic *around* the handle | The actor itself or the full system |
//! | **Error Injection** | Easy (`return_err`) | Via `RecordingSink` / `MemoryStateStore` |
//!
//! ## Testing Strategies
//!
//! 1. **Client logic**: [`MockHandle`] or [`create_mock_handle`] plus the `expect_*`
//!    helpers to assert on the raw requests.
//! 2. **Single actor**: spawn an [`EntityActor`](crate::EntityActor) over a
//!    [`MemoryStateStore`](crate::MemoryStateStore) and a [`RecordingSink`].
//! 3. **Full system**: an [`ActorHost`](crate::ActorHost) with the real System-of-Record.
//!
//! Time-based behavior (debounce, idle eviction) is best tested under
//! `#[tokio::test(start_paused = true)]`, where sleeps complete as soon as the runtime is idle.

use crate::client::EntityHandle;
use crate::entity::ActorEntity;
use crate::error::{FrameworkError, SinkError};
use crate::message::{EntityRequest, Response};
use crate::sink::RecordSink;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

// =============================================================================
// EXPECTATION BUILDER API
// =============================================================================

enum Expectation<T: ActorEntity> {
    Apply(Result<T::ActionResult, FrameworkError>),
    Get(Result<T, FrameworkError>),
}

/// A handle served by queued expectations.
///
/// # Example
/// ```ignore
/// let mock = MockHandle::<EntityState>::new(EntityId::Platform);
/// mock.expect_apply().return_ok(outcome);
///
/// let handle = mock.handle();
/// // Use handle in tests...
/// mock.verify(); // Ensures all expectations were met
/// ```
pub struct MockHandle<T: ActorEntity> {
    handle: EntityHandle<T>,
    expectations: Arc<Mutex<VecDeque<Expectation<T>>>>,
    seen: Arc<Mutex<Vec<T::Action>>>,
    _task: tokio::task::JoinHandle<()>,
}

impl<T: ActorEntity> MockHandle<T>
where
    T::Action: Clone,
{
    pub fn new(id: T::Id) -> Self {
        let (sender, mut receiver) = mpsc::channel::<EntityRequest<T>>(100);
        let expectations = Arc::new(Mutex::new(VecDeque::<Expectation<T>>::new()));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let queue = expectations.clone();
        let log = seen.clone();

        let task = tokio::spawn(async move {
            while let Some(request) = receiver.recv().await {
                let expectation = queue.lock().unwrap().pop_front();
                match (request, expectation) {
                    (EntityRequest::Apply { action, respond_to }, Some(Expectation::Apply(response))) => {
                        log.lock().unwrap().push(action);
                        let _ = respond_to.send(response);
                    }
                    (EntityRequest::Get { respond_to }, Some(Expectation::Get(response))) => {
                        let _ = respond_to.send(response);
                    }
                    _ => panic!("Unexpected request or expectation mismatch"),
                }
            }
        });

        Self {
            handle: EntityHandle::new(id, sender, 8),
            expectations,
            seen,
            _task: task,
        }
    }

    pub fn handle(&self) -> EntityHandle<T> {
        self.handle.clone()
    }

    pub fn expect_apply(&self) -> ExpectationBuilder<'_, T, T::ActionResult> {
        ExpectationBuilder {
            mock: self,
            wrap: Expectation::Apply,
        }
    }

    pub fn expect_get(&self) -> ExpectationBuilder<'_, T, T> {
        ExpectationBuilder {
            mock: self,
            wrap: Expectation::Get,
        }
    }

    /// Actions received so far, in order.
    pub fn applied(&self) -> Vec<T::Action> {
        self.seen.lock().unwrap().clone()
    }

    /// Verifies that all expectations were met.
    pub fn verify(&self) {
        let remaining = self.expectations.lock().unwrap().len();
        if remaining > 0 {
            panic!("Not all expectations were met. {} remaining", remaining);
        }
    }
}

/// Queues the response for one expected request.
pub struct ExpectationBuilder<'a, T: ActorEntity, R> {
    mock: &'a MockHandle<T>,
    wrap: fn(Result<R, FrameworkError>) -> Expectation<T>,
}

impl<T: ActorEntity, R> ExpectationBuilder<'_, T, R> {
    pub fn return_ok(self, value: R) {
        self.push(Ok(value));
    }

    pub fn return_err(self, error: FrameworkError) {
        self.push(Err(error));
    }

    fn push(self, response: Result<R, FrameworkError>) {
        let expectation = (self.wrap)(response);
        self.mock.expectations.lock().unwrap().push_back(expectation);
    }
}

// =============================================================================
// RAW CHANNEL HELPERS
// =============================================================================

/// Creates a handle and the receiver of its mailbox for asserting on raw requests.
pub fn create_mock_handle<T: ActorEntity>(
    id: T::Id,
    buffer_size: usize,
) -> (EntityHandle<T>, mpsc::Receiver<EntityRequest<T>>) {
    let (sender, receiver) = mpsc::channel(buffer_size);
    (EntityHandle::new(id, sender, buffer_size), receiver)
}

/// Helper to verify that the next message is an Apply request
pub async fn expect_apply<T: ActorEntity>(
    receiver: &mut mpsc::Receiver<EntityRequest<T>>,
) -> Option<(T::Action, Response<T::ActionResult>)> {
    match receiver.recv().await {
        Some(EntityRequest::Apply { action, respond_to }) => Some((action, respond_to)),
        _ => None,
    }
}

/// Helper to verify that the next message is a Get request
pub async fn expect_get<T: ActorEntity>(
    receiver: &mut mpsc::Receiver<EntityRequest<T>>,
) -> Option<Response<T>> {
    match receiver.recv().await {
        Some(EntityRequest::Get { respond_to }) => Some(respond_to),
        _ => None,
    }
}

// =============================================================================
// RECORDING SINK
// =============================================================================

#[derive(Default)]
struct SinkScript {
    /// `(failures left, records committed before each failure)`
    failures: Option<(usize, usize)>,
    latency: Option<Duration>,
}

/// A [`RecordSink`] that records every successful batch.
pub struct RecordingSink<T: ActorEntity> {
    batches: Mutex<Vec<(T::Id, Vec<T::Record>)>>,
    attempts: Mutex<usize>,
    script: Mutex<SinkScript>,
}

impl<T: ActorEntity> Default for RecordingSink<T> {
    fn default() -> Self {
        Self {
            batches: Mutex::new(Vec::new()),
            attempts: Mutex::new(0),
            script: Mutex::new(SinkScript::default()),
        }
    }
}

impl<T: ActorEntity> RecordingSink<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` batches fail after committing their first `committed` records.
    pub fn fail_next_batches(&self, count: usize, committed: usize) {
        self.script.lock().unwrap().failures = Some((count, committed));
    }

    /// Delays every write, to exercise the flush timeout.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.script.lock().unwrap().latency = latency;
    }

    /// Successfully written (or partially written) batches, in commit order.
    pub fn batches(&self) -> Vec<(T::Id, Vec<T::Record>)> {
        self.batches.lock().unwrap().clone()
    }

    pub fn batch_count(&self) -> usize {
        self.batches.lock().unwrap().len()
    }

    /// Every committed record, across all entities.
    pub fn records(&self) -> Vec<T::Record> {
        self.batches
            .lock()
            .unwrap()
            .iter()
            .flat_map(|(_, records)| records.iter().cloned())
            .collect()
    }

    /// Calls to `write_batch`, including failed ones.
    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }
}

#[async_trait]
impl<T: ActorEntity> RecordSink<T> for RecordingSink<T> {
    async fn write_batch(&self, entity: &T::Id, records: &[T::Record]) -> Result<(), SinkError> {
        *self.attempts.lock().unwrap() += 1;
        let latency = self.script.lock().unwrap().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let failure = {
            let mut script = self.script.lock().unwrap();
            match script.failures {
                Some((left, committed)) if left > 0 => {
                    script.failures = Some((left - 1, committed));
                    Some(committed.min(records.len()))
                }
                _ => None,
            }
        };

        let mut batches = self.batches.lock().unwrap();
        match failure {
            Some(committed) => {
                if committed > 0 {
                    batches.push((entity.clone(), records[..committed].to_vec()));
                }
                Err(SinkError::new(committed, "injected sink failure"))
            }
            None => {
                batches.push((entity.clone(), records.to_vec()));
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Applied;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Counter {
        value: u64,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("Counter error")]
    struct CounterError;

    #[async_trait]
    impl ActorEntity for Counter {
        type Id = u32;
        type Action = u64;
        type ActionResult = u64;
        type Record = u64;
        type Update = u64;
        type Context = ();
        type Error = CounterError;

        fn initial(_id: &u32) -> Self {
            Self { value: 0 }
        }

        async fn handle_action(&mut self, by: u64, _: &()) -> Result<Applied<Self>, CounterError> {
            self.value += by;
            Ok(Applied::changed(self.value, by, self.value))
        }

        fn sync_update(&self) -> u64 {
            self.value
        }
    }

    #[tokio::test]
    async fn test_mock_handle_with_expectations() {
        let mock = MockHandle::<Counter>::new(1);
        mock.expect_apply().return_ok(5);
        mock.expect_get().return_ok(Counter { value: 5 });

        let handle = mock.handle();
        assert_eq!(handle.apply(5).await.unwrap(), 5);
        assert_eq!(handle.get().await.unwrap(), Counter { value: 5 });

        assert_eq!(mock.applied(), vec![5]);
        mock.verify();
    }

    #[tokio::test]
    async fn test_mock_handle_error_injection() {
        let mock = MockHandle::<Counter>::new(1);
        mock.expect_apply().return_err(FrameworkError::ActorClosed);

        let result = mock.handle().apply(1).await;
        assert!(matches!(result, Err(FrameworkError::ActorClosed)));
    }

    #[tokio::test]
    async fn test_recording_sink_partial_failure() {
        let sink = RecordingSink::<Counter>::new();
        sink.fail_next_batches(1, 2);

        let err = sink.write_batch(&1, &[10, 20, 30]).await.unwrap_err();
        assert_eq!(err.committed, 2);
        sink.write_batch(&1, &[30]).await.unwrap();

        assert_eq!(sink.records(), vec![10, 20, 30]);
        assert_eq!(sink.attempts(), 2);
        assert_eq!(sink.batch_count(), 2);
    }
}
