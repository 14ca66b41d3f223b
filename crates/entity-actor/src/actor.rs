//! # Entity Actor
//!
//! This module defines `EntityActor`, the server side of the framework: one tokio task
//! that exclusively owns the state of one entity.
//!
//! ## Control loop
//! A single `select!` loop multiplexes four event sources, so nothing outside the task
//! ever touches the state, the connection registry or the write-behind queue:
//!
//! 1. **Mailbox**: requests from [`EntityHandle`]s, processed one at a time in arrival
//!    order.
//! 2. **Flush completion**: outcome of the background flush, merged back into the queue.
//! 3. **Debounce timer**: starts a flush of whatever is pending.
//! 4. **Idle timer**: evicts the actor when it has been quiet for `idle_timeout`.
//!
//! ## Apply pipeline
//! `handle_action` → reply to the caller → broadcast → enqueue the record → persist the
//! snapshot. The caller never waits for the snapshot write nor for any flush.
//!
//! ## Lifecycle
//! Activation awaits the previous instance for the same id (if any) and then hydrates
//! from the Durable State Store; an unreadable snapshot or a failing `on_hydrate` hook
//! aborts the activation and the next request retries it. On stop, idle eviction or
//! mailbox closure the actor closes its mailbox, processes what is still queued, drains
//! the batcher and writes a final snapshot.

use crate::batcher::WriteBehind;
use crate::client::EntityHandle;
use crate::config::ActorConfig;
use crate::entity::{ActorEntity, Applied, Change};
use crate::error::{FrameworkError, StoreError};
use crate::message::{ActorStatus, EntityRequest, Response};
use crate::registry::ConnectionRegistry;
use crate::sink::RecordSink;
use crate::store::{decode_snapshot, encode_snapshot, Snapshot, StateStore};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

/// What the loop does after a request.
enum Step {
    Continue,
    Stop(Response<()>),
}

/// The actor owning one entity.
///
/// # Architecture Note
/// This struct is the "Server" half of the actor. It owns the receiver end of the
/// mailbox plus everything the entity needs at runtime. The entity state itself lives on
/// the stack of [`EntityActor::run`], created by hydration.
///
/// **Concurrency Model**:
/// Thousands of `EntityActor`s may run side by side, one per active entity, each
/// processing its own mailbox *sequentially*. Counters need no `Mutex`: exclusive
/// ownership inside the task is the synchronization.
pub struct EntityActor<T: ActorEntity> {
    id: T::Id,
    entity_type: &'static str,
    receiver: mpsc::Receiver<EntityRequest<T>>,
    store: Arc<dyn StateStore>,
    batcher: WriteBehind<T>,
    connections: ConnectionRegistry<T::Update>,
    config: ActorConfig,
    predecessor: Option<JoinHandle<()>>,
    snapshot_dirty: bool,
}

impl<T: ActorEntity> EntityActor<T> {
    /// Creates a new `EntityActor` and the `EntityHandle` used to reach it.
    ///
    /// The actor does nothing until [`run`](Self::run) is spawned; requests sent before
    /// that wait in the mailbox and are served right after hydration.
    pub fn new(
        id: T::Id,
        config: ActorConfig,
        store: Arc<dyn StateStore>,
        sink: Arc<dyn RecordSink<T>>,
    ) -> (Self, EntityHandle<T>) {
        let config = config.normalized();
        let (sender, receiver) = mpsc::channel(config.mailbox_size);
        // Extract just the type name (e.g., "EntityState" instead of the full path)
        let entity_type = std::any::type_name::<T>()
            .split("::")
            .last()
            .unwrap_or("Unknown");
        let actor = Self {
            id: id.clone(),
            entity_type,
            receiver,
            store,
            batcher: WriteBehind::new(sink, &config),
            connections: ConnectionRegistry::new(),
            predecessor: None,
            snapshot_dirty: false,
            config: config.clone(),
        };
        let handle = EntityHandle::new(id, sender, config.subscriber_buffer);
        (actor, handle)
    }

    /// Delays hydration until `previous` (an earlier instance for the same id) has
    /// finished its final flush and snapshot.
    pub fn after(mut self, previous: JoinHandle<()>) -> Self {
        self.predecessor = Some(previous);
        self
    }

    /// Runs the actor until it is stopped, evicted, or every handle is dropped.
    ///
    /// # Context Injection
    /// `context` is passed to every entity hook, so dependencies created after the actor
    /// (like a reader of the System-of-Record) can still be wired in.
    pub async fn run(mut self, context: T::Context) {
        let entity_type = self.entity_type;
        if let Some(previous) = self.predecessor.take() {
            debug!(entity_type, id = %self.id, "Waiting for previous activation");
            if let Err(e) = previous.await {
                warn!(entity_type, id = %self.id, error = %e, "Previous activation ended abnormally");
            }
        }

        let mut state = match self.hydrate(&context).await {
            Ok(state) => state,
            Err(e) => {
                error!(entity_type, id = %self.id, error = %e, "Hydrate failed");
                self.receiver.close();
                while let Some(msg) = self.receiver.recv().await {
                    msg.reject(FrameworkError::HydrateFailed(e.to_string()));
                }
                return;
            }
        };
        info!(
            entity_type,
            id = %self.id,
            pending = self.batcher.pending_len(),
            "Actor started"
        );

        let mut stop_requests = Vec::new();
        let mut last_activity = Instant::now();
        loop {
            let flush_at = self.batcher.deadline();
            let idle_at = self.config.idle_timeout.map(|idle| last_activity + idle);

            tokio::select! {
                msg = self.receiver.recv() => {
                    let Some(msg) = msg else {
                        debug!(entity_type, id = %self.id, "All handles dropped");
                        break;
                    };
                    last_activity = Instant::now();
                    if let Step::Stop(respond_to) = self.handle(msg, &mut state, &context).await {
                        stop_requests.push(respond_to);
                        break;
                    }
                }
                Some(outcome) = self.batcher.next_outcome() => {
                    let committed = outcome.committed();
                    self.batcher.complete(&self.id, outcome);
                    if committed > 0 || self.snapshot_dirty {
                        self.persist(&state).await;
                    }
                }
                _ = sleep_until_opt(flush_at) => {
                    self.batcher.start(&self.id);
                    if self.snapshot_dirty {
                        self.persist(&state).await;
                    }
                }
                _ = sleep_until_opt(idle_at) => {
                    info!(entity_type, id = %self.id, "Idle, evicting");
                    break;
                }
            }

            if self.batcher.threshold_reached() {
                self.batcher.start(&self.id);
            }
        }

        // Serve whatever was already queued so no accepted request goes unanswered.
        self.receiver.close();
        while let Some(msg) = self.receiver.recv().await {
            if let Step::Stop(respond_to) = self.handle(msg, &mut state, &context).await {
                stop_requests.push(respond_to);
            }
        }

        self.shutdown(&state).await;
        for respond_to in stop_requests {
            let _ = respond_to.send(Ok(()));
        }
    }

    async fn hydrate(&mut self, context: &T::Context) -> Result<T, StoreError> {
        let entity_type = self.entity_type;
        let key = self.id.to_string();
        let (mut state, restored) = match self.store.load(&key).await? {
            Some(bytes) => {
                let snapshot: Snapshot<T, T::Record> = decode_snapshot(&bytes)?;
                info!(
                    entity_type,
                    id = %self.id,
                    saved_at = %snapshot.saved_at,
                    requeued = snapshot.pending.len(),
                    "Hydrated from snapshot"
                );
                self.batcher.restore(snapshot.pending);
                (snapshot.state, true)
            }
            None => {
                debug!(entity_type, id = %self.id, "No snapshot, starting empty");
                (T::initial(&self.id), false)
            }
        };
        // A failed hook fails activation, like an unreadable snapshot.
        state
            .on_hydrate(restored, context)
            .await
            .map_err(|e| StoreError::Backend(format!("on_hydrate failed: {e}")))?;
        Ok(state)
    }

    async fn handle(&mut self, msg: EntityRequest<T>, state: &mut T, context: &T::Context) -> Step {
        let entity_type = self.entity_type;
        match msg {
            EntityRequest::Apply { action, respond_to } => {
                debug!(entity_type, id = %self.id, ?action, "Apply");
                match state.handle_action(action, context).await {
                    Ok(Applied { result, change }) => {
                        let _ = respond_to.send(Ok(result));
                        if let Some(Change { record, update }) = change {
                            let delivered = self.connections.broadcast(&update);
                            self.batcher.push(record);
                            self.persist(state).await;
                            debug!(
                                entity_type,
                                id = %self.id,
                                delivered,
                                pending = self.batcher.pending_len(),
                                "Applied"
                            );
                        }
                    }
                    Err(e) => {
                        debug!(entity_type, id = %self.id, error = %e, "Rejected");
                        let _ = respond_to.send(Err(FrameworkError::EntityError(Box::new(e))));
                    }
                }
            }
            EntityRequest::Get { respond_to } => {
                debug!(entity_type, id = %self.id, "Get");
                let _ = respond_to.send(Ok(state.clone()));
            }
            EntityRequest::Subscribe { sender, respond_to } => {
                let result = self
                    .connections
                    .subscribe(sender, state.sync_update())
                    .ok_or(FrameworkError::SubscriberClosed);
                if let Ok(connection) = &result {
                    debug!(
                        entity_type,
                        id = %self.id,
                        %connection,
                        subscribers = self.connections.len(),
                        "Subscribed"
                    );
                }
                let _ = respond_to.send(result);
            }
            EntityRequest::Unsubscribe {
                connection,
                respond_to,
            } => {
                let removed = self.connections.unsubscribe(connection);
                debug!(entity_type, id = %self.id, %connection, removed, "Unsubscribed");
                let _ = respond_to.send(Ok(removed));
            }
            EntityRequest::Flush { respond_to } => {
                self.batcher.start(&self.id);
                let _ = respond_to.send(Ok(()));
            }
            EntityRequest::Status { respond_to } => {
                let _ = respond_to.send(Ok(ActorStatus {
                    pending: self.batcher.pending_len(),
                    in_flight: self.batcher.in_flight_len(),
                    subscribers: self.connections.len(),
                    snapshot_dirty: self.snapshot_dirty,
                }));
            }
            EntityRequest::Stop { respond_to } => {
                info!(entity_type, id = %self.id, "Stop requested");
                return Step::Stop(respond_to);
            }
        }
        Step::Continue
    }

    /// Writes the snapshot envelope. Failures are remembered and retried later.
    async fn persist(&mut self, state: &T) {
        let key = self.id.to_string();
        let result = match encode_snapshot(state, &self.batcher.uncommitted()) {
            Ok(bytes) => self.store.save(&key, bytes).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => {
                if self.snapshot_dirty {
                    info!(entity_type = self.entity_type, id = %self.id, "Snapshot persisted after retry");
                }
                self.snapshot_dirty = false;
            }
            Err(e) => {
                warn!(
                    entity_type = self.entity_type,
                    id = %self.id,
                    error = %e,
                    "Snapshot persist failed, will retry"
                );
                self.snapshot_dirty = true;
            }
        }
    }

    async fn shutdown(&mut self, state: &T) {
        let entity_type = self.entity_type;
        self.connections.clear();
        let remaining = self.batcher.drain(&self.id).await;
        if remaining > 0 {
            error!(
                entity_type,
                id = %self.id,
                remaining,
                "Final flush incomplete, records kept in snapshot"
            );
        }
        self.persist(state).await;
        if self.snapshot_dirty {
            error!(entity_type, id = %self.id, "Final snapshot could not be written");
        }
        info!(entity_type, id = %self.id, "Shutdown");
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
