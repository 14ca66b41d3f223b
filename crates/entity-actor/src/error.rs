//! # Framework Errors
//!
//! This module defines the error types used throughout the actor framework.
//!
//! - [`FrameworkError`] is what a caller of an [`EntityHandle`](crate::EntityHandle) sees.
//! - [`StoreError`] and [`SinkError`] come from the persistence seams. They are
//!   never returned to callers of `apply`: the actor logs them as warnings and retries.

/// Errors that can occur within the actor framework itself.
#[derive(Debug, thiserror::Error)]
pub enum FrameworkError {
    #[error("Actor closed")]
    ActorClosed,
    #[error("Actor dropped response channel")]
    ActorDropped,
    #[error("Actor failed to hydrate: {0}")]
    HydrateFailed(String),
    #[error("Subscriber closed before the initial sync")]
    SubscriberClosed,
    #[error("Entity error: {0}")]
    EntityError(Box<dyn std::error::Error + Send + Sync>),
}

/// Errors raised by a [`StateStore`](crate::store::StateStore).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("State store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Snapshot encoding error: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("Unsupported snapshot version {0}")]
    UnsupportedVersion(u32),
    #[error("State store error: {0}")]
    Backend(String),
}

/// A failed write-behind flush.
///
/// `committed` is the number of records, counted from the front of the batch,
/// that the sink durably applied before failing. The actor re-queues the rest.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Flush failed after {committed} committed records: {reason}")]
pub struct SinkError {
    pub committed: usize,
    pub reason: String,
}

impl SinkError {
    pub fn new(committed: usize, reason: impl Into<String>) -> Self {
        Self {
            committed,
            reason: reason.into(),
        }
    }
}
