//! # Record Sink
//!
//! The outbound seam of the write-behind batcher: whatever durably mirrors the actors'
//! records (the System-of-Record). Implementations must be idempotent, because a batch
//! that failed or timed out is delivered again.

use crate::entity::ActorEntity;
use crate::error::SinkError;
use async_trait::async_trait;

#[async_trait]
pub trait RecordSink<T: ActorEntity>: Send + Sync + 'static {
    /// Apply `records` in order.
    ///
    /// On failure, [`SinkError::committed`] must count the records applied before the
    /// failing one; the actor re-queues the remainder in front of newer records.
    async fn write_batch(&self, entity: &T::Id, records: &[T::Record]) -> Result<(), SinkError>;
}
