//! # System-of-Record
//!
//! The canonical store the actors mirror their records into. It sits behind two seams:
//!
//! - the write path is the framework's [`RecordSink`](entity_actor::RecordSink), fed by
//!   every actor's write-behind batcher;
//! - the read path is [`SeedSource`], used to seed an entity that has no local snapshot.
//!
//! Writes must be idempotent. Membership rows are keyed by
//! `(subject_id, entity_id, kind)`; counter deltas and shares are deduplicated by
//! record id.

pub mod memory;

pub use memory::InMemorySystemOfRecord;

use crate::engagement_actor::EngagementError;
use crate::model::EntityId;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};

/// What the System-of-Record knows about one entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntitySeed {
    pub counts: BTreeMap<String, u64>,
    pub membership: BTreeMap<String, BTreeSet<String>>,
}

/// Read access used by hydration when an actor has no snapshot.
#[async_trait]
pub trait SeedSource: Send + Sync + 'static {
    /// `Ok(None)` when the entity was never written.
    async fn seed(&self, entity: &EntityId) -> Result<Option<EntitySeed>, EngagementError>;
}
