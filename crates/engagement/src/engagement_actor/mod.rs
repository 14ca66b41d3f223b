//! # Engagement Actor
//!
//! One actor per engagement entity (an article, or the platform-wide instance), owning
//! its counters and membership sets.
//!
//! ## Structure
//!
//! - [`entity`] - [`ActorEntity`](entity_actor::ActorEntity) implementation for
//!   [`EntityState`](crate::model::EntityState)
//! - [`rules`] - which interactions an entity accepts
//! - [`error`] - [`EngagementError`] type for type-safe error handling
//! - [`new()`] - Factory function that creates the host and its client
//!
//! ## Usage
//!
//! ```rust,no_run
//! use engagement::engagement_actor::{self, EngagementContext};
//! use engagement::model::{EntityId, Interaction};
//! use engagement::system_of_record::InMemorySystemOfRecord;
//! use entity_actor::{ActorConfig, MemoryStateStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let record = Arc::new(InMemorySystemOfRecord::new());
//!     let client = engagement_actor::new(
//!         ActorConfig::default(),
//!         Arc::new(MemoryStateStore::new()),
//!         record.clone(),
//!         EngagementContext::seeded_from(record),
//!     );
//!
//!     let outcome = client.apply(&EntityId::article("42"), Interaction::like("u1")).await?;
//!     assert!(outcome.member);
//!     Ok(())
//! }
//! ```

pub mod entity;
pub mod error;
pub mod rules;

pub use entity::membership_consistent;
pub use error::*;

use crate::clients::EngagementClient;
use crate::model::EntityState;
use crate::system_of_record::SeedSource;
use entity_actor::{ActorConfig, ActorHost, RecordSink, StateStore};
use std::sync::Arc;

/// Runtime dependencies handed to every engagement actor.
#[derive(Clone, Default)]
pub struct EngagementContext {
    /// Read path used to seed entities that have no local snapshot. `None` starts them at zero.
    pub seed: Option<Arc<dyn SeedSource>>,
}

impl EngagementContext {
    pub fn seeded_from(source: Arc<dyn SeedSource>) -> Self {
        Self { seed: Some(source) }
    }
}

/// Creates the engagement actor host and its client.
pub fn new(
    config: ActorConfig,
    store: Arc<dyn StateStore>,
    sink: Arc<dyn RecordSink<EntityState>>,
    context: EngagementContext,
) -> EngagementClient {
    let host = ActorHost::new(config, store, sink, context);
    EngagementClient::new(Arc::new(host))
}
