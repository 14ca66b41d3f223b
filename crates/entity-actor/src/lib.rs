//! # Entity Actor Framework
//!
//! This crate provides the building blocks for *virtual* actors in Rust: one lightweight
//! tokio task per addressable entity, activated on demand, that owns the entity's state
//! exclusively, pushes every change to live subscribers, and mirrors its records to a
//! slower System-of-Record in the background.
//!
//! ## Why one actor per entity?
//!
//! Hot entities (a viral article, a platform-wide counter) receive many concurrent
//! mutations. Routing them all through a single owner removes lost updates without
//! locks, and keeps the System-of-Record off the request path:
//!
//! - **Isolated state**: no shared memory, no locks
//! - **Sequential processing**: requests to one entity are applied in arrival order
//! - **Parallelism across entities**: every entity has its own task
//!
//! ## Building blocks
//!
//! | Piece | Role |
//! |-------|------|
//! | [`ActorEntity`] | The state of one entity and how it applies an action |
//! | [`EntityActor`] / [`EntityHandle`] | Server and client halves of one actor |
//! | [`ActorHost`] | Addressing: get-or-activate by id, single writer per id |
//! | [`ConnectionRegistry`] | Fan-out to live subscribers, self-healing |
//! | [`WriteBehind`] + [`RecordSink`] | Debounced, batched, retried writes downstream |
//! | [`StateStore`] | Snapshot persistence for crash recovery |
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use entity_actor::{ActorConfig, ActorHost, MemoryStateStore};
//! use entity_actor::mock::RecordingSink;
//! use std::sync::Arc;
//!
//! let host = ActorHost::<Tally>::new(
//!     ActorConfig::default(),
//!     Arc::new(MemoryStateStore::new()),
//!     Arc::new(RecordingSink::new()),
//!     (),
//! );
//!
//! // The first request activates the actor and hydrates it from the store.
//! let total = host.apply(&"page-1".to_string(), 3).await?;
//!
//! // Subscribers get the full state first, then every change.
//! let mut live = host.subscribe(&"page-1".to_string()).await?;
//! let sync = live.recv().await;
//! ```
//!
//! ## Dependency Injection via Context
//!
//! Each entity defines a `Context` associated type that is handed to every hook. The host
//! clones it into every activation, so entities can reach services created after the
//! host (a System-of-Record reader used to seed fresh state, for example).
//!
//! ## Testing
//!
//! See the [`mock`] module for [`MockHandle`](mock::MockHandle) and
//! [`RecordingSink`](mock::RecordingSink).

pub mod actor;
pub mod batcher;
pub mod client;
pub mod config;
pub mod entity;
pub mod error;
pub mod host;
pub mod message;
pub mod mock;
pub mod registry;
pub mod sink;
pub mod store;
pub mod tracing;

// Re-export core types for convenience
pub use actor::EntityActor;
pub use batcher::{FlushOutcome, WriteBehind};
pub use client::EntityHandle;
pub use config::ActorConfig;
pub use entity::{ActorEntity, Applied, Change};
pub use error::{FrameworkError, SinkError, StoreError};
pub use host::ActorHost;
pub use message::{ActorStatus, EntityRequest, Response};
pub use registry::{ConnectionId, ConnectionRegistry, Subscription};
pub use sink::RecordSink;
pub use store::{FileStateStore, MemoryStateStore, Snapshot, StateStore, SNAPSHOT_VERSION};
