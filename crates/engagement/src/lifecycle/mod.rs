//! # System Lifecycle & Orchestration
//!
//! This module wires the engagement layer together and takes it down again.
//!
//! ## The EngagementSystem Pattern
//!
//! Engagement actors are *virtual*: nothing is spawned up front. The [`EngagementSystem`]
//! only builds the pieces every activation needs and hands them to an
//! [`ActorHost`](entity_actor::ActorHost):
//!
//! 1. **Snapshot store** - a [`FileStateStore`](entity_actor::FileStateStore) when a state
//!    directory is configured, in memory otherwise
//! 2. **System-of-Record** - the write-behind target of every actor
//! 3. **Context** - the System-of-Record's read path, injected via `run(context)` so an
//!    entity without a snapshot can be seeded
//!
//! ## Graceful Shutdown
//!
//! Dropping clients is not enough here: the host keeps a handle to every active actor.
//! [`EngagementSystem::shutdown`] sends each one a stop request and waits until it has
//!
//! 1. answered everything already in its mailbox,
//! 2. drained its write-behind queue into the System-of-Record,
//! 3. written its final snapshot.
//!
//! Records the System-of-Record still refuses stay in that snapshot and are re-queued
//! on the next activation.
//!
//! ## Configuration
//!
//! See [`config`] for the `ENGAGEMENT_*` environment variables.

pub mod config;
pub mod engagement_system;

pub use config::*;
pub use engagement_system::*;
