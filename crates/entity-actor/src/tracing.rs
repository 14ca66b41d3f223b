//! # Observability & Tracing
//!
//! Structured logging for every actor built on this crate.
//!
//! Actors log with `entity_type` and `id` fields instead of module paths, so the
//! subscriber hides targets (`with_target(false)`) and uses the compact format.
//!
//! ## What Gets Traced
//!
//! - **Lifecycle**: hydration (snapshot or empty), idle eviction, stop, final flush
//! - **Mutations**: `Apply` at debug level with the full action, outcome with fan-out count
//! - **Write-behind**: flush start/complete at debug, re-queues and timeouts at warn
//! - **Persistence**: snapshot failures at warn, unrecoverable shutdown state at error
//!
//! ## Usage Examples
//!
//! ```bash
//! # Lifecycle only
//! RUST_LOG=info cargo run
//!
//! # Every request and flush
//! RUST_LOG=debug cargo run
//!
//! # Framework internals only
//! RUST_LOG=entity_actor=debug cargo run
//! ```
//!
//! With `RUST_LOG=debug` an interaction reads like:
//!
//! ```text
//! DEBUG Apply entity_type="EntityState" id=article:42 action=Interaction { kind: Like, .. }
//! DEBUG Applied entity_type="EntityState" id=article:42 delivered=2 pending=1
//! DEBUG Flush started id=article:42 records=1 queued=0
//! DEBUG Flush complete id=article:42 committed=1 queued=0
//! ```

/// Installs the global subscriber. Reads the filter from `RUST_LOG`.
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false) // entity_type and id identify the actor
        .compact()
        .init();
}
