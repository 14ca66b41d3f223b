//! # ActorEntity Trait
//!
//! The `ActorEntity` trait is the contract a piece of per-entity state must satisfy to be
//! owned by an [`EntityActor`](crate::EntityActor). One actor owns exactly one entity, so
//! the trait describes a *single* instance: how it starts empty, how it applies an
//! action, what it hands to the write-behind batcher, and what it broadcasts.
//!
//! # Associated Types
//! - `Id` addresses the entity through the [`ActorHost`](crate::ActorHost).
//! - `Action` / `ActionResult` are the inbound mutation and its reply.
//! - `Record` is the immutable fact appended to the write-behind queue.
//! - `Update` is the message fanned out to subscribers.
//!
//! # Provided Methods (Hooks)
//! - [`ActorEntity::on_hydrate`] runs once per activation, after the snapshot (if any)
//!   has been loaded. The default does nothing.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::{Debug, Display};
use std::hash::Hash;

/// State owned by a single [`EntityActor`](crate::EntityActor).
///
/// The whole value is serialized into the snapshot envelope, so it must only hold data
/// that is meaningful after a restart (no channels, no handles).
///
/// # Async & Context
/// Hooks are `#[async_trait]` and receive the runtime `Context` injected through
/// [`EntityActor::run`](crate::EntityActor::run), so dependencies are bound late.
#[async_trait]
pub trait ActorEntity: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Identifier of the entity; its `Display` form is the Durable State Store key.
    type Id: Eq + Hash + Clone + Send + Sync + Display + Debug + 'static;

    /// An inbound mutation request.
    type Action: Send + Sync + Debug + 'static;

    /// What the caller of `apply` gets back.
    type ActionResult: Send + Sync + Debug + 'static;

    /// Write-behind record created for every applied change.
    type Record: Clone + Send + Sync + Debug + Serialize + DeserializeOwned + 'static;

    /// Message broadcast to subscribers.
    type Update: Clone + Send + Sync + Debug + 'static;

    /// The runtime context (dependencies) injected into the actor.
    /// Use `()` if no dependencies are needed.
    type Context: Clone + Send + Sync + 'static;

    /// The error type for this entity.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fresh state for an entity that has no snapshot yet.
    fn initial(id: &Self::Id) -> Self;

    /// Called once per activation. `restored` tells whether a snapshot was found.
    ///
    /// An error aborts the activation: queued requests fail with
    /// [`FrameworkError::HydrateFailed`](crate::FrameworkError::HydrateFailed) and the
    /// next request starts a fresh one.
    async fn on_hydrate(&mut self, _restored: bool, _ctx: &Self::Context) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Validate and apply one action.
    ///
    /// Returning `Err` must leave `self` untouched. Returning [`Applied::unchanged`]
    /// means the action was valid but a no-op: nothing is persisted or broadcast.
    async fn handle_action(
        &mut self,
        action: Self::Action,
        ctx: &Self::Context,
    ) -> Result<Applied<Self>, Self::Error>;

    /// The full-state message every new subscriber receives first.
    fn sync_update(&self) -> Self::Update;
}

/// Outcome of [`ActorEntity::handle_action`].
#[derive(Debug)]
pub struct Applied<T: ActorEntity> {
    pub result: T::ActionResult,
    pub change: Option<Change<T>>,
}

/// The side effects of a state transition.
#[derive(Debug)]
pub struct Change<T: ActorEntity> {
    pub record: T::Record,
    pub update: T::Update,
}

impl<T: ActorEntity> Applied<T> {
    /// The action changed the state.
    pub fn changed(result: T::ActionResult, record: T::Record, update: T::Update) -> Self {
        Self {
            result,
            change: Some(Change { record, update }),
        }
    }

    /// The action was accepted but did not change anything.
    pub fn unchanged(result: T::ActionResult) -> Self {
        Self {
            result,
            change: None,
        }
    }

    pub fn is_change(&self) -> bool {
        self.change.is_some()
    }
}
