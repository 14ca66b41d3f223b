//! # Engagement Client
//!
//! Provides a high-level API for the engagement actors.
//! It wraps an `ActorHost<EntityState>` and maps framework errors to [`EngagementError`].
use crate::engagement_actor::EngagementError;
use crate::model::{
    ApplyOutcome, EntityId, EntityState, Interaction, InteractionRequest, LiveUpdate, StateView,
};
use entity_actor::{ActorHost, ActorStatus, ConnectionId, Subscription};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Client for the engagement actors. Cheap to clone.
#[derive(Clone)]
pub struct EngagementClient {
    host: Arc<ActorHost<EntityState>>,
}

impl EngagementClient {
    pub fn new(host: Arc<ActorHost<EntityState>>) -> Self {
        Self { host }
    }

    /// Parses and applies an inbound interaction.
    #[instrument(skip(self, request), fields(entity = %request.entity_id, kind = %request.kind))]
    pub async fn interact(&self, request: InteractionRequest) -> Result<ApplyOutcome, EngagementError> {
        debug!(?request, "interact called");
        let (entity, interaction) = request.parse()?;
        self.apply(&entity, interaction).await
    }

    pub async fn apply(&self, entity: &EntityId, interaction: Interaction) -> Result<ApplyOutcome, EngagementError> {
        Ok(self.host.apply(entity, interaction).await?)
    }

    /// Adjusts a platform-wide metric and returns its new value.
    #[instrument(skip(self))]
    pub async fn record_metric(&self, metric: &str, value: i64) -> Result<u64, EngagementError> {
        let outcome = self
            .apply(&EntityId::Platform, Interaction::counter_delta(metric, value))
            .await?;
        Ok(outcome.counts.get(metric).copied().unwrap_or(0))
    }

    /// Counts of `entity`, with membership flags for `subject` if given.
    #[instrument(skip(self))]
    pub async fn state(&self, entity: &EntityId, subject: Option<&str>) -> Result<StateView, EngagementError> {
        let state = self.host.state(entity).await?;
        Ok(state.view(subject))
    }

    /// Opens a live connection. The first message is always a [`LiveUpdate::Snapshot`].
    #[instrument(skip(self))]
    pub async fn subscribe(&self, entity: &EntityId) -> Result<Subscription<LiveUpdate>, EngagementError> {
        let subscription = self.host.subscribe(entity).await?;
        info!(connection = %subscription.id, "Subscribed");
        Ok(subscription)
    }

    #[instrument(skip(self))]
    pub async fn unsubscribe(&self, entity: &EntityId, connection: ConnectionId) -> Result<bool, EngagementError> {
        Ok(self.host.unsubscribe(entity, connection).await?)
    }

    /// Queue and registry sizes of the entity's actor.
    pub async fn status(&self, entity: &EntityId) -> Result<ActorStatus, EngagementError> {
        Ok(self.host.get(entity).await.status().await?)
    }

    /// Starts a write-behind flush for the entity without waiting for it.
    pub async fn flush(&self, entity: &EntityId) -> Result<(), EngagementError> {
        Ok(self.host.get(entity).await.flush().await?)
    }

    /// Stops the entity's actor after a final flush. Returns whether it was running.
    #[instrument(skip(self))]
    pub async fn evict(&self, entity: &EntityId) -> Result<bool, EngagementError> {
        Ok(self.host.evict(entity).await?)
    }

    pub async fn active_actors(&self) -> usize {
        self.host.active().await
    }

    pub(crate) fn host(&self) -> &ActorHost<EntityState> {
        &self.host
    }
}
