//! # Actor Host
//!
//! Addressing and activation for entity actors. Callers never construct an
//! [`EntityActor`] themselves: they address an entity by id and the host returns the
//! handle of its single live actor, activating one on first use.
//!
//! ## Single writer
//! Activation happens under the host lock, so two concurrent first requests for the
//! same id get the same actor. When an actor stops (explicitly, idle, or after a
//! hydrate failure) its handle reports closed and the next request activates a
//! replacement. The replacement awaits the old task before hydrating, so it always sees
//! the final snapshot of its predecessor and two instances never write the same key.

use crate::actor::EntityActor;
use crate::client::EntityHandle;
use crate::config::ActorConfig;
use crate::entity::ActorEntity;
use crate::error::FrameworkError;
use crate::message::EntityRequest;
use crate::registry::{ConnectionId, Subscription};
use crate::sink::RecordSink;
use crate::store::StateStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

struct Activation<T: ActorEntity> {
    handle: EntityHandle<T>,
    task: JoinHandle<()>,
}

/// Owns every activation of one entity type.
pub struct ActorHost<T: ActorEntity> {
    actors: Mutex<HashMap<T::Id, Activation<T>>>,
    config: ActorConfig,
    store: Arc<dyn StateStore>,
    sink: Arc<dyn RecordSink<T>>,
    context: T::Context,
}

impl<T: ActorEntity> ActorHost<T> {
    pub fn new(
        config: ActorConfig,
        store: Arc<dyn StateStore>,
        sink: Arc<dyn RecordSink<T>>,
        context: T::Context,
    ) -> Self {
        Self {
            actors: Mutex::new(HashMap::new()),
            config: config.normalized(),
            store,
            sink,
            context,
        }
    }

    /// Returns the live actor for `id`, activating it if needed.
    pub async fn get(&self, id: &T::Id) -> EntityHandle<T> {
        let mut actors = self.actors.lock().await;
        if let Some(active) = actors.get(id) {
            if !active.handle.is_closed() {
                return active.handle.clone();
            }
        }

        let previous = actors.remove(id).map(|activation| activation.task);
        actors.retain(|_, activation| !activation.task.is_finished());

        let (actor, handle) = EntityActor::new(
            id.clone(),
            self.config.clone(),
            Arc::clone(&self.store),
            Arc::clone(&self.sink),
        );
        let actor = match previous {
            Some(task) if !task.is_finished() => actor.after(task),
            _ => actor,
        };
        let task = tokio::spawn(actor.run(self.context.clone()));
        debug!(%id, active = actors.len() + 1, "Activated");

        actors.insert(
            id.clone(),
            Activation {
                handle: handle.clone(),
                task,
            },
        );
        handle
    }

    /// The live actor for `id`, without activating one.
    pub async fn active_handle(&self, id: &T::Id) -> Option<EntityHandle<T>> {
        let actors = self.actors.lock().await;
        actors
            .get(id)
            .filter(|active| !active.handle.is_closed())
            .map(|active| active.handle.clone())
    }

    /// Delivers `request`, re-activating once if the actor stopped in between.
    async fn dispatch(&self, id: &T::Id, request: EntityRequest<T>) -> Result<(), FrameworkError> {
        let handle = self.get(id).await;
        let request = match handle.send(request).await {
            Ok(()) => return Ok(()),
            Err(request) => request,
        };
        debug!(%id, "Mailbox closed during dispatch, re-activating");
        self.get(id)
            .await
            .send(request)
            .await
            .map_err(|_| FrameworkError::ActorClosed)
    }

    pub async fn apply(&self, id: &T::Id, action: T::Action) -> Result<T::ActionResult, FrameworkError> {
        let (respond_to, response) = oneshot::channel();
        self.dispatch(id, EntityRequest::Apply { action, respond_to })
            .await?;
        response.await.map_err(|_| FrameworkError::ActorDropped)?
    }

    pub async fn state(&self, id: &T::Id) -> Result<T, FrameworkError> {
        let (respond_to, response) = oneshot::channel();
        self.dispatch(id, EntityRequest::Get { respond_to }).await?;
        response.await.map_err(|_| FrameworkError::ActorDropped)?
    }

    pub async fn subscribe(&self, id: &T::Id) -> Result<Subscription<T::Update>, FrameworkError> {
        let (sender, receiver) = mpsc::channel(self.config.subscriber_buffer);
        let (respond_to, response) = oneshot::channel();
        self.dispatch(id, EntityRequest::Subscribe { sender, respond_to })
            .await?;
        let connection = response.await.map_err(|_| FrameworkError::ActorDropped)??;
        Ok(Subscription::new(connection, receiver))
    }

    /// Connections die with their activation, so an inactive entity has none to remove.
    pub async fn unsubscribe(&self, id: &T::Id, connection: ConnectionId) -> Result<bool, FrameworkError> {
        match self.active_handle(id).await {
            Some(handle) => match handle.unsubscribe(connection).await {
                Err(FrameworkError::ActorClosed) => Ok(false),
                other => other,
            },
            None => Ok(false),
        }
    }

    /// Stops the actor for `id` if it is running. Returns once its final flush is done.
    pub async fn evict(&self, id: &T::Id) -> Result<bool, FrameworkError> {
        let Some(handle) = self.active_handle(id).await else {
            return Ok(false);
        };
        match handle.stop().await {
            Ok(()) => Ok(true),
            Err(FrameworkError::ActorClosed) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Number of actors currently accepting requests.
    pub async fn active(&self) -> usize {
        let actors = self.actors.lock().await;
        actors
            .values()
            .filter(|activation| !activation.handle.is_closed())
            .count()
    }

    /// Stops every actor and waits for all of them to finish.
    pub async fn shutdown(&self) {
        let activations: Vec<(T::Id, Activation<T>)> = self.actors.lock().await.drain().collect();
        info!(actors = activations.len(), "Host shutting down");

        let mut stops = Vec::with_capacity(activations.len());
        for (id, activation) in &activations {
            let handle = activation.handle.clone();
            let id = id.clone();
            stops.push(tokio::spawn(async move {
                match handle.stop().await {
                    Ok(()) | Err(FrameworkError::ActorClosed) => {}
                    Err(e) => warn!(%id, error = %e, "Stop failed"),
                }
            }));
        }
        for stop in stops {
            let _ = stop.await;
        }
        for (id, activation) in activations {
            if let Err(e) = activation.task.await {
                warn!(%id, error = %e, "Actor task ended abnormally");
            }
        }
        info!("Host shutdown complete");
    }
}
