//! # Entity Handle
//!
//! This module defines the client half of an entity actor.

use crate::entity::ActorEntity;
use crate::error::FrameworkError;
use crate::message::{ActorStatus, EntityRequest};
use crate::registry::{ConnectionId, Subscription};
use tokio::sync::{mpsc, oneshot};

/// ## EntityHandle
///
/// The `EntityHandle<T>` provides a type-safe, async API for one [`EntityActor<T>`](crate::EntityActor).
/// It forwards requests over the actor's mailbox and returns results via oneshot channels.
///
/// * **Cloneable** – holds only a sender, so cloning is inexpensive.
/// * **Addressed** – every handle is bound to exactly one entity id.
/// * **Liveness** – once the actor stops, sends fail with [`FrameworkError::ActorClosed`];
///   ask the [`ActorHost`](crate::ActorHost) for a fresh handle.
pub struct EntityHandle<T: ActorEntity> {
    id: T::Id,
    sender: mpsc::Sender<EntityRequest<T>>,
    subscriber_buffer: usize,
}

impl<T: ActorEntity> Clone for EntityHandle<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            sender: self.sender.clone(),
            subscriber_buffer: self.subscriber_buffer,
        }
    }
}

impl<T: ActorEntity> EntityHandle<T> {
    pub fn new(id: T::Id, sender: mpsc::Sender<EntityRequest<T>>, subscriber_buffer: usize) -> Self {
        Self {
            id,
            sender,
            subscriber_buffer: subscriber_buffer.max(1),
        }
    }

    pub fn id(&self) -> &T::Id {
        &self.id
    }

    /// True once the actor stopped accepting requests.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// True when both handles reach the same actor instance.
    pub fn same_actor(&self, other: &Self) -> bool {
        self.sender.same_channel(&other.sender)
    }

    /// Enqueues a raw request, handing it back if the mailbox is closed.
    pub(crate) async fn send(&self, request: EntityRequest<T>) -> Result<(), EntityRequest<T>> {
        self.sender.send(request).await.map_err(|e| e.0)
    }

    pub async fn apply(&self, action: T::Action) -> Result<T::ActionResult, FrameworkError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(EntityRequest::Apply { action, respond_to })
            .await
            .map_err(|_| FrameworkError::ActorClosed)?;
        response.await.map_err(|_| FrameworkError::ActorDropped)?
    }

    pub async fn get(&self) -> Result<T, FrameworkError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(EntityRequest::Get { respond_to })
            .await
            .map_err(|_| FrameworkError::ActorClosed)?;
        response.await.map_err(|_| FrameworkError::ActorDropped)?
    }

    /// Opens a live connection. The first message is always the full-state sync.
    pub async fn subscribe(&self) -> Result<Subscription<T::Update>, FrameworkError> {
        let (sender, receiver) = mpsc::channel(self.subscriber_buffer);
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(EntityRequest::Subscribe { sender, respond_to })
            .await
            .map_err(|_| FrameworkError::ActorClosed)?;
        let id = response.await.map_err(|_| FrameworkError::ActorDropped)??;
        Ok(Subscription::new(id, receiver))
    }

    /// Returns whether the connection was still registered.
    pub async fn unsubscribe(&self, connection: ConnectionId) -> Result<bool, FrameworkError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(EntityRequest::Unsubscribe {
                connection,
                respond_to,
            })
            .await
            .map_err(|_| FrameworkError::ActorClosed)?;
        response.await.map_err(|_| FrameworkError::ActorDropped)?
    }

    /// Starts a write-behind flush without waiting for it to finish.
    pub async fn flush(&self) -> Result<(), FrameworkError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(EntityRequest::Flush { respond_to })
            .await
            .map_err(|_| FrameworkError::ActorClosed)?;
        response.await.map_err(|_| FrameworkError::ActorDropped)?
    }

    pub async fn status(&self) -> Result<ActorStatus, FrameworkError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(EntityRequest::Status { respond_to })
            .await
            .map_err(|_| FrameworkError::ActorClosed)?;
        response.await.map_err(|_| FrameworkError::ActorDropped)?
    }

    /// Stops the actor and waits until its final flush and snapshot are done.
    pub async fn stop(&self) -> Result<(), FrameworkError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(EntityRequest::Stop { respond_to })
            .await
            .map_err(|_| FrameworkError::ActorClosed)?;
        response.await.map_err(|_| FrameworkError::ActorDropped)?
    }
}
