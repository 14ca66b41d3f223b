//! # Generic Messages
//!
//! This module defines the request types exchanged between an
//! [`EntityHandle`](crate::EntityHandle) and its [`EntityActor`](crate::EntityActor).

use crate::entity::ActorEntity;
use crate::error::FrameworkError;
use crate::registry::ConnectionId;
use tokio::sync::{mpsc, oneshot};

/// Type alias for the one-shot response channel used by actors.
pub type Response<T> = oneshot::Sender<Result<T, FrameworkError>>;

/// Operational view of one actor, returned by [`EntityRequest::Status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorStatus {
    /// Records waiting for the next flush.
    pub pending: usize,
    /// Records handed to the sink and not yet acknowledged.
    pub in_flight: usize,
    /// Live subscriber connections.
    pub subscribers: usize,
    /// A snapshot write failed and has not been retried successfully yet.
    pub snapshot_dirty: bool,
}

/// Message sent to an entity actor.
///
/// Unlike a resource actor that manages a collection, an entity actor owns exactly one
/// entity, so none of the variants carry an id: the mailbox *is* the address.
///
/// - **Apply**: the only mutating request. Serialized with every other request.
/// - **Get**: read-only copy of the current state.
/// - **Subscribe / Unsubscribe**: connection registry maintenance.
/// - **Flush**: start a write-behind flush now instead of waiting for a trigger.
/// - **Status**: queue and registry sizes.
/// - **Stop**: final flush, final snapshot, then exit.
#[derive(Debug)]
pub enum EntityRequest<T: ActorEntity> {
    Apply {
        action: T::Action,
        respond_to: Response<T::ActionResult>,
    },
    Get {
        respond_to: Response<T>,
    },
    Subscribe {
        sender: mpsc::Sender<T::Update>,
        respond_to: Response<ConnectionId>,
    },
    Unsubscribe {
        connection: ConnectionId,
        respond_to: Response<bool>,
    },
    Flush {
        respond_to: Response<()>,
    },
    Status {
        respond_to: Response<ActorStatus>,
    },
    Stop {
        respond_to: Response<()>,
    },
}

impl<T: ActorEntity> EntityRequest<T> {
    /// Answer the request with an error without processing it.
    pub(crate) fn reject(self, error: FrameworkError) {
        match self {
            EntityRequest::Apply { respond_to, .. } => {
                let _ = respond_to.send(Err(error));
            }
            EntityRequest::Get { respond_to } => {
                let _ = respond_to.send(Err(error));
            }
            EntityRequest::Subscribe { respond_to, .. } => {
                let _ = respond_to.send(Err(error));
            }
            EntityRequest::Unsubscribe { respond_to, .. } => {
                let _ = respond_to.send(Err(error));
            }
            EntityRequest::Flush { respond_to } => {
                let _ = respond_to.send(Err(error));
            }
            EntityRequest::Status { respond_to } => {
                let _ = respond_to.send(Err(error));
            }
            EntityRequest::Stop { respond_to } => {
                let _ = respond_to.send(Err(error));
            }
        }
    }
}
