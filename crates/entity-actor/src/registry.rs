//! # Connection Registry
//!
//! Per-actor map of live subscriber connections used for fan-out.
//!
//! Every connection is a bounded `mpsc::Sender`. Sends are always `try_send`: a
//! subscriber that is gone (receiver dropped) or too slow (buffer full) is removed from
//! the registry on the spot and the broadcast carries on with the others. The registry
//! is owned by the actor task, so messages reach each connection in the order the actor
//! applied the mutations.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Display};
use tokio::sync::mpsc;
use tracing::debug;

/// Identifier of a subscriber connection, unique within one actor activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub u64);

impl Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn_{}", self.0)
    }
}

/// Live subscriber connections of one entity.
#[derive(Debug)]
pub struct ConnectionRegistry<M> {
    next_id: u64,
    connections: BTreeMap<ConnectionId, mpsc::Sender<M>>,
}

impl<M: Clone> Default for ConnectionRegistry<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Clone> ConnectionRegistry<M> {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            connections: BTreeMap::new(),
        }
    }

    /// Registers `sender` after delivering `initial` to it.
    ///
    /// Returns `None` when the initial sync cannot be delivered; such a connection is
    /// never registered.
    pub fn subscribe(&mut self, sender: mpsc::Sender<M>, initial: M) -> Option<ConnectionId> {
        if sender.try_send(initial).is_err() {
            debug!("Initial sync failed, connection not registered");
            return None;
        }
        let id = ConnectionId(self.next_id);
        self.next_id += 1;
        self.connections.insert(id, sender);
        Some(id)
    }

    /// Removes a connection. Returns whether it was registered.
    pub fn unsubscribe(&mut self, id: ConnectionId) -> bool {
        self.connections.remove(&id).is_some()
    }

    /// Sends `message` to every connection, dropping the ones that fail.
    ///
    /// Returns the number of connections that received the message.
    pub fn broadcast(&mut self, message: &M) -> usize {
        let before = self.connections.len();
        self.connections.retain(|id, sender| match sender.try_send(message.clone()) {
            Ok(()) => true,
            Err(e) => {
                debug!(connection = %id, error = %e, "Dropping subscriber");
                false
            }
        });
        let delivered = self.connections.len();
        if delivered < before {
            debug!(dropped = before - delivered, delivered, "Broadcast pruned registry");
        }
        delivered
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn clear(&mut self) {
        self.connections.clear();
    }
}

/// The receiving end of a subscription, handed to the caller of `subscribe`.
#[derive(Debug)]
pub struct Subscription<M> {
    pub id: ConnectionId,
    receiver: mpsc::Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(id: ConnectionId, receiver: mpsc::Receiver<M>) -> Self {
        Self { id, receiver }
    }

    /// Next message, or `None` once the actor dropped this connection.
    pub async fn recv(&mut self) -> Option<M> {
        self.receiver.recv().await
    }

    /// Next message if one is already buffered.
    pub fn try_recv(&mut self) -> Option<M> {
        self.receiver.try_recv().ok()
    }
}
