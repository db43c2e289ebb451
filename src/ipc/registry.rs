//! Registry of live frontend connections for broadcast fan-out.
//!
//! Connections register an outbound frame sender on accept and are
//! removed on disconnect. Broadcasts iterate a snapshot of the registry;
//! a frontend that has gone away is skipped silently, never treated as
//! an error.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::debug;
use uuid::Uuid;

use crate::protocol::{Broadcast, ServerFrame};

/// Sender half delivering outbound frames to one connection's writer task.
pub type FrameSender = mpsc::UnboundedSender<ServerFrame>;

/// Thread-safe registry of active frontend connections.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<Mutex<HashMap<Uuid, FrameSender>>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection's frame sender, returning its id.
    pub async fn register(&self, sender: FrameSender) -> Uuid {
        let id = Uuid::new_v4();
        self.inner.lock().await.insert(id, sender);
        id
    }

    /// Remove a connection on disconnect. Unknown ids are ignored.
    pub async fn unregister(&self, id: Uuid) {
        self.inner.lock().await.remove(&id);
    }

    /// Number of currently registered connections.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    /// Whether no frontend is currently connected.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }

    /// Fan a broadcast out to every registered connection, best-effort.
    ///
    /// Delivery is attempted once per connection in the snapshot; senders
    /// whose receiver is gone are dropped from the registry afterwards.
    /// Returns the number of attempted deliveries.
    pub async fn broadcast(&self, broadcast: Broadcast) -> usize {
        let snapshot: Vec<(Uuid, FrameSender)> = {
            let inner = self.inner.lock().await;
            inner
                .iter()
                .map(|(id, sender)| (*id, sender.clone()))
                .collect()
        };

        let attempted = snapshot.len();
        let mut dead = Vec::new();
        for (id, sender) in snapshot {
            if sender
                .send(ServerFrame::Broadcast(broadcast.clone()))
                .is_err()
            {
                debug!(connection_id = %id, "skipping disconnected frontend");
                dead.push(id);
            }
        }

        if !dead.is_empty() {
            let mut inner = self.inner.lock().await;
            for id in dead {
                inner.remove(&id);
            }
        }

        attempted
    }
}
