//! Directory of live connections and outbound delivery.

use std::sync::Arc;

use dashmap::DashMap;
use graphguess_protocol::{ConnectionId, ServerEvent};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Channel feeding one connection's writer task.
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// Cheaply clonable handle to the connection directory.
///
/// Room actors and the registry share one `Gateway`; delivery never blocks,
/// so it is safe to call from inside an actor step.
#[derive(Clone, Default)]
pub struct Gateway {
    connections: Arc<DashMap<ConnectionId, EventSender>>,
}

impl Gateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, conn: ConnectionId, sender: EventSender) {
        self.connections.insert(conn, sender);
        debug!(%conn, connections = self.connections.len(), "connection registered");
    }

    pub fn unregister(&self, conn: ConnectionId) {
        if self.connections.remove(&conn).is_some() {
            debug!(%conn, connections = self.connections.len(), "connection unregistered");
        }
    }

    /// Sends to one connection. Returns `false` if it is gone.
    pub fn send_to(&self, conn: ConnectionId, event: ServerEvent) -> bool {
        let Some(sender) = self.connections.get(&conn) else {
            debug!(%conn, "dropping event for unknown connection");
            return false;
        };
        if sender.send(event).is_err() {
            warn!(%conn, "connection writer is gone, dropping event");
            return false;
        }
        true
    }

    /// Sends to every live connection.
    pub fn broadcast(&self, event: &ServerEvent) {
        for entry in self.connections.iter() {
            if entry.value().send(event.clone()).is_err() {
                warn!(conn = %entry.key(), "connection writer is gone, dropping event");
            }
        }
    }

    pub fn is_connected(&self, conn: ConnectionId) -> bool {
        self.connections.contains_key(&conn)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}
