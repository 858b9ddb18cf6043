//! Connection manager: the live connection set and its topic index.

use std::collections::HashMap;
use std::sync::Arc;

use tally_core::{ConnectionId, CounterId};
use tokio::sync::RwLock;
use tracing::debug;

use super::connection::ClientConnection;

/// Tracks live connections. Read-mostly: writes happen only on connect and
/// disconnect, broadcasts take the read lock.
#[derive(Default)]
pub struct ConnectionManager {
    connections: RwLock<HashMap<ConnectionId, Arc<ClientConnection>>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection, replacing any previous one with the same id.
    pub async fn register(&self, connection: Arc<ClientConnection>) {
        let mut conns = self.connections.write().await;
        let _ = conns.insert(connection.id.clone(), connection);
    }

    /// Add a connection unless `limit` connections are already live.
    ///
    /// The check and the insert happen under one write lock.
    pub async fn try_register(&self, connection: Arc<ClientConnection>, limit: usize) -> bool {
        let mut conns = self.connections.write().await;
        if conns.len() >= limit && !conns.contains_key(&connection.id) {
            return false;
        }
        let _ = conns.insert(connection.id.clone(), connection);
        true
    }

    /// Remove a connection. Counter state is untouched; its topics go with it.
    pub async fn unregister(&self, connection_id: &ConnectionId) -> Option<Arc<ClientConnection>> {
        let removed = self.connections.write().await.remove(connection_id);
        if let Some(conn) = &removed {
            debug!(conn_id = %conn.id, topics = conn.topics().len(), "connection unregistered");
        }
        removed
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Every live connection.
    pub async fn all(&self) -> Vec<Arc<ClientConnection>> {
        self.connections.read().await.values().cloned().collect()
    }

    /// Connections that joined `counter_id`'s topic.
    pub async fn subscribers(&self, counter_id: &CounterId) -> Vec<Arc<ClientConnection>> {
        self.connections
            .read()
            .await
            .values()
            .filter(|c| c.is_subscribed(counter_id))
            .cloned()
            .collect()
    }
}
