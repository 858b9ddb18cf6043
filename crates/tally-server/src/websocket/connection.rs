//! WebSocket client connection state.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use axum::extract::ws::Utf8Bytes;
use parking_lot::Mutex;
use tally_core::{ConnectionId, CounterId};
use tokio::sync::mpsc;
use tracing::warn;

use crate::protocol::ServerMessage;

/// A connected WebSocket client.
pub struct ClientConnection {
    pub id: ConnectionId,
    /// Counter topics this connection has joined.
    topics: Mutex<HashSet<CounterId>>,
    /// Send channel to the client's WebSocket write task.
    tx: mpsc::Sender<Utf8Bytes>,
    pub connected_at: Instant,
    /// Whether the client has responded since the last heartbeat check.
    pub is_alive: AtomicBool,
    /// Count of messages dropped due to a full or closed channel.
    pub dropped_messages: AtomicU64,
}

impl ClientConnection {
    /// Create a connection with a fresh id.
    pub fn new(tx: mpsc::Sender<Utf8Bytes>) -> Self {
        Self::with_id(ConnectionId::new(), tx)
    }

    pub fn with_id(id: ConnectionId, tx: mpsc::Sender<Utf8Bytes>) -> Self {
        let now = Instant::now();
        Self {
            id,
            topics: Mutex::new(HashSet::new()),
            tx,
            connected_at: now,
            is_alive: AtomicBool::new(true),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Join a counter's topic. Returns `true` if newly joined.
    pub fn join(&self, counter_id: &CounterId) -> bool {
        self.topics.lock().insert(counter_id.clone())
    }

    /// Leave a counter's topic. Returns `true` if it was joined.
    pub fn leave(&self, counter_id: &CounterId) -> bool {
        self.topics.lock().remove(counter_id)
    }

    pub fn is_subscribed(&self, counter_id: &CounterId) -> bool {
        self.topics.lock().contains(counter_id)
    }

    /// Joined topics, sorted.
    pub fn topics(&self) -> Vec<CounterId> {
        let mut topics: Vec<_> = self.topics.lock().iter().cloned().collect();
        topics.sort();
        topics
    }

    /// Queue a text frame for the write task. Clones of one frame share
    /// their buffer.
    ///
    /// Returns `false` if the channel is full or closed, and increments
    /// the dropped message counter.
    pub fn send(&self, message: Utf8Bytes) -> bool {
        if self.tx.try_send(message).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Serialize a server message and queue it for this connection only.
    pub fn send_message(&self, message: &ServerMessage) -> bool {
        match serde_json::to_string(message) {
            Ok(json) => self.send(Utf8Bytes::from(json)),
            Err(e) => {
                warn!(conn_id = %self.id, error = %e, "failed to serialize server message");
                false
            }
        }
    }

    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Mark the connection as alive (pong or any inbound frame received).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
    }

    /// Check and reset the alive flag for heartbeat.
    ///
    /// Returns `true` if the connection was alive since the last check.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
