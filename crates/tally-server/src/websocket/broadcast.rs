//! Fan-out of post-mutation updates to connected clients.

use std::sync::Arc;

use axum::extract::ws::Utf8Bytes;
use tally_core::{CounterId, CounterUpdate};
use tally_settings::BroadcastScope;
use tracing::{debug, warn};

use super::connection::ClientConnection;
use super::registry::ConnectionManager;
use crate::metrics::{BROADCASTS_TOTAL, BROADCAST_DROPS_TOTAL};
use crate::protocol::ServerMessage;

/// Result of one publish.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Connections the message was queued for.
    pub delivered: usize,
    /// Connections whose queue was full or closed.
    pub dropped: usize,
}

/// Publishes `counterUpdated` messages to recipients chosen by scope.
#[derive(Clone)]
pub struct Broadcaster {
    connections: Arc<ConnectionManager>,
    scope: BroadcastScope,
}

impl Broadcaster {
    pub fn new(connections: Arc<ConnectionManager>, scope: BroadcastScope) -> Self {
        Self { connections, scope }
    }

    /// Publish `update` for `counter_id`.
    ///
    /// The frame is serialized once and its buffer shared across recipients.
    /// A slow recipient loses this message; others are unaffected.
    pub async fn publish(&self, counter_id: &CounterId, update: CounterUpdate) -> Delivery {
        let event = update.mutation().event_name();
        let message = ServerMessage::CounterUpdated {
            counter_id: counter_id.clone(),
            data: update,
        };
        let frame = match serde_json::to_string(&message) {
            Ok(j) => Utf8Bytes::from(j),
            Err(e) => {
                warn!(counter_id = %counter_id, event, error = %e, "failed to serialize update");
                return Delivery::default();
            }
        };

        let recipients = self.recipients(counter_id).await;
        let mut delivery = Delivery::default();
        for conn in &recipients {
            if conn.send(frame.clone()) {
                delivery.delivered += 1;
            } else {
                delivery.dropped += 1;
                warn!(conn_id = %conn.id, counter_id = %counter_id, "failed to send update to client");
            }
        }

        metrics::counter!(BROADCASTS_TOTAL, "event" => event).increment(1);
        if delivery.dropped > 0 {
            metrics::counter!(BROADCAST_DROPS_TOTAL).increment(delivery.dropped as u64);
        }
        debug!(
            counter_id = %counter_id,
            event,
            scope = ?self.scope,
            recipients = recipients.len(),
            dropped = delivery.dropped,
            "broadcast counter update"
        );
        delivery
    }

    async fn recipients(&self, counter_id: &CounterId) -> Vec<Arc<ClientConnection>> {
        match self.scope {
            BroadcastScope::Topic => self.connections.subscribers(counter_id).await,
            BroadcastScope::All => self.connections.all().await,
        }
    }
}
