//! Event router: demultiplexes inbound frames to the counter state service.
//!
//! Every parsed event runs on its own task, so a slow store round trip
//! delays only that event. Failures are isolated to the event that caused
//! them; the connection stays open.

use std::sync::Arc;
use std::time::Instant;

use tally_core::{CounterError, CounterId, Mutation};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::metrics::{EVENT_DURATION_SECONDS, EVENT_ERRORS_TOTAL, EVENTS_TOTAL, INVALID_FRAMES_TOTAL};
use crate::protocol::{self, EventKind, InboundEvent, ProtocolError, ServerMessage};
use crate::service::CounterService;
use crate::websocket::broadcast::{Broadcaster, Delivery};
use crate::websocket::connection::ClientConnection;

/// What handling one event did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventOutcome {
    /// Mutation applied and published.
    Broadcast(Delivery),
    /// Subscribed; snapshot sent to the initiator.
    Snapshot,
    /// Left the topic.
    Unsubscribed,
    /// Id did not resolve. Nothing changed, nothing broadcast.
    NotFound,
    /// Store failed. Event abandoned, nothing broadcast.
    Failed,
}

pub struct EventRouter {
    service: CounterService,
    broadcaster: Broadcaster,
    report_not_found: bool,
}

impl EventRouter {
    pub fn new(service: CounterService, broadcaster: Broadcaster, report_not_found: bool) -> Self {
        Self {
            service,
            broadcaster,
            report_not_found,
        }
    }

    pub fn service(&self) -> &CounterService {
        &self.service
    }

    /// Parse a text frame and handle it on a new task.
    ///
    /// Malformed frames are answered with an `error` frame to `conn` and
    /// return `None`.
    pub fn dispatch(
        self: &Arc<Self>,
        conn: &Arc<ClientConnection>,
        text: &str,
    ) -> Option<JoinHandle<EventOutcome>> {
        match protocol::parse_inbound(text) {
            Ok(event) => {
                debug!(conn_id = %conn.id, event = %event.kind, counter_id = %event.counter_id, "dispatching event");
                let router = Arc::clone(self);
                let conn = Arc::clone(conn);
                Some(tokio::spawn(async move { router.handle(&conn, event).await }))
            }
            Err(err) => {
                self.reject(conn, &err);
                None
            }
        }
    }

    /// Answer an unusable frame with an `error` frame to its sender only.
    pub fn reject(&self, conn: &ClientConnection, err: &ProtocolError) {
        warn!(conn_id = %conn.id, code = err.code(), error = %err, "rejected inbound frame");
        metrics::counter!(INVALID_FRAMES_TOTAL, "code" => err.code()).increment(1);
        let _ = conn.send_message(&ServerMessage::protocol_error(err));
    }

    /// Handle one parsed event for `conn`.
    pub async fn handle(&self, conn: &ClientConnection, event: InboundEvent) -> EventOutcome {
        let started = Instant::now();
        let name = event.kind.name();
        metrics::counter!(EVENTS_TOTAL, "event" => name).increment(1);

        let outcome = match event.kind {
            EventKind::Mutate(mutation) => self.mutate(conn, &event.counter_id, mutation).await,
            EventKind::Subscribe => self.subscribe(conn, &event.counter_id).await,
            EventKind::Unsubscribe => {
                let _ = conn.leave(&event.counter_id);
                EventOutcome::Unsubscribed
            }
        };

        metrics::histogram!(EVENT_DURATION_SECONDS, "event" => name).record(started.elapsed().as_secs_f64());
        outcome
    }

    async fn mutate(&self, conn: &ClientConnection, id: &CounterId, mutation: Mutation) -> EventOutcome {
        match self.service.apply(id, mutation).await {
            Ok(update) => {
                // Join before publishing so the initiator sees its own update.
                let _ = conn.join(id);
                EventOutcome::Broadcast(self.broadcaster.publish(id, update).await)
            }
            Err(err) => self.fail(conn, mutation.event_name(), &err),
        }
    }

    async fn subscribe(&self, conn: &ClientConnection, id: &CounterId) -> EventOutcome {
        match self.service.snapshot(id).await {
            Ok(counter) => {
                let _ = conn.join(id);
                let _ = conn.send_message(&ServerMessage::CounterSnapshot {
                    counter_id: id.clone(),
                    data: counter,
                });
                EventOutcome::Snapshot
            }
            Err(err) => self.fail(conn, "subscribe", &err),
        }
    }

    fn fail(&self, conn: &ClientConnection, event: &'static str, err: &CounterError) -> EventOutcome {
        metrics::counter!(EVENT_ERRORS_TOTAL, "event" => event, "kind" => err.error_kind()).increment(1);
        match err {
            CounterError::NotFound(id) => {
                warn!(conn_id = %conn.id, counter_id = %id, event, "counter not found, event ignored");
                if self.report_not_found {
                    let _ = conn.send_message(&ServerMessage::not_found(id));
                }
                EventOutcome::NotFound
            }
            CounterError::StoreUnavailable(reason) => {
                error!(conn_id = %conn.id, event, error = %reason, "store unavailable, event abandoned");
                EventOutcome::Failed
            }
        }
    }
}
