//! Per-connection socket loop.
//!
//! Splits the socket into a writer task (outbound queue + pings) and a
//! reader loop (inbound frames to the router), supervised alongside the
//! heartbeat. Whichever ends first tears the connection down.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::connection::ClientConnection;
use super::heartbeat::{HeartbeatResult, run_heartbeat};
use crate::metrics::{
    WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_REJECTED_TOTAL, WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL,
};
use crate::protocol::ProtocolError;
use crate::router::EventRouter;
use crate::server::AppState;

/// Why a connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    ClientClosed,
    ReadError,
    WriteFailed,
    HeartbeatTimeout,
    Shutdown,
}

/// Run a connection from upgrade to teardown.
pub async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let (tx, rx) = mpsc::channel(state.config.max_send_queue);
    let conn = Arc::new(ClientConnection::new(tx));

    if !state
        .connections
        .try_register(Arc::clone(&conn), state.config.max_connections)
        .await
    {
        warn!(conn_id = %conn.id, "connection limit reached after upgrade, closing");
        metrics::counter!(WS_CONNECTIONS_REJECTED_TOTAL).increment(1);
        let _ = socket
            .send(Message::Close(Some(CloseFrame {
                code: 1013,
                reason: Utf8Bytes::from_static("server at capacity"),
            })))
            .await;
        return;
    }

    metrics::counter!(WS_CONNECTIONS_TOTAL).increment(1);
    metrics::gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);
    info!(conn_id = %conn.id, "client connected");

    let cancel = state.shutdown.child_token();
    let interval = Duration::from_secs(state.config.heartbeat_interval_secs);
    let timeout = Duration::from_secs(state.config.heartbeat_timeout_secs);
    let (ws_tx, ws_rx) = socket.split();

    let mut writer = tokio::spawn(write_loop(ws_tx, rx, interval, cancel.clone()));
    let mut heartbeat = tokio::spawn(run_heartbeat(Arc::clone(&conn), interval, timeout, cancel.clone()));

    let reason = tokio::select! {
        reason = read_loop(ws_rx, &conn, &state.router) => reason,
        _ = &mut writer => CloseReason::WriteFailed,
        result = &mut heartbeat => match result {
            Ok(HeartbeatResult::TimedOut) => CloseReason::HeartbeatTimeout,
            _ => CloseReason::Shutdown,
        },
    };

    // Stops whichever of the writer and heartbeat is still running; the
    // writer sends a close frame on its way out.
    cancel.cancel();

    let _ = state.connections.unregister(&conn.id).await;
    metrics::counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    metrics::gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    info!(
        conn_id = %conn.id,
        reason = ?reason,
        dropped = conn.drop_count(),
        age_secs = conn.age().as_secs(),
        "client disconnected"
    );
}

async fn read_loop(
    mut ws_rx: SplitStream<WebSocket>,
    conn: &Arc<ClientConnection>,
    router: &Arc<EventRouter>,
) -> CloseReason {
    while let Some(frame) = ws_rx.next().await {
        let msg = match frame {
            Ok(msg) => msg,
            Err(e) => {
                debug!(conn_id = %conn.id, error = %e, "websocket read error");
                return CloseReason::ReadError;
            }
        };
        conn.mark_alive();
        match msg {
            Message::Text(text) => {
                let _ = router.dispatch(conn, text.as_str());
            }
            Message::Binary(_) => router.reject(conn, &ProtocolError::BinaryFrame),
            // axum answers pings itself
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Close(_) => return CloseReason::ClientClosed,
        }
    }
    CloseReason::ClientClosed
}

async fn write_loop(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Utf8Bytes>,
    ping_every: Duration,
    cancel: CancellationToken,
) {
    let mut ping = tokio::time::interval(ping_every);
    ping.tick().await;

    loop {
        tokio::select! {
            msg = rx.recv() => match msg {
                Some(text) => {
                    if ws_tx.send(Message::Text(text)).await.is_err() {
                        return;
                    }
                }
                None => break,
            },
            _ = ping.tick() => {
                if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                    return;
                }
                trace!("sent ping");
            }
            () = cancel.cancelled() => break,
        }
    }

    let _ = ws_tx.send(Message::Close(None)).await;
}
