//! Server network, protocol and fan-out settings.

use serde::{Deserialize, Serialize};

/// Which connections receive a counter's updates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BroadcastScope {
    /// Every live connection.
    #[default]
    All,
    /// Connections that addressed or subscribed to the counter.
    Topic,
}

impl std::str::FromStr for BroadcastScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "topic" => Ok(Self::Topic),
            "all" => Ok(Self::All),
            other => Err(format!("unknown broadcast scope: {other}")),
        }
    }
}

/// Server network and runtime settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// HTTP + WebSocket port.
    pub port: u16,
    /// Origin allowed by CORS.
    pub client_origin: String,
    /// Maximum concurrent WebSocket connections.
    pub max_connections: usize,
    /// Per-connection outbound queue capacity.
    pub max_send_queue: usize,
    /// Seconds between server pings.
    pub heartbeat_interval_secs: u64,
    /// Close a connection after this many seconds without a pong.
    pub heartbeat_timeout_secs: u64,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Recipients of `counterUpdated`.
    pub broadcast_scope: BroadcastScope,
    /// Reply `COUNTER_NOT_FOUND` to the sender of an event for an unknown id.
    pub report_not_found: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            client_origin: "http://localhost:3000".to_string(),
            max_connections: 1024,
            max_send_queue: 256,
            heartbeat_interval_secs: 25,
            heartbeat_timeout_secs: 60,
            max_message_size: 64 * 1024,
            broadcast_scope: BroadcastScope::All,
            report_not_found: false,
        }
    }
}
