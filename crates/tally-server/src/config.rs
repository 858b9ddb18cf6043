//! Server configuration.

use tally_settings::{BroadcastScope, ServerSettings};

/// Runtime configuration for the tally server.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host to bind.
    pub host: String,
    /// Port to bind (`0` to auto-assign).
    pub port: u16,
    /// Origin allowed by the CORS layer.
    pub client_origin: String,
    /// Maximum concurrent WebSocket connections.
    pub max_connections: usize,
    /// Outbound queue capacity per connection.
    pub max_send_queue: usize,
    /// Heartbeat interval in seconds.
    pub heartbeat_interval_secs: u64,
    /// Close a connection after this many seconds without a pong.
    pub heartbeat_timeout_secs: u64,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Which connections receive `counterUpdated`.
    pub broadcast_scope: BroadcastScope,
    /// Reply `COUNTER_NOT_FOUND` to the sender when an id does not resolve.
    pub report_not_found: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from(&ServerSettings::default())
    }
}

impl From<&ServerSettings> for ServerConfig {
    fn from(s: &ServerSettings) -> Self {
        Self {
            host: s.host.clone(),
            port: s.port,
            client_origin: s.client_origin.clone(),
            max_connections: s.max_connections,
            max_send_queue: s.max_send_queue.max(1),
            heartbeat_interval_secs: s.heartbeat_interval_secs.max(1),
            heartbeat_timeout_secs: s.heartbeat_timeout_secs.max(1),
            max_message_size: s.max_message_size,
            broadcast_scope: s.broadcast_scope,
            report_not_found: s.report_not_found,
        }
    }
}

impl ServerConfig {
    /// `host:port` string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
