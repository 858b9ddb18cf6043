//! `/health` endpoint.

use std::time::Instant;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// `"OK"`, or `"DEGRADED"` when the store check fails.
    pub status: &'static str,
    /// RFC 3339 time of the check.
    pub timestamp: String,
    /// Seconds since the server started.
    pub uptime: f64,
    /// Current WebSocket connection count.
    pub connections: usize,
    /// `"ok"` or `"error"`.
    pub database: &'static str,
}

impl HealthResponse {
    pub fn is_healthy(&self) -> bool {
        self.status == "OK"
    }
}

/// Build a health response from live counters.
pub fn health_check(start_time: Instant, connections: usize, database_ok: bool) -> HealthResponse {
    HealthResponse {
        status: if database_ok { "OK" } else { "DEGRADED" },
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        uptime: start_time.elapsed().as_secs_f64(),
        connections,
        database: if database_ok { "ok" } else { "error" },
    }
}
