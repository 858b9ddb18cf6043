//! Prometheus metrics recorder and `/metrics` endpoint handler.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

use crate::errors::ServerError;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Call once at startup before any metrics are recorded.
pub fn install_recorder() -> Result<PrometheusHandle, ServerError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ServerError::Metrics(e.to_string()))?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

// Metric name constants to avoid typos across modules.

/// Inbound counter events handled (counter, labels: event).
pub const EVENTS_TOTAL: &str = "tally_events_total";
/// Inbound counter events that failed (counter, labels: event, kind).
pub const EVENT_ERRORS_TOTAL: &str = "tally_event_errors_total";
/// Event handling duration seconds (histogram, labels: event).
pub const EVENT_DURATION_SECONDS: &str = "tally_event_duration_seconds";
/// `counterUpdated` messages published (counter, labels: event).
pub const BROADCASTS_TOTAL: &str = "tally_broadcasts_total";
/// Per-recipient deliveries dropped on a full or closed queue (counter).
pub const BROADCAST_DROPS_TOTAL: &str = "tally_broadcast_drops_total";
/// Frames rejected before routing (counter, labels: code).
pub const INVALID_FRAMES_TOTAL: &str = "tally_invalid_frames_total";
/// WebSocket connections opened total (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket disconnections total (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Active WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Upgrades refused because the connection limit was reached (counter).
pub const WS_CONNECTIONS_REJECTED_TOTAL: &str = "ws_connections_rejected_total";
