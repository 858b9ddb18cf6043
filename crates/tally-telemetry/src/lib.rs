//! Tracing subscriber setup: env filter plus a JSON or pretty stdout layer.

use std::fmt::Write as _;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Stdout log line format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Json,
    Pretty,
}

/// Configuration for the telemetry subsystem.
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Default filter directive, e.g. `"info"`. Overridden by `RUST_LOG`.
    pub log_level: String,
    /// Per-module level overrides (e.g. `"tally_store"` => DEBUG).
    pub module_levels: Vec<(String, Level)>,
    pub format: OutputFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            module_levels: Vec::new(),
            format: OutputFormat::Json,
        }
    }
}

impl TelemetryConfig {
    /// The `EnvFilter` directive string built from this config.
    pub fn filter_directive(&self) -> String {
        let mut filter = self.log_level.trim().to_lowercase();
        if filter.is_empty() {
            filter.push_str("info");
        }
        for (module, level) in &self.module_levels {
            let _ = write!(filter, ",{module}={}", level.to_string().to_lowercase());
        }
        filter
    }
}

/// Initialize the global tracing subscriber. Call once at startup.
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_telemetry(config: &TelemetryConfig) -> bool {
    let directive = config.filter_directive();
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&directive))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = match config.format {
        OutputFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_span_list(true)
            .boxed(),
        OutputFormat::Pretty => tracing_subscriber::fmt::layer().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(env_filter))
        .try_init()
        .is_ok()
}
