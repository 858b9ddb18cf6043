//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`TallySettings::default()`]
//! 2. If the settings file exists, deep-merge its values over defaults
//! 3. Apply environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::{BroadcastScope, LogFormat, TallySettings};

/// Root directory for tally's local state (`~/.tally`).
pub fn tally_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".tally")
}

/// Resolve the path to the settings file (`~/.tally/settings.json`).
pub fn settings_path() -> PathBuf {
    tally_dir().join("settings.json")
}

/// An override variable that was set but could not be parsed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IgnoredEnvVar {
    pub key: String,
    pub value: String,
}

/// Settings plus the env overrides that were rejected while loading them.
///
/// Loading usually happens before a tracing subscriber exists, so rejected
/// values are returned for the caller to log once logging is up.
#[derive(Clone, Debug)]
pub struct LoadedSettings {
    pub settings: TallySettings,
    pub ignored_env: Vec<IgnoredEnvVar>,
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<LoadedSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<LoadedSettings> {
    let mut settings = load_file(path)?;
    let ignored_env = apply_env_overrides(&mut settings);
    Ok(LoadedSettings { settings, ignored_env })
}

/// Defaults merged with the file at `path`, without env overrides.
fn load_file(path: &Path) -> Result<TallySettings> {
    let defaults = serde_json::to_value(TallySettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides from the process environment.
pub fn apply_env_overrides(settings: &mut TallySettings) -> Vec<IgnoredEnvVar> {
    apply_overrides_from(settings, |name| std::env::var(name).ok())
}

/// Apply overrides using `lookup` as the variable source.
///
/// Invalid values fall back to file/default and are returned.
pub fn apply_overrides_from<F>(settings: &mut TallySettings, lookup: F) -> Vec<IgnoredEnvVar>
where
    F: Fn(&str) -> Option<String>,
{
    let mut env = EnvReader {
        lookup,
        ignored: Vec::new(),
    };

    // ── Server settings ─────────────────────────────────────────────
    if let Some(v) = env.parsed("PORT", |s| parse_u16_range(s, 1, 65535)) {
        settings.server.port = v;
    }
    if let Some(v) = env.string("TALLY_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.string("CLIENT_ORIGIN") {
        settings.server.client_origin = v;
    }
    if let Some(v) = env.parsed("TALLY_BROADCAST_SCOPE", |s| s.parse::<BroadcastScope>().ok()) {
        settings.server.broadcast_scope = v;
    }
    if let Some(v) = env.parsed("TALLY_MAX_CONNECTIONS", |s| parse_usize_range(s, 1, 100_000)) {
        settings.server.max_connections = v;
    }
    if let Some(v) = env.parsed("TALLY_HEARTBEAT_INTERVAL", |s| parse_u64_range(s, 1, 3600)) {
        settings.server.heartbeat_interval_secs = v;
    }
    if let Some(v) = env.parsed("TALLY_REPORT_NOT_FOUND", parse_bool) {
        settings.server.report_not_found = v;
    }

    // ── Store settings ──────────────────────────────────────────────
    if let Some(v) = env.string("TALLY_DB_PATH") {
        settings.store.db_path = v;
    }

    // ── Logging settings ────────────────────────────────────────────
    if let Some(v) = env.string("TALLY_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.parsed("TALLY_LOG_FORMAT", parse_log_format) {
        settings.logging.format = v;
    }

    env.ignored
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse `json` or `pretty` (case-insensitive).
pub fn parse_log_format(val: &str) -> Option<LogFormat> {
    match val.to_lowercase().as_str() {
        "json" => Some(LogFormat::Json),
        "pretty" | "text" => Some(LogFormat::Pretty),
        _ => None,
    }
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

struct EnvReader<F> {
    lookup: F,
    ignored: Vec<IgnoredEnvVar>,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn parsed<T>(&mut self, name: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
        let val = self.string(name)?;
        let result = parse(&val);
        if result.is_none() {
            self.ignored.push(IgnoredEnvVar {
                key: name.to_string(),
                value: val,
            });
        }
        result
    }
}
