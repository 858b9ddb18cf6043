//! # tally-settings
//!
//! Configuration for the tally server.
//!
//! Loading order (later wins): compiled defaults, `~/.tally/settings.json`
//! (deep-merged), environment variables. The binary applies CLI flags last.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{IgnoredEnvVar, LoadedSettings, load_settings, load_settings_from_path, settings_path};
pub use types::{BroadcastScope, LogFormat, LoggingSettings, ServerSettings, StoreSettings, TallySettings};
