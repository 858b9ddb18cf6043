//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`, so a
//! settings file may specify any subset of fields.

mod logging;
mod server;

pub use logging::*;
pub use server::*;

use serde::{Deserialize, Serialize};

/// Root settings type for the tally server.
///
/// ```json
/// {
///   "server": { "port": 4000, "broadcastScope": "all" },
///   "store": { "dbPath": "/var/lib/tally/tally.db" }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TallySettings {
    /// Network, protocol and fan-out settings.
    pub server: ServerSettings,
    /// Counter store settings.
    pub store: StoreSettings,
    /// Log level and format.
    pub logging: LoggingSettings,
}

/// Counter store settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreSettings {
    /// SQLite database file.
    pub db_path: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            db_path: crate::loader::tally_dir()
                .join("tally.db")
                .to_string_lossy()
                .into_owned(),
        }
    }
}
