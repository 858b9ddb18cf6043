/// SQL DDL for the tally-store database.
/// WAL mode + busy timeout applied at connection time.
pub const SCHEMA_VERSION: u32 = 1;

pub const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS counters (
    id TEXT PRIMARY KEY,
    count INTEGER NOT NULL DEFAULT 0 CHECK (count >= 0),
    all_time_high INTEGER NOT NULL DEFAULT 0 CHECK (all_time_high >= count),
    player_count INTEGER NOT NULL DEFAULT 0 CHECK (player_count >= 0),
    reset_count INTEGER NOT NULL DEFAULT 0 CHECK (reset_count >= 0),
    regret_count INTEGER NOT NULL DEFAULT 0 CHECK (regret_count >= 0),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);
"#;

pub const PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA busy_timeout = 5000;
PRAGMA synchronous = NORMAL;
"#;
