use chrono::Utc;
use rusqlite::{OptionalExtension, Row};
use tracing::instrument;

use tally_core::{Counter, CounterId, Mutation};

use crate::database::Database;
use crate::error::StoreError;

const COLUMNS: &str = "id, count, all_time_high, player_count, reset_count, regret_count";

/// Raw integer columns as SQLite hands them back.
struct CounterRow {
    id: String,
    count: i64,
    all_time_high: i64,
    player_count: i64,
    reset_count: i64,
    regret_count: i64,
}

impl CounterRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            count: row.get(1)?,
            all_time_high: row.get(2)?,
            player_count: row.get(3)?,
            reset_count: row.get(4)?,
            regret_count: row.get(5)?,
        })
    }

    fn into_counter(self) -> Result<Counter, StoreError> {
        Ok(Counter {
            id: CounterId::from_raw(self.id),
            count: non_negative(self.count, "count")?,
            all_time_high: non_negative(self.all_time_high, "all_time_high")?,
            player_count: non_negative(self.player_count, "player_count")?,
            reset_count: non_negative(self.reset_count, "reset_count")?,
            regret_count: non_negative(self.regret_count, "regret_count")?,
        })
    }
}

fn non_negative(raw: i64, column: &'static str) -> Result<u64, StoreError> {
    u64::try_from(raw).map_err(|_| StoreError::CorruptRow {
        table: "counters",
        column,
        detail: format!("negative value {raw}"),
    })
}

fn to_sql_int(value: u64, column: &'static str) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::Conflict(format!("{column} out of range: {value}")))
}

/// The `SET` clause executing `mutation` against the row's current values.
///
/// Right-hand sides see the pre-update row, so `count + 1` in the
/// `all_time_high` term is the new count.
fn set_clause(mutation: Mutation) -> &'static str {
    match mutation {
        Mutation::Increment => "count = count + 1, all_time_high = MAX(all_time_high, count + 1)",
        Mutation::Reset => "count = 0, player_count = 0, reset_count = reset_count + 1",
        Mutation::FirstLoad => "player_count = player_count + 1",
        Mutation::Regret => "regret_count = regret_count + 1",
    }
}

/// Counter persistence. Reads and single-statement atomic updates.
#[derive(Clone)]
pub struct CounterRepo {
    db: Database,
}

impl CounterRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Provision a zeroed counter.
    pub fn create(&self, id: &CounterId) -> Result<Counter, StoreError> {
        self.create_with(&Counter::new(id.clone()))
    }

    /// Provision a counter with explicit starting values.
    #[instrument(skip(self, counter), fields(counter_id = %counter.id))]
    pub fn create_with(&self, counter: &Counter) -> Result<Counter, StoreError> {
        let now = Utc::now().to_rfc3339();
        let values = [
            to_sql_int(counter.count, "count")?,
            to_sql_int(counter.all_time_high, "all_time_high")?,
            to_sql_int(counter.player_count, "player_count")?,
            to_sql_int(counter.reset_count, "reset_count")?,
            to_sql_int(counter.regret_count, "regret_count")?,
        ];
        self.db.with_conn(|conn| {
            let exists = conn
                .query_row("SELECT 1 FROM counters WHERE id = ?1", [counter.id.as_str()], |_| Ok(()))
                .optional()?
                .is_some();
            if exists {
                return Err(StoreError::Conflict(format!("counter {} already exists", counter.id)));
            }
            let _ = conn.execute(
                "INSERT INTO counters
                 (id, count, all_time_high, player_count, reset_count, regret_count, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                rusqlite::params![
                    counter.id.as_str(),
                    values[0],
                    values[1],
                    values[2],
                    values[3],
                    values[4],
                    now
                ],
            )?;
            Ok(counter.clone())
        })
    }

    /// Fetch a counter by id. `None` when no such counter exists.
    #[instrument(skip(self), fields(counter_id = %id))]
    pub fn fetch_by_id(&self, id: &CounterId) -> Result<Option<Counter>, StoreError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM counters WHERE id = ?1"),
                [id.as_str()],
                CounterRow::read,
            )
            .optional()?
            .map(CounterRow::into_counter)
            .transpose()
        })
    }

    /// Apply `mutation` in a single `UPDATE … RETURNING` statement and return
    /// the post-mutation row. `None` when no such counter exists.
    #[instrument(skip(self), fields(counter_id = %id, mutation = %mutation))]
    pub fn atomic_update(&self, id: &CounterId, mutation: Mutation) -> Result<Option<Counter>, StoreError> {
        let now = Utc::now().to_rfc3339();
        let sql = format!(
            "UPDATE counters SET {}, updated_at = ?2 WHERE id = ?1 RETURNING {COLUMNS}",
            set_clause(mutation)
        );
        self.db.with_conn(|conn| {
            conn.query_row(&sql, rusqlite::params![id.as_str(), now], CounterRow::read)
                .optional()?
                .map(CounterRow::into_counter)
                .transpose()
        })
    }

    /// List every counter, oldest first.
    #[instrument(skip(self))]
    pub fn list(&self) -> Result<Vec<Counter>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM counters ORDER BY created_at ASC, id ASC"
            ))?;
            let rows = stmt
                .query_map([], CounterRow::read)?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(CounterRow::into_counter).collect()
        })
    }

    /// Cheap connectivity check.
    pub fn ping(&self) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let _: i64 = conn.query_row("SELECT 1", [], |row| row.get(0))?;
            Ok(())
        })
    }
}
