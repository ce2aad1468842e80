//! Durable ledger and quiz storage backed by `SQLite`.
//!
//! The `spin_ledger` table is keyed on `identifier`. A spin is committed by a
//! single `INSERT .. ON CONFLICT .. DO UPDATE .. WHERE` statement whose date
//! guard rejects a second write for the same calendar date, so the check and
//! the write cannot be split by another writer even across processes sharing
//! the database file.
//!
//! Dates are stored as ISO-8601 `YYYY-MM-DD` text, which orders correctly
//! under plain string comparison.
use chrono::NaiveDate;
use log::debug;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::StorageError;
use crate::identifier::Identifier;
use crate::ledger::{LedgerStore, SpinCommit, SpinLedgerEntry};
use crate::quiz::{QuizResult, QuizStats, QuizStore, round_pct};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const UPSERT_SPIN: &str = "INSERT INTO spin_ledger (identifier, last_spin_date, total_spins, total_wins)
     VALUES (?1, ?2, 1, ?3)
     ON CONFLICT(identifier) DO UPDATE SET
         last_spin_date = excluded.last_spin_date,
         total_spins = spin_ledger.total_spins + 1,
         total_wins = spin_ledger.total_wins + excluded.total_wins
     WHERE spin_ledger.last_spin_date < excluded.last_spin_date
     RETURNING identifier, last_spin_date, total_spins, total_wins";

const SELECT_ENTRY: &str = "SELECT identifier, last_spin_date, total_spins, total_wins
     FROM spin_ledger WHERE identifier = ?1";

type RawEntry = (String, NaiveDate, i64, i64);

/// `SQLite`-backed store implementing both [`LedgerStore`] and [`QuizStore`].
#[derive(Debug, Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) a database file and initialize the schema.
    ///
    /// # Errors
    ///
    /// Returns a `StorageError` if the file cannot be opened or the schema
    /// cannot be created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Self::from_connection(conn)
    }

    /// Private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns a `StorageError` if `SQLite` cannot allocate the database.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Initializes the database schema.
    ///
    /// # Errors
    ///
    /// Returns the underlying `rusqlite` error if a statement fails.
    pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS spin_ledger (
                identifier TEXT PRIMARY KEY NOT NULL,
                last_spin_date TEXT NOT NULL,
                total_spins INTEGER NOT NULL,
                total_wins INTEGER NOT NULL,
                CHECK (total_wins >= 0 AND total_wins <= total_spins)
            )",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS quiz_results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                quiz_id TEXT NOT NULL,
                score INTEGER NOT NULL,
                max_score INTEGER NOT NULL,
                duration_secs INTEGER,
                recorded_at TEXT NOT NULL,
                CHECK (max_score > 0 AND score <= max_score)
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_quiz_results_quiz_id ON quiz_results(quiz_id)",
            [],
        )?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }
}

fn read_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawEntry> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn into_entry(
    (identifier, last_spin_date, spins, wins): RawEntry,
) -> Result<SpinLedgerEntry, StorageError> {
    let counter = |value: i64, field: &str| {
        u64::try_from(value).map_err(|_| StorageError::CorruptRow {
            key: identifier.clone(),
            detail: format!("{field} is negative ({value})"),
        })
    };
    let total_spins = counter(spins, "total_spins")?;
    let total_wins = counter(wins, "total_wins")?;
    Ok(SpinLedgerEntry {
        identifier,
        last_spin_date,
        total_spins,
        total_wins,
    })
}

impl LedgerStore for SqliteStore {
    fn get(&self, identifier: &Identifier) -> Result<Option<SpinLedgerEntry>, StorageError> {
        let conn = self.lock()?;
        conn.query_row(SELECT_ENTRY, params![identifier.as_str()], read_entry)
            .optional()?
            .map(into_entry)
            .transpose()
    }

    fn upsert_spin(
        &self,
        identifier: &Identifier,
        today: NaiveDate,
        won: bool,
    ) -> Result<SpinCommit, StorageError> {
        let conn = self.lock()?;
        let written = conn
            .query_row(
                UPSERT_SPIN,
                params![identifier.as_str(), today, i64::from(won)],
                read_entry,
            )
            .optional()?;
        if let Some(raw) = written {
            return into_entry(raw).map(SpinCommit::Committed);
        }
        debug!("date guard refused spin write for {}", identifier.log_tag());
        let existing = conn.query_row(SELECT_ENTRY, params![identifier.as_str()], read_entry)?;
        into_entry(existing).map(SpinCommit::AlreadySpun)
    }
}

impl QuizStore for SqliteStore {
    fn insert(&self, result: &QuizResult) -> Result<(), StorageError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO quiz_results (quiz_id, score, max_score, duration_secs, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                result.quiz_id,
                result.score,
                result.max_score,
                result.duration_secs,
                result.recorded_at
            ],
        )?;
        Ok(())
    }

    fn stats(&self) -> Result<Vec<QuizStats>, StorageError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT quiz_id,
                    COUNT(*),
                    AVG(score * 100.0 / max_score),
                    MAX(score),
                    SUM(CASE WHEN score = max_score THEN 1 ELSE 0 END)
             FROM quiz_results
             GROUP BY quiz_id
             ORDER BY quiz_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, u32>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?;

        let mut stats = Vec::new();
        for row in rows {
            let (quiz_id, attempts, average_pct, best_score, perfect) = row?;
            let attempts = u64::try_from(attempts).map_err(|_| StorageError::CorruptRow {
                key: quiz_id.clone(),
                detail: "negative attempt count".to_string(),
            })?;
            let perfect_scores = u64::try_from(perfect).map_err(|_| StorageError::CorruptRow {
                key: quiz_id.clone(),
                detail: "negative perfect count".to_string(),
            })?;
            stats.push(QuizStats {
                quiz_id,
                attempts,
                average_pct: round_pct(average_pct),
                best_score,
                perfect_scores,
            });
        }
        Ok(stats)
    }
}
