//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Store trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{StorageError, StorageResult, Store};
use crate::storage::{Record, RunRecord, RunStatus, UpsertOutcome, WriteMode};
use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;

const SELECT_RECORD: &str =
    "SELECT source_id, name, legal_type, city, category_url FROM companies WHERE source_id = ?1";

/// SQLite storage backend
pub struct SqliteStore {
    conn: Connection,
    write_mode: WriteMode,
}

impl SqliteStore {
    /// Opens or creates the database at `path`
    pub fn new(path: &Path, write_mode: WriteMode) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        // WAL keeps committed rows intact if the process dies mid-write
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn, write_mode })
    }

    /// Creates an in-memory database
    pub fn new_in_memory(write_mode: WriteMode) -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn, write_mode })
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<Record> {
    Ok(Record {
        source_id: row.get(0)?,
        name: row.get(1)?,
        legal_type: row.get(2)?,
        city: row.get(3)?,
        category_url: row.get(4)?,
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?).unwrap_or(RunStatus::Running),
    })
}

/// Maps a uniqueness failure to `ConstraintViolation`, anything else to `Sqlite`
fn map_constraint(e: rusqlite::Error, source_id: &str) -> StorageError {
    match &e {
        rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation => {
            StorageError::ConstraintViolation(source_id.to_string())
        }
        _ => StorageError::Sqlite(e),
    }
}

impl Store for SqliteStore {
    // ===== Records =====

    fn upsert(&mut self, record: &Record) -> StorageResult<UpsertOutcome> {
        if record.source_id.trim().is_empty() {
            return Err(StorageError::InvalidRecord(format!(
                "empty source id for '{}'",
                record.name
            )));
        }

        let now = Utc::now().to_rfc3339();

        // IMMEDIATE takes the write lock up front, so the existence check and
        // the write cannot interleave with another writer.
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing = tx
            .query_row(SELECT_RECORD, params![record.source_id], record_from_row)
            .optional()?;

        let outcome = match (existing, self.write_mode) {
            (None, _) => {
                tx.execute(
                    "INSERT INTO companies
                     (source_id, name, legal_type, city, category_url, first_seen_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                    params![
                        record.source_id,
                        record.name,
                        record.legal_type,
                        record.city,
                        record.category_url,
                        now
                    ],
                )
                .map_err(|e| map_constraint(e, &record.source_id))?;
                UpsertOutcome::Inserted
            }
            (Some(existing), WriteMode::Skip) => UpsertOutcome::Skipped(existing),
            (Some(_), WriteMode::Overwrite) => {
                tx.execute(
                    "UPDATE companies
                     SET name = ?2, legal_type = ?3, city = ?4, category_url = ?5, updated_at = ?6
                     WHERE source_id = ?1",
                    params![
                        record.source_id,
                        record.name,
                        record.legal_type,
                        record.city,
                        record.category_url,
                        now
                    ],
                )?;
                UpsertOutcome::Updated
            }
        };

        tx.commit()?;
        Ok(outcome)
    }

    fn contains(&self, source_id: &str) -> StorageResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM companies WHERE source_id = ?1",
                params![source_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn get(&self, source_id: &str) -> StorageResult<Option<Record>> {
        let record = self
            .conn
            .query_row(SELECT_RECORD, params![source_id], record_from_row)
            .optional()?;
        Ok(record)
    }

    fn count(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM companies", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_by_category(&self) -> StorageResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT category_url, COUNT(*) as count FROM companies
             GROUP BY category_url ORDER BY count DESC, category_url",
        )?;

        let counts = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get::<_, i64>(1)? as u64)))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(counts)
    }

    fn write_mode(&self) -> WriteMode {
        self.write_mode
    }

    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs WHERE id = ?1",
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }
}
