//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::storage::{Record, RunRecord, RunStatus, UpsertOutcome, WriteMode};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A uniqueness constraint fired; `upsert` never lets this happen
    #[error("Constraint violation for source id {0}")]
    ConstraintViolation(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Uniqueness of `source_id` must be enforced by the backend itself, not by
/// callers checking `contains` first.
pub trait Store: Send {
    // ===== Records =====

    /// Inserts the record, or applies the write mode if the id exists
    ///
    /// Each call is its own transaction.
    fn upsert(&mut self, record: &Record) -> StorageResult<UpsertOutcome>;

    /// Checks whether a record with this id is stored
    fn contains(&self, source_id: &str) -> StorageResult<bool>;

    /// Reads a record back by id
    fn get(&self, source_id: &str) -> StorageResult<Option<Record>>;

    /// Total number of stored records
    fn count(&self) -> StorageResult<u64>;

    /// Record counts per category, largest first
    fn count_by_category(&self) -> StorageResult<Vec<(String, u64)>>;

    /// The configured write mode
    fn write_mode(&self) -> WriteMode;

    // ===== Run Management =====

    /// Creates a new harvest run and returns its id
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by id
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Sets the final status and finish timestamp of a run
    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;
}
