//! Storage module for persisting harvested companies
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Idempotent upserts keyed by the portal's company id
//! - Run tracking (start, finish, outcome)

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{Store, StorageError, StorageResult};

use serde::Deserialize;
use std::path::Path;

/// Opens (or creates) the store database
pub fn open_store(path: &Path, write_mode: WriteMode) -> StorageResult<SqliteStore> {
    SqliteStore::new(path, write_mode)
}

/// A company as listed by the portal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Portal-assigned id, unique across the whole portal
    pub source_id: String,
    pub name: String,
    pub legal_type: String,
    pub city: String,
    /// Category the record was harvested from
    pub category_url: String,
}

/// What `upsert` does when the id is already stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Keep the stored row untouched
    #[default]
    Skip,
    /// Replace the stored fields with the new ones
    Overwrite,
}

/// Result of an upsert
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    /// Already present; carries the stored row
    Skipped(Record),
    Updated,
}

/// A harvest run as recorded in the database
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Status of a harvest run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Cancelled,
    Aborted,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Aborted => "aborted",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            "aborted" => Some(Self::Aborted),
            _ => None,
        }
    }
}
