//! Skip report: the ledger of pages that could not be harvested
//!
//! Entries accumulate in memory during the run and are written as a JSON
//! array. The file is always rewritten whole, through a temporary file and a
//! rename, so a crash never leaves a half-written report behind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while reading or writing the skip report
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("JSON error on {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// One page that failed permanently
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipEntry {
    pub category_url: String,
    pub page_number: u32,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

impl SkipEntry {
    pub fn new(category_url: impl Into<String>, page_number: u32, reason: impl Into<String>) -> Self {
        Self {
            category_url: category_url.into(),
            page_number,
            reason: reason.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Append-only accumulator of skip entries
pub struct SkipReport {
    path: PathBuf,
    entries: Vec<SkipEntry>,
    flush_every: Option<usize>,
    unflushed: usize,
}

impl SkipReport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Vec::new(),
            flush_every: None,
            unflushed: 0,
        }
    }

    /// Also flush after every `n` new entries
    pub fn with_flush_every(mut self, n: Option<usize>) -> Self {
        self.flush_every = n.filter(|n| *n > 0);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[SkipEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends an entry, flushing if the periodic threshold is reached
    ///
    /// A failed periodic flush is logged and retried at the next threshold;
    /// the entry stays in memory for the final [`flush`](SkipReport::flush).
    pub fn record(&mut self, entry: SkipEntry) {
        tracing::debug!(
            "Recording skipped page {} of {}: {}",
            entry.page_number,
            entry.category_url,
            entry.reason
        );
        self.entries.push(entry);
        self.unflushed += 1;

        if let Some(every) = self.flush_every {
            if self.unflushed >= every {
                if let Err(e) = self.flush().map(|_| ()) {
                    tracing::warn!("Periodic skip report flush failed: {}", e);
                    self.unflushed = 0;
                }
            }
        }
    }

    /// Writes every entry recorded so far to the report file
    pub fn flush(&mut self) -> Result<&Path, ReportError> {
        let json = serde_json::to_string_pretty(&self.entries).map_err(|source| ReportError::Json {
            path: self.path.clone(),
            source,
        })?;

        let io_err = |source| ReportError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)?;

        self.unflushed = 0;
        tracing::info!(
            "Skip report with {} entries written to {}",
            self.entries.len(),
            self.path.display()
        );
        Ok(&self.path)
    }

    /// Reads a report written by [`flush`](SkipReport::flush)
    pub fn load(path: &Path) -> Result<Vec<SkipEntry>, ReportError> {
        let content = fs::read_to_string(path).map_err(|source| ReportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ReportError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}
