//! Company Harvester: a proxy-rotating listing scraper
//!
//! This crate walks the paginated category listings of a business portal,
//! extracts company records from every page and stores them in a SQLite
//! database. Requests go out through rotating proxies so that IP bans on one
//! exit address do not stall the run, and pages that cannot be fetched are
//! written to a skip report for later replay.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod fetch;
pub mod proxy;
pub mod report;
pub mod storage;

use thiserror::Error;

/// Main error type for harvester operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Proxy error: {0}")]
    Proxy(#[from] proxy::ProxyError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Extractor error: {0}")]
    Extract(#[from] extract::ExtractError),

    #[error("Skip report error: {0}")]
    Report(#[from] report::ReportError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarvestError {
    /// Returns true if this error aborted a run that had already started
    ///
    /// Proxy exhaustion and storage failures stop the harvest midway and are
    /// reported with a distinct exit status. Everything else is a start-up
    /// problem.
    pub fn is_fatal_abort(&self) -> bool {
        matches!(
            self,
            Self::Proxy(proxy::ProxyError::Exhausted { .. }) | Self::Storage(_)
        )
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Missing secret: environment variable {0} is not set")]
    MissingSecret(String),
}

/// Result type alias for harvester operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CancelToken, Orchestrator, RunSummary};
pub use fetch::{FetchClient, FetchOutcome};
pub use proxy::{ProxyHandle, ProxySource};
pub use report::{SkipEntry, SkipReport};
pub use storage::{Record, SqliteStore, Store, UpsertOutcome, WriteMode};
