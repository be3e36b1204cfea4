//! Configuration module for the harvester
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Secrets referenced through environment variables and proxy list files are
//! resolved here, once, so the rest of the crate only ever sees a complete,
//! immutable [`Config`].
//!
//! # Example
//!
//! ```no_run
//! use company_harvester::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Harvesting {} categories", config.categories.len());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    CategoryEntry, Config, FetchConfig, PaginationConfig, ProxyBackend, ProxyConfig,
    PublicListConfig, RelayConfig, ReportConfig, ResidentialConfig, StorageConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, resolve_secrets};
