//! Harvest loop
//!
//! This module drives a run end to end:
//! - Walking each category page by page
//! - Feeding pages through fetch, extraction and storage
//! - Recording pages that fail in the skip report
//! - Stopping cleanly on cancellation or on fatal errors

mod cursor;
mod orchestrator;

pub use cursor::{page_url, CategoryCursor};
pub use orchestrator::{Orchestrator, RunSummary};

use crate::config::Config;
use crate::report::SkipEntry;
use crate::HarvestError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag asking the harvest loop to stop at the next page boundary
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runs a complete harvest over the configured categories
///
/// With `replay` set, only the listed pages are fetched instead.
///
/// # Arguments
///
/// * `config` - The harvester configuration
/// * `config_hash` - Hash of the config file, stored with the run
/// * `cancel` - Token checked before every page
/// * `replay` - Entries of an earlier skip report to retry
///
/// # Returns
///
/// * `Ok(RunSummary)` - Run completed or was cancelled
/// * `Err(HarvestError)` - Start-up failed or the run aborted
pub async fn run_harvest(
    config: &Config,
    config_hash: &str,
    cancel: CancelToken,
    replay: Option<Vec<SkipEntry>>,
) -> Result<RunSummary, HarvestError> {
    let mut orchestrator = Orchestrator::from_config(config)?
        .with_cancel_token(cancel)
        .with_config_hash(config_hash);

    match replay {
        Some(entries) => orchestrator.replay(&entries).await,
        None => {
            let categories: Vec<String> =
                config.categories.iter().map(|c| c.url.clone()).collect();
            orchestrator.run(&categories).await
        }
    }
}
