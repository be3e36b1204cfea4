//! Orchestrator - the per-category pagination loop
//!
//! For every category the loop walks pages 1, 2, 3, ... and for each page:
//! 1. Fetches it through the rotating-proxy fetch client
//! 2. Extracts company records
//! 3. Upserts every record into the store
//! 4. Asks the extractor whether more pages follow
//!
//! A page that fails permanently is written to the skip report and the loop
//! moves on to the next page. Proxy exhaustion and storage failures abort the
//! whole run; the skip report is flushed first either way.

use crate::config::{Config, PaginationConfig};
use crate::crawler::cursor::{page_url, CategoryCursor};
use crate::crawler::CancelToken;
use crate::extract::{Extraction, FlagmaExtractor, RecordExtractor};
use crate::fetch::{FetchClient, FetchOutcome, ReqwestTransport, RetryPolicy};
use crate::proxy::build_proxy_source;
use crate::report::{SkipEntry, SkipReport};
use crate::storage::{RunStatus, SqliteStore, StorageError, Store, UpsertOutcome};
use crate::HarvestError;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Counters for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub categories_done: usize,
    pub pages_harvested: usize,
    pub pages_skipped: usize,
    pub records_inserted: usize,
    pub records_updated: usize,
    pub records_skipped: usize,
    /// The run stopped early because cancellation was requested
    pub cancelled: bool,
}

/// What happened to a single page
enum PageResult {
    Harvested(Extraction),
    Failed(String),
}

pub struct Orchestrator {
    fetcher: FetchClient,
    extractor: Box<dyn RecordExtractor>,
    store: Box<dyn Store>,
    report: SkipReport,
    pagination: PaginationConfig,
    cancel: CancelToken,
    config_hash: String,
}

impl Orchestrator {
    pub fn new(
        fetcher: FetchClient,
        extractor: Box<dyn RecordExtractor>,
        store: Box<dyn Store>,
        report: SkipReport,
        pagination: PaginationConfig,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            store,
            report,
            pagination,
            cancel: CancelToken::new(),
            config_hash: String::new(),
        }
    }

    /// Wires up the production components described by `config`
    pub fn from_config(config: &Config) -> Result<Self, HarvestError> {
        let proxies = build_proxy_source(&config.proxy)?;
        let transport = Arc::new(ReqwestTransport::new(config.fetch.clone()));
        let fetcher = FetchClient::new(transport, proxies, RetryPolicy::from(&config.fetch));

        let store = SqliteStore::new(
            Path::new(&config.storage.database_path),
            config.storage.write_mode,
        )?;
        tracing::info!(
            "Store opened at {} (write mode: {:?})",
            config.storage.database_path,
            store.write_mode()
        );

        let report = SkipReport::new(&config.report.skip_report_path)
            .with_flush_every(config.report.flush_every);

        Ok(Self::new(
            fetcher,
            Box::new(FlagmaExtractor::new()?),
            Box::new(store),
            report,
            config.pagination.clone(),
        ))
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = hash.into();
        self
    }

    pub fn report(&self) -> &SkipReport {
        &self.report
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    /// Harvests every category in order
    ///
    /// # Returns
    ///
    /// * `Ok(RunSummary)` - All categories processed (some pages may be skipped),
    ///   or the run was cancelled between pages
    /// * `Err(HarvestError)` - Fatal abort; the skip report has been flushed
    pub async fn run(&mut self, categories: &[String]) -> Result<RunSummary, HarvestError> {
        let run_id = self.store.create_run(&self.config_hash)?;
        tracing::info!(
            "Starting harvest run {} over {} categories",
            run_id,
            categories.len()
        );

        let start_time = Instant::now();
        let mut summary = RunSummary::default();
        let result = self.harvest_categories(categories, &mut summary).await;

        let summary = self.finish(run_id, result, summary)?;
        tracing::info!(
            "Harvest finished in {:?}: {} categories, {} pages harvested, {} skipped, {} new records",
            start_time.elapsed(),
            summary.categories_done,
            summary.pages_harvested,
            summary.pages_skipped,
            summary.records_inserted
        );
        Ok(summary)
    }

    /// Re-fetches exactly the pages listed in an earlier skip report
    ///
    /// Pages that fail again end up in this run's report.
    pub async fn replay(&mut self, entries: &[SkipEntry]) -> Result<RunSummary, HarvestError> {
        let run_id = self.store.create_run(&self.config_hash)?;
        tracing::info!("Replaying {} skipped pages in run {}", entries.len(), run_id);

        let mut summary = RunSummary::default();
        let result = self.replay_pages(entries, &mut summary).await;
        self.finish(run_id, result, summary)
    }

    async fn harvest_categories(
        &mut self,
        categories: &[String],
        summary: &mut RunSummary,
    ) -> Result<(), HarvestError> {
        for (index, category) in categories.iter().enumerate() {
            if self.cancel.is_cancelled() {
                summary.cancelled = true;
                return Ok(());
            }

            tracing::info!(
                "Category {}/{}: {}",
                index + 1,
                categories.len(),
                category
            );
            self.harvest_category(category, summary).await?;
            if summary.cancelled {
                return Ok(());
            }
            summary.categories_done += 1;
        }
        Ok(())
    }

    async fn harvest_category(
        &mut self,
        category: &str,
        summary: &mut RunSummary,
    ) -> Result<(), HarvestError> {
        let mut cursor = CategoryCursor::new(category);
        let mut harvested = 0usize;
        let mut skipped = 0usize;

        loop {
            if self.cancel.is_cancelled() {
                tracing::info!(
                    "Cancellation requested, stopping before page {} of {}",
                    cursor.current_page,
                    category
                );
                summary.cancelled = true;
                return Ok(());
            }

            if let Some(max_pages) = self.pagination.max_pages {
                if cursor.current_page > max_pages {
                    tracing::info!("Reached max_pages ({}) for {}", max_pages, category);
                    break;
                }
            }

            let page = cursor.current_page;
            match self
                .process_page(category, page, cursor.last_page, summary)
                .await?
            {
                PageResult::Harvested(extraction) => {
                    harvested += 1;
                    cursor.record_success(extraction.last_page);
                    if !extraction.has_more {
                        break;
                    }
                }
                PageResult::Failed(reason) => {
                    skipped += 1;
                    self.skip_page(category, page, reason, summary);
                    cursor.record_failure();

                    if cursor.consecutive_failures >= self.pagination.max_consecutive_failures {
                        tracing::warn!(
                            "Giving up on {} after {} consecutive failed pages",
                            category,
                            cursor.consecutive_failures
                        );
                        break;
                    }
                    if cursor.at_last_page() {
                        break;
                    }
                }
            }

            cursor.advance();
        }

        tracing::info!(
            "Category complete: {} ({} pages harvested, {} skipped)",
            category,
            harvested,
            skipped
        );
        Ok(())
    }

    async fn replay_pages(
        &mut self,
        entries: &[SkipEntry],
        summary: &mut RunSummary,
    ) -> Result<(), HarvestError> {
        let mut seen = HashSet::new();

        for entry in entries {
            if !seen.insert((entry.category_url.as_str(), entry.page_number)) {
                continue;
            }
            if self.cancel.is_cancelled() {
                summary.cancelled = true;
                return Ok(());
            }

            let page = entry.page_number;
            if let PageResult::Failed(reason) =
                self.process_page(&entry.category_url, page, None, summary).await?
            {
                self.skip_page(&entry.category_url, page, reason, summary);
            }
        }
        Ok(())
    }

    /// Fetches, extracts and persists one page
    ///
    /// Page-level problems come back as `PageResult::Failed`; only fatal
    /// conditions are returned as errors. `expected_last` is the last page
    /// advertised earlier in the category: a page before it that carries no
    /// pagination at all is a ban or captcha page, not the end of the listing.
    async fn process_page(
        &mut self,
        category: &str,
        page: u32,
        expected_last: Option<u32>,
        summary: &mut RunSummary,
    ) -> Result<PageResult, HarvestError> {
        let url = page_url(category, &self.pagination.page_path, page);
        tracing::debug!("Processing page {}: {}", page, url);

        let body = match self.fetcher.fetch(&url).await? {
            FetchOutcome::Success { body, .. } => body,
            FetchOutcome::RetryableFailure { reason } | FetchOutcome::PermanentFailure { reason } => {
                return Ok(PageResult::Failed(reason));
            }
        };

        let extraction = match self.extractor.extract(&body, category, page) {
            Ok(extraction) => extraction,
            Err(e) => {
                tracing::warn!("Failed to parse {}: {}", url, e);
                return Ok(PageResult::Failed(format!("parse error: {}", e)));
            }
        };

        if let Some(last) = expected_last.filter(|last| page < *last) {
            if extraction.last_page.is_none() {
                tracing::warn!("Page {} of {} has no pagination, expected {} pages", page, category, last);
                return Ok(PageResult::Failed(format!(
                    "no pagination on page, expected {} pages",
                    last
                )));
            }
        }

        if extraction.records.is_empty() {
            tracing::warn!("No companies found on page {} of {}", page, category);
        }

        for record in &extraction.records {
            match self.store.upsert(record) {
                Ok(UpsertOutcome::Inserted) => summary.records_inserted += 1,
                Ok(UpsertOutcome::Updated) => summary.records_updated += 1,
                Ok(UpsertOutcome::Skipped(_)) => summary.records_skipped += 1,
                Err(StorageError::InvalidRecord(message)) => {
                    tracing::warn!("Dropped record on page {} of {}: {}", page, category, message);
                }
                Err(e) => return Err(e.into()),
            }
        }

        summary.pages_harvested += 1;
        tracing::info!(
            "Saved page {} of {} ({} records)",
            page,
            category,
            extraction.records.len()
        );
        Ok(PageResult::Harvested(extraction))
    }

    fn skip_page(
        &mut self,
        category: &str,
        page: u32,
        reason: String,
        summary: &mut RunSummary,
    ) {
        tracing::error!("Page {} of {} failed: {}", page, category, reason);
        summary.pages_skipped += 1;
        self.report.record(SkipEntry::new(category, page, reason));
    }

    /// Flushes the report and records the run outcome, whatever the result
    fn finish(
        &mut self,
        run_id: i64,
        result: Result<(), HarvestError>,
        summary: RunSummary,
    ) -> Result<RunSummary, HarvestError> {
        let status = match &result {
            Ok(()) if summary.cancelled => RunStatus::Cancelled,
            Ok(()) => RunStatus::Completed,
            Err(_) => RunStatus::Aborted,
        };

        let flushed = self.report.flush().map(|_| ());
        if let Err(e) = self.store.finish_run(run_id, status) {
            tracing::error!("Failed to record outcome of run {}: {}", run_id, e);
        }

        match result {
            Ok(()) => {
                flushed?;
                Ok(summary)
            }
            Err(e) => {
                if let Err(flush_err) = flushed {
                    tracing::error!("Skip report could not be written: {}", flush_err);
                }
                tracing::error!("Harvest aborted: {}", e);
                Err(e)
            }
        }
    }
}
