//! End-to-end harvest runs over a scripted portal
//!
//! These tests wire the real extractor, SQLite store and skip report to a
//! transport that never touches the network.

use crate::common::{listing, public_list, shared, Dwindling, Portal, CATEGORY, PAGE_PATH};
use async_trait::async_trait;
use company_harvester::config::PaginationConfig;
use company_harvester::crawler::{CancelToken, Orchestrator};
use company_harvester::extract::FlagmaExtractor;
use company_harvester::fetch::{FetchClient, RawResponse, RetryPolicy, Transport, TransportError};
use company_harvester::proxy::{ProxyHandle, ProxySource};
use company_harvester::storage::RunStatus;
use company_harvester::{HarvestError, SkipReport, SqliteStore, Store, WriteMode};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        retry_delay: Duration::ZERO,
    }
}

fn build(
    transport: Arc<dyn Transport>,
    proxies: Box<dyn ProxySource>,
    max_attempts: u32,
    db_path: &Path,
    write_mode: WriteMode,
    report_path: &Path,
) -> Orchestrator {
    let fetcher = FetchClient::new(transport, proxies, policy(max_attempts));
    let pagination = PaginationConfig {
        page_path: PAGE_PATH.to_string(),
        ..PaginationConfig::default()
    };
    Orchestrator::new(
        fetcher,
        Box::new(FlagmaExtractor::new().unwrap()),
        Box::new(SqliteStore::new(db_path, write_mode).unwrap()),
        SkipReport::new(report_path),
        pagination,
    )
}

fn categories() -> Vec<String> {
    vec![CATEGORY.to_string()]
}

#[tokio::test]
async fn test_failed_middle_page_is_reported_and_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("companies.db");
    let report_path = dir.path().join("skipped_pages.json");

    let portal = shared(
        Portal::new()
            .page(1, listing(&[101, 102], 3))
            .status(2, 503)
            .page(3, listing(&[103], 3)),
    );
    let mut orchestrator = build(
        portal.clone(),
        public_list(3),
        3,
        &db_path,
        WriteMode::Skip,
        &report_path,
    );

    let summary = orchestrator.run(&categories()).await.unwrap();

    assert_eq!(summary.pages_harvested, 2);
    assert_eq!(summary.pages_skipped, 1);
    assert_eq!(summary.records_inserted, 3);
    assert_eq!(portal.requests_for(2), 3);

    let store = SqliteStore::new(&db_path, WriteMode::Skip).unwrap();
    assert_eq!(store.count().unwrap(), 3);
    let company = store.get("103").unwrap().unwrap();
    assert_eq!(company.name, "Company 103");
    assert_eq!(company.legal_type, "ТОО");
    assert_eq!(company.category_url, CATEGORY);

    let skipped = SkipReport::load(&report_path).unwrap();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].category_url, CATEGORY);
    assert_eq!(skipped[0].page_number, 2);
    assert!(skipped[0].reason.contains("gave up after 3 attempts"));
}

#[tokio::test]
async fn test_attempts_rotate_through_different_proxies() {
    let dir = tempfile::tempdir().unwrap();
    let portal = shared(Portal::new().script(
        1,
        vec![
            Err(503),
            Err(429),
            Ok(RawResponse {
                status: 200,
                body: listing(&[7], 1),
            }),
        ],
    ));
    let mut orchestrator = build(
        portal.clone(),
        public_list(2),
        4,
        &dir.path().join("companies.db"),
        WriteMode::Skip,
        &dir.path().join("skipped.json"),
    );

    let summary = orchestrator.run(&categories()).await.unwrap();
    assert_eq!(summary.pages_harvested, 1);
    assert_eq!(summary.pages_skipped, 0);

    let requests = portal.requests();
    assert_eq!(requests.len(), 3);
    for pair in requests.windows(2) {
        assert_ne!(pair[0].1, pair[1].1);
    }
}

#[tokio::test]
async fn test_proxy_exhaustion_aborts_after_flushing_report() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("companies.db");
    let report_path = dir.path().join("skipped_pages.json");

    let portal = shared(
        Portal::new()
            .page(1, listing(&[1, 2], 5))
            .status(2, 404)
            .page(3, listing(&[3], 5)),
    );
    let mut orchestrator = build(
        portal.clone(),
        Box::new(Dwindling {
            budget: 2,
            issued: 0,
        }),
        1,
        &db_path,
        WriteMode::Skip,
        &report_path,
    );

    let err = orchestrator.run(&categories()).await.unwrap_err();
    assert!(matches!(err, HarvestError::Proxy(_)));
    assert!(err.is_fatal_abort());

    // Page 3 was never requested
    assert_eq!(portal.requests().len(), 2);

    let skipped = SkipReport::load(&report_path).unwrap();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].page_number, 2);
    assert_eq!(skipped[0].reason, "HTTP 404");

    let store = SqliteStore::new(&db_path, WriteMode::Skip).unwrap();
    assert_eq!(store.count().unwrap(), 2);
    let run = store.get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Aborted);
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("companies.db");
    let report_path = dir.path().join("skipped.json");

    for run in 0..2 {
        let portal = shared(
            Portal::new()
                .page(1, listing(&[11, 12], 2))
                .page(2, listing(&[12, 13], 2)),
        );
        let mut orchestrator = build(
            portal,
            public_list(2),
            2,
            &db_path,
            WriteMode::Skip,
            &report_path,
        );
        let summary = orchestrator.run(&categories()).await.unwrap();

        if run == 0 {
            assert_eq!(summary.records_inserted, 3);
            assert_eq!(summary.records_skipped, 1);
        } else {
            assert_eq!(summary.records_inserted, 0);
            assert_eq!(summary.records_skipped, 4);
        }
    }

    let store = SqliteStore::new(&db_path, WriteMode::Skip).unwrap();
    assert_eq!(store.count().unwrap(), 3);
}

#[tokio::test]
async fn test_overwrite_mode_refreshes_existing_rows() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("companies.db");

    let first = shared(Portal::new().page(1, listing(&[55], 1)));
    build(
        first,
        public_list(1),
        1,
        &db_path,
        WriteMode::Overwrite,
        &dir.path().join("a.json"),
    )
    .run(&categories())
    .await
    .unwrap();

    let renamed = listing(&[55], 1).replace("Company 55, ТОО", "Renamed 55, АО");
    let second = shared(Portal::new().page(1, renamed));
    let summary = build(
        second,
        public_list(1),
        1,
        &db_path,
        WriteMode::Overwrite,
        &dir.path().join("b.json"),
    )
    .run(&categories())
    .await
    .unwrap();

    assert_eq!(summary.records_updated, 1);
    let store = SqliteStore::new(&db_path, WriteMode::Overwrite).unwrap();
    let company = store.get("55").unwrap().unwrap();
    assert_eq!(company.name, "Renamed 55");
    assert_eq!(company.legal_type, "АО");
    assert_eq!(store.count().unwrap(), 1);
}

#[tokio::test]
async fn test_replay_recovers_skipped_pages() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("companies.db");
    let first_report = dir.path().join("first.json");
    let second_report = dir.path().join("second.json");

    let flaky = shared(
        Portal::new()
            .page(1, listing(&[1], 3))
            .status(2, 403)
            .page(3, listing(&[3], 3)),
    );
    build(flaky, public_list(2), 1, &db_path, WriteMode::Skip, &first_report)
        .run(&categories())
        .await
        .unwrap();

    let recovered = shared(Portal::new().page(2, listing(&[2], 3)));
    let entries = SkipReport::load(&first_report).unwrap();
    assert_eq!(entries.len(), 1);

    let summary = build(
        recovered.clone(),
        public_list(2),
        1,
        &db_path,
        WriteMode::Skip,
        &second_report,
    )
    .replay(&entries)
    .await
    .unwrap();

    assert_eq!(summary.pages_harvested, 1);
    assert_eq!(summary.records_inserted, 1);
    assert_eq!(recovered.requests().len(), 1);
    assert!(SkipReport::load(&second_report).unwrap().is_empty());

    let store = SqliteStore::new(&db_path, WriteMode::Skip).unwrap();
    assert_eq!(store.count().unwrap(), 3);
}

/// Requests cancellation once the inner transport has served `after` requests
struct CancelAfter {
    inner: Arc<Portal>,
    token: CancelToken,
    after: usize,
    served: AtomicUsize,
}

#[async_trait]
impl Transport for CancelAfter {
    async fn get(&self, url: &str, proxy: &ProxyHandle) -> Result<RawResponse, TransportError> {
        let response = self.inner.get(url, proxy).await;
        if self.served.fetch_add(1, Ordering::SeqCst) + 1 >= self.after {
            self.token.cancel();
        }
        response
    }
}

#[tokio::test]
async fn test_cancellation_stops_at_page_boundary() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("companies.db");
    let report_path = dir.path().join("skipped.json");

    let portal = shared(
        Portal::new()
            .page(1, listing(&[1], 4))
            .page(2, listing(&[2], 4))
            .page(3, listing(&[3], 4)),
    );
    let token = CancelToken::new();
    let transport = Arc::new(CancelAfter {
        inner: portal.clone(),
        token: token.clone(),
        after: 2,
        served: AtomicUsize::new(0),
    });
    let mut orchestrator = build(
        transport,
        public_list(2),
        1,
        &db_path,
        WriteMode::Skip,
        &report_path,
    )
    .with_cancel_token(token);

    let summary = orchestrator.run(&categories()).await.unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.pages_harvested, 2);
    assert_eq!(summary.categories_done, 0);
    assert_eq!(portal.requests().len(), 2);
    assert!(report_path.exists());

    let store = SqliteStore::new(&db_path, WriteMode::Skip).unwrap();
    assert_eq!(store.count().unwrap(), 2);
    assert_eq!(
        store.get_latest_run().unwrap().unwrap().status,
        RunStatus::Cancelled
    );
}

#[tokio::test]
async fn test_exhaustion_on_second_draw_still_writes_report() {
    let dir = tempfile::tempdir().unwrap();
    let report_path = dir.path().join("reports").join("skipped.json");

    let portal = shared(Portal::new().page(1, listing(&[9], 2)).page(2, listing(&[10], 2)));
    let mut orchestrator = build(
        portal.clone(),
        Box::new(Dwindling {
            budget: 1,
            issued: 0,
        }),
        3,
        &dir.path().join("companies.db"),
        WriteMode::Skip,
        &report_path,
    );

    let err = orchestrator.run(&categories()).await.unwrap_err();
    assert!(err.is_fatal_abort());
    assert_eq!(portal.requests().len(), 1);
    assert!(SkipReport::load(&report_path).unwrap().is_empty());
    assert_eq!(orchestrator.store().count().unwrap(), 1);
}

#[tokio::test]
async fn test_page_without_pagination_is_skipped_not_treated_as_end() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("companies.db");
    let report_path = dir.path().join("skipped.json");

    let portal = shared(
        Portal::new()
            .page(1, listing(&[301], 3))
            .page(
                2,
                "<!DOCTYPE html><html><body>Access denied</body></html>".to_string(),
            )
            .page(3, listing(&[303], 3)),
    );
    let mut orchestrator = build(
        portal.clone(),
        public_list(2),
        1,
        &db_path,
        WriteMode::Skip,
        &report_path,
    );

    let summary = orchestrator.run(&categories()).await.unwrap();

    assert_eq!(summary.pages_harvested, 2);
    assert_eq!(summary.pages_skipped, 1);
    assert_eq!(portal.requests_for(3), 1);
    assert_eq!(orchestrator.store().count().unwrap(), 2);

    let skipped = SkipReport::load(&report_path).unwrap();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].page_number, 2);
    assert!(skipped[0].reason.contains("no pagination"));
}

#[tokio::test]
async fn test_failing_periodic_flush_does_not_stop_the_harvest() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("plain-file");
    std::fs::write(&blocker, "").unwrap();

    let portal = shared(
        Portal::new()
            .page(1, listing(&[401], 3))
            .status(2, 404)
            .page(3, listing(&[403], 3)),
    );
    let fetcher = FetchClient::new(portal.clone(), public_list(2), policy(1));
    let pagination = PaginationConfig {
        page_path: PAGE_PATH.to_string(),
        ..PaginationConfig::default()
    };
    let mut orchestrator = Orchestrator::new(
        fetcher,
        Box::new(FlagmaExtractor::new().unwrap()),
        Box::new(SqliteStore::new(&dir.path().join("companies.db"), WriteMode::Skip).unwrap()),
        SkipReport::new(blocker.join("skipped.json")).with_flush_every(Some(1)),
        pagination,
    );

    // Only the final flush can fail the run
    let err = orchestrator.run(&categories()).await.unwrap_err();
    assert!(matches!(err, HarvestError::Report(_)));
    assert!(!err.is_fatal_abort());

    assert_eq!(portal.requests_for(3), 1);
    assert_eq!(orchestrator.store().count().unwrap(), 2);
    assert_eq!(orchestrator.report().len(), 1);
}
