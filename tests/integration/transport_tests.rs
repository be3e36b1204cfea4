//! Real HTTP through the reqwest transport
//!
//! A wiremock server stands in for a forward HTTP proxy: reqwest sends it
//! absolute-form requests, which wiremock matches on path like any other.

use company_harvester::config::FetchConfig;
use company_harvester::fetch::{FetchClient, FetchOutcome, ReqwestTransport, RetryPolicy};
use company_harvester::proxy::{ProxyHandle, ProxyProtocol, PublicList};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_config() -> FetchConfig {
    FetchConfig {
        timeout_secs: 5,
        connect_timeout_secs: 2,
        ..FetchConfig::default()
    }
}

fn proxy_for(server: &MockServer) -> ProxyHandle {
    let address = server.address();
    ProxyHandle::new(address.ip().to_string(), address.port(), ProxyProtocol::Http)
}

#[tokio::test]
async fn test_dead_proxy_is_evicted_and_next_one_serves() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/companies/metals/page-1/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><body>listing</body></html>")
                .insert_header("content-type", "text/html"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    // Nothing listens on port 1.
    let dead = ProxyHandle::new("127.0.0.1", 1, ProxyProtocol::Http);
    let source = PublicList::new(vec![dead, proxy_for(&mock_server)], 1);
    let mut client = FetchClient::new(
        Arc::new(ReqwestTransport::new(fast_config())),
        Box::new(source),
        RetryPolicy {
            max_attempts: 3,
            retry_delay: Duration::ZERO,
        },
    );

    let outcome = client
        .fetch("http://portal.test/companies/metals/page-1/")
        .await
        .unwrap();

    assert_eq!(
        outcome,
        FetchOutcome::Success {
            body: "<html><body>listing</body></html>".to_string(),
            status_code: 200,
        }
    );
}

#[tokio::test]
async fn test_client_error_through_proxy_is_permanent() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(410).set_body_string("gone"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let source = PublicList::new(vec![proxy_for(&mock_server)], 3);
    let mut client = FetchClient::new(
        Arc::new(ReqwestTransport::new(fast_config())),
        Box::new(source),
        RetryPolicy {
            max_attempts: 4,
            retry_delay: Duration::ZERO,
        },
    );

    let outcome = client.fetch("http://portal.test/companies/gone/").await.unwrap();
    assert_eq!(
        outcome,
        FetchOutcome::PermanentFailure {
            reason: "HTTP 410".to_string()
        }
    );
}
