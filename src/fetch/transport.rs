//! Network transport
//!
//! A [`Transport`] performs exactly one GET through one proxy. It knows nothing
//! about retries; that policy lives in the fetch client.

use crate::config::FetchConfig;
use crate::proxy::{ProxyError, ProxyHandle};
use async_trait::async_trait;
use reqwest::{Client, Proxy};
use std::time::Duration;
use thiserror::Error;

/// Status and body of a completed HTTP exchange
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// Failure to complete an HTTP exchange
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("proxy rejected: {0}")]
    Proxy(#[from] ProxyError),

    #[error("request failed: {0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_connect() {
            Self::Connect(e.to_string())
        } else {
            Self::Other(e.to_string())
        }
    }
}

/// A single GET through a single proxy
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str, proxy: &ProxyHandle) -> Result<RawResponse, TransportError>;
}

/// Builds an HTTP client bound to one proxy
///
/// Connection pooling is disabled: rotating gateways pick the exit IP per
/// connection, so each attempt must open its own.
pub fn build_http_client(config: &FetchConfig, proxy: &ProxyHandle) -> Result<Client, TransportError> {
    let proxy = Proxy::all(proxy.to_url()?)?;

    let client = Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .proxy(proxy)
        .pool_max_idle_per_host(0)
        .gzip(true)
        .brotli(true)
        .build()?;

    Ok(client)
}

/// Transport backed by reqwest
pub struct ReqwestTransport {
    config: FetchConfig,
}

impl ReqwestTransport {
    pub fn new(config: FetchConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str, proxy: &ProxyHandle) -> Result<RawResponse, TransportError> {
        let client = build_http_client(&self.config, proxy)?;
        let response = client.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(RawResponse { status, body })
    }
}
