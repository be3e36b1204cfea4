//! Proxy sources for rotating the outbound network identity
//!
//! Every fetch attempt goes out through a [`ProxyHandle`] drawn from a
//! [`ProxySource`]. Three backends are provided:
//! - [`ResidentialGateway`]: a vendor gateway that rotates the exit IP itself
//! - [`AnonymizingRelay`]: a local SOCKS5 relay such as Tor
//! - [`PublicList`]: a fixed list of proxies used round-robin
//!
//! The backend is picked once from configuration by [`build_proxy_source`];
//! the fetch layer only sees the trait.

mod public_list;
mod relay;
mod residential;

pub use public_list::{parse_entry, PublicList};
pub use relay::AnonymizingRelay;
pub use residential::ResidentialGateway;

use crate::config::{ProxyBackend, ProxyConfig};
use serde::Deserialize;
use std::fmt;
use thiserror::Error;
use url::Url;

/// Errors raised by proxy sources
#[derive(Debug, Error)]
pub enum ProxyError {
    /// No handle can be produced any more; fatal to the run
    #[error("proxy source '{backend}' has no usable proxies left")]
    Exhausted { backend: String },

    #[error("invalid proxy: {0}")]
    Invalid(String),
}

/// Wire protocol spoken to the proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyProtocol {
    #[default]
    Http,
    Https,
    Socks5,
}

impl ProxyProtocol {
    /// URL scheme understood by the HTTP client
    ///
    /// SOCKS5 maps to `socks5h` so that host names are resolved by the proxy.
    pub fn scheme(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
            Self::Socks5 => "socks5h",
        }
    }
}

/// Username/password pair for proxy authentication
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ProxyCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for ProxyCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// One proxy endpoint, valid for a single fetch attempt
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProxyHandle {
    pub host: String,
    pub port: u16,
    pub credentials: Option<ProxyCredentials>,
    pub protocol: ProxyProtocol,
}

impl ProxyHandle {
    pub fn new(host: impl Into<String>, port: u16, protocol: ProxyProtocol) -> Self {
        Self {
            host: host.into(),
            port,
            credentials: None,
            protocol,
        }
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some(ProxyCredentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Builds the proxy URL, credentials included and percent-encoded
    pub fn to_url(&self) -> Result<Url, ProxyError> {
        let mut url = Url::parse(&format!(
            "{}://{}:{}",
            self.protocol.scheme(),
            self.host,
            self.port
        ))
        .map_err(|e| ProxyError::Invalid(format!("{}: {}", self, e)))?;

        if let Some(credentials) = &self.credentials {
            url.set_username(&credentials.username)
                .map_err(|_| ProxyError::Invalid(format!("{}: cannot carry credentials", self)))?;
            url.set_password(Some(&credentials.password))
                .map_err(|_| ProxyError::Invalid(format!("{}: cannot carry credentials", self)))?;
        }

        Ok(url)
    }
}

/// Log-safe rendering: scheme, user and endpoint, never the password
impl fmt::Display for ProxyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.credentials {
            Some(credentials) => write!(
                f,
                "{}://{}@{}:{}",
                self.protocol.scheme(),
                credentials.username,
                self.host,
                self.port
            ),
            None => write!(f, "{}://{}:{}", self.protocol.scheme(), self.host, self.port),
        }
    }
}

/// Supplier of proxy handles
///
/// Implementations must never return the handle of the immediately preceding
/// call while [`available`](ProxySource::available) is two or more.
pub trait ProxySource: Send {
    /// Hands out the next proxy to use
    fn next(&mut self) -> Result<ProxyHandle, ProxyError>;

    /// Number of distinct handles this source can currently produce
    ///
    /// Generating backends report `usize::MAX`.
    fn available(&self) -> usize;

    /// Short backend name for logs
    fn name(&self) -> &str;

    /// Called after a retryable failure through `handle`
    fn report_failure(&mut self, _handle: &ProxyHandle) {}

    /// Called after a successful response through `handle`
    fn report_success(&mut self, _handle: &ProxyHandle) {}
}

/// Creates the proxy source selected by the configuration
pub fn build_proxy_source(config: &ProxyConfig) -> Result<Box<dyn ProxySource>, ProxyError> {
    let missing = |section: &str| ProxyError::Invalid(format!("missing [proxy.{}] section", section));

    let source: Box<dyn ProxySource> = match config.backend {
        ProxyBackend::Residential => {
            let residential = config.residential.as_ref().ok_or_else(|| missing("residential"))?;
            Box::new(ResidentialGateway::from_config(residential)?)
        }
        ProxyBackend::Relay => {
            let relay = config.relay.as_ref().ok_or_else(|| missing("relay"))?;
            Box::new(AnonymizingRelay::new(relay.host.clone(), relay.port))
        }
        ProxyBackend::PublicList => {
            let list = config.public_list.as_ref().ok_or_else(|| missing("public-list"))?;
            Box::new(PublicList::from_config(list)?)
        }
    };

    tracing::info!(
        "Using proxy backend '{}' ({} handles available)",
        source.name(),
        describe_available(source.available())
    );

    Ok(source)
}

fn describe_available(available: usize) -> String {
    if available == usize::MAX {
        "unbounded".to_string()
    } else {
        available.to_string()
    }
}
