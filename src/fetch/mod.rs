//! HTTP fetching through rotating proxies
//!
//! This module contains:
//! - [`Transport`]: the single-request network seam, with the reqwest
//!   implementation [`ReqwestTransport`]
//! - [`FetchClient`]: retry and proxy-rotation policy on top of a transport
//! - [`FetchOutcome`]: the classified result of fetching one URL

mod client;
mod transport;

pub use client::{FetchClient, RetryPolicy};
pub use transport::{build_http_client, RawResponse, ReqwestTransport, Transport, TransportError};

/// Result of fetching one URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The page was retrieved
    Success {
        /// Decoded response body
        body: String,
        /// HTTP status code
        status_code: u16,
    },

    /// The attempt failed in a way another proxy may fix
    RetryableFailure {
        /// Error description
        reason: String,
    },

    /// Retrying will not help (or the retry budget is spent)
    PermanentFailure {
        /// Error description
        reason: String,
    },
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// How a status code is treated by the retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    Retryable,
    Permanent,
}

/// Classifies an HTTP status code
///
/// | Status | Class |
/// |--------|-------|
/// | 2xx | Success |
/// | 429, 5xx | Retryable (rotate proxy) |
/// | other 4xx | Permanent |
/// | 1xx, 3xx | Permanent (unexpected after redirects are followed) |
pub fn classify_status(status: u16) -> StatusClass {
    match status {
        200..=299 => StatusClass::Success,
        429 | 500..=599 => StatusClass::Retryable,
        _ => StatusClass::Permanent,
    }
}

/// Turns a raw response into a fetch outcome
pub fn classify_response(response: RawResponse) -> FetchOutcome {
    match classify_status(response.status) {
        StatusClass::Success if response.body.trim().is_empty() => FetchOutcome::PermanentFailure {
            reason: format!("HTTP {} with empty body", response.status),
        },
        StatusClass::Success => FetchOutcome::Success {
            body: response.body,
            status_code: response.status,
        },
        StatusClass::Retryable => FetchOutcome::RetryableFailure {
            reason: format!("HTTP {}", response.status),
        },
        StatusClass::Permanent => FetchOutcome::PermanentFailure {
            reason: format!("HTTP {}", response.status),
        },
    }
}
