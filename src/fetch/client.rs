//! Fetch client: retry with proxy rotation
//!
//! # Retry Logic
//!
//! | Condition | Action |
//! |-----------|--------|
//! | 2xx with body | Success |
//! | Timeout, connection error | Rotate proxy, retry |
//! | HTTP 429, 5xx | Rotate proxy, retry |
//! | Other 4xx, 1xx/3xx, empty body | Permanent, no retry |
//! | Attempts exhausted | Permanent with the last reason |
//! | Proxy source exhausted | `Err`, fatal to the run |

use crate::config::FetchConfig;
use crate::fetch::transport::Transport;
use crate::fetch::{classify_response, FetchOutcome};
use crate::proxy::{ProxyError, ProxyHandle, ProxySource};
use std::sync::Arc;
use std::time::Duration;

/// Upper bound on draws spent avoiding a repeated handle
const MAX_REDRAWS: usize = 8;

/// Bounds of the retry loop
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            retry_delay: Duration::from_millis(1000),
        }
    }
}

impl From<&FetchConfig> for RetryPolicy {
    fn from(config: &FetchConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }
}

pub struct FetchClient {
    transport: Arc<dyn Transport>,
    proxies: Box<dyn ProxySource>,
    policy: RetryPolicy,
    /// Handle used by the most recent attempt, across URLs
    last_proxy: Option<ProxyHandle>,
}

impl FetchClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        proxies: Box<dyn ProxySource>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            proxies,
            policy,
            last_proxy: None,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Fetches `url`, rotating to a new proxy before every attempt
    ///
    /// Only proxy exhaustion is returned as an error; every network outcome,
    /// including running out of attempts, is a [`FetchOutcome`].
    pub async fn fetch(&mut self, url: &str) -> Result<FetchOutcome, ProxyError> {
        let max_attempts = self.policy.max_attempts;
        let mut last_reason = String::from("no attempt made");

        for attempt in 1..=max_attempts {
            if attempt > 1 && !self.policy.retry_delay.is_zero() {
                tokio::time::sleep(self.policy.retry_delay).await;
            }

            let proxy = self.next_proxy()?;
            tracing::debug!(url, attempt, proxy = %proxy, "Fetching");

            let outcome = match self.transport.get(url, &proxy).await {
                Ok(response) => classify_response(response),
                Err(e) => FetchOutcome::RetryableFailure {
                    reason: e.to_string(),
                },
            };

            match outcome {
                FetchOutcome::Success { .. } => {
                    self.proxies.report_success(&proxy);
                    return Ok(outcome);
                }
                // Neutral: proxy health is left untouched
                FetchOutcome::PermanentFailure { ref reason } => {
                    tracing::warn!(url, attempt, proxy = %proxy, reason = %reason, "Permanent fetch failure");
                    return Ok(outcome);
                }
                FetchOutcome::RetryableFailure { reason } => {
                    self.proxies.report_failure(&proxy);
                    tracing::warn!(
                        url,
                        attempt,
                        max_attempts,
                        proxy = %proxy,
                        reason = %reason,
                        "Fetch attempt failed, rotating proxy"
                    );
                    last_reason = reason;
                }
            }
        }

        Ok(FetchOutcome::PermanentFailure {
            reason: format!("gave up after {} attempts: {}", max_attempts, last_reason),
        })
    }

    /// Draws the next handle, refusing a repeat of the previous one
    /// while the source has alternatives
    fn next_proxy(&mut self) -> Result<ProxyHandle, ProxyError> {
        let mut proxy = self.proxies.next()?;
        let mut redraws = 0;
        while self.last_proxy.as_ref() == Some(&proxy)
            && self.proxies.available() >= 2
            && redraws < self.proxies.available().min(MAX_REDRAWS)
        {
            proxy = self.proxies.next()?;
            redraws += 1;
        }
        self.last_proxy = Some(proxy.clone());
        Ok(proxy)
    }
}
