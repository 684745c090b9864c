//! Per-client configuration.
//!
//! A [`ClientConfig`] is built once, handed to [`ApiClient::new`], and never
//! mutated afterwards. Each client instance owns an independent limiter pair
//! derived from it; there is no ambient or static rate/concurrency state.
//!
//! [`ApiClient::new`]: crate::api::ApiClient::new

use std::time::Duration;

use super::constants::{
    DEFAULT_MAX_CONCURRENT, DEFAULT_RATE_LIMIT_MAX_REQUESTS, DEFAULT_RATE_LIMIT_WINDOW,
    DEFAULT_RETRIES, DEFAULT_RETRY_DELAY, DEFAULT_TIMEOUT,
};

/// Sliding-window rate-limit budget: at most `max_requests` requests within
/// any window of length `per`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum requests allowed inside one window.
    pub max_requests: usize,
    /// Window length.
    pub per: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_RATE_LIMIT_MAX_REQUESTS,
            per: DEFAULT_RATE_LIMIT_WINDOW,
        }
    }
}

/// Immutable configuration for one [`ApiClient`](crate::api::ApiClient).
///
/// # Defaults
///
/// - `timeout`: 30 seconds
/// - `retries`: 3 (after the initial attempt)
/// - `retry_delay`: 1 second backoff base
/// - `max_concurrent`: 5
/// - `rate_limit`: 10 requests per 1000 ms
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base address every relative path is resolved against.
    pub base_url: String,
    /// Per-request timeout covering one transport attempt.
    pub timeout: Duration,
    /// Maximum retries after the first attempt for transient failures.
    pub retries: u32,
    /// Base delay for exponential backoff between retries.
    pub retry_delay: Duration,
    /// Maximum simultaneously in-flight requests.
    pub max_concurrent: usize,
    /// Sliding-window rate-limit budget.
    pub rate_limit: RateLimitConfig,
}

impl ClientConfig {
    /// Creates a configuration for the given base address with defaults for
    /// everything else.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            rate_limit: RateLimitConfig::default(),
        }
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the retry count and backoff base delay.
    #[must_use]
    pub fn with_retries(mut self, retries: u32, retry_delay: Duration) -> Self {
        self.retries = retries;
        self.retry_delay = retry_delay;
        self
    }

    /// Sets the in-flight request bound. Clamped to at least 1.
    #[must_use]
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// Sets the sliding-window rate-limit budget.
    #[must_use]
    pub fn with_rate_limit(mut self, max_requests: usize, per: Duration) -> Self {
        self.rate_limit = RateLimitConfig {
            max_requests: max_requests.max(1),
            per,
        };
        self
    }
}
