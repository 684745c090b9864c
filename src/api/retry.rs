//! Retry logic with exponential backoff for transient request failures.
//!
//! This module provides the [`RetryPolicy`] and [`FailureType`] types for
//! classifying request errors and determining retry behavior.
//!
//! # Overview
//!
//! When a transport attempt fails, the error is classified into a
//! [`FailureType`]:
//! - [`FailureType::Transient`] - connection/DNS failures, timeouts, 5xx
//! - [`FailureType::Permanent`] - 4xx and malformed requests; retrying
//!   cannot help
//! - [`FailureType::RateLimited`] - HTTP 429; surfaced to the caller with
//!   the server's Retry-After, never auto-retried
//!
//! The [`RetryPolicy`] wraps an injected single-attempt function, making the
//! backoff algorithm testable without a network. Delay for attempt `n` is
//! `retry_delay * 2^(n-1)`, capped at [`MAX_RETRY_DELAY`].
//!
//! [`MAX_RETRY_DELAY`]: super::constants::MAX_RETRY_DELAY

use std::future::Future;
use std::time::Duration;

use tracing::{debug, info, instrument};

use super::ApiError;
use super::constants::{DEFAULT_RETRIES, DEFAULT_RETRY_DELAY, MAX_RETRY_DELAY};

/// Classification of request failure types.
///
/// Used to determine whether a failed attempt should be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Temporary failure that may succeed on retry.
    ///
    /// Examples: network timeout, connection refused, DNS failure, 5xx.
    Transient,

    /// Failure that won't succeed regardless of retries.
    ///
    /// Examples: 404 Not Found, 400 Bad Request, invalid URL.
    Permanent,

    /// Server rate limiting (HTTP 429).
    ///
    /// Not retried by the policy; the caller receives the classified error
    /// with the Retry-After value and decides whether to resubmit.
    RateLimited,
}

/// Decision on whether to retry a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt number this will be (first retry is attempt 2).
        attempt: u32,
    },

    /// Do not retry.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Configuration for retry behavior with exponential backoff.
///
/// # Delay Calculation
///
/// ```text
/// delay = min(retry_delay * 2^(attempt-1), MAX_RETRY_DELAY)
/// ```
///
/// With defaults, delays are 1s, 2s, 4s before retries are exhausted. Delays
/// are strictly increasing; there is no jitter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum retries after the first attempt.
    retries: u32,

    /// Base delay for the first retry.
    retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Creates a retry policy with the given retry count and backoff base.
    #[must_use]
    pub fn new(retries: u32, retry_delay: Duration) -> Self {
        Self {
            retries,
            retry_delay,
        }
    }

    /// Returns the configured retry count.
    #[must_use]
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Determines whether to retry a failed attempt.
    ///
    /// # Arguments
    ///
    /// * `failure_type` - Classification of the failure
    /// * `attempt` - The attempt number that just failed (1-indexed)
    #[instrument(skip(self), fields(retries = self.retries))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        match failure_type {
            FailureType::Permanent => {
                return RetryDecision::DoNotRetry {
                    reason: "permanent failure - retry would not help".to_string(),
                };
            }
            FailureType::RateLimited => {
                return RetryDecision::DoNotRetry {
                    reason: "rate limited - caller decides when to resubmit".to_string(),
                };
            }
            FailureType::Transient => {}
        }

        if attempt > self.retries {
            debug!(attempt, retries = self.retries, "retries exhausted");
            return RetryDecision::DoNotRetry {
                reason: format!("retries ({}) exhausted", self.retries),
            };
        }

        let delay = self.backoff_delay(attempt);
        debug!(
            attempt,
            next_attempt = attempt + 1,
            delay_ms = delay.as_millis(),
            "will retry"
        );

        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }

    /// Calculates the backoff delay before retrying after `attempt` failed.
    ///
    /// Formula: `retry_delay * 2^(attempt-1)`, capped at `MAX_RETRY_DELAY`.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.retry_delay
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(MAX_RETRY_DELAY)
    }

    /// Drives the retry loop around an injected single-attempt function.
    ///
    /// `op` receives the 1-indexed attempt number and performs exactly one
    /// attempt. Transient failures are retried with backoff until the retry
    /// budget is spent; the final classified error propagates unchanged.
    ///
    /// # Errors
    ///
    /// Returns the last error produced by `op` once retries are exhausted,
    /// or immediately for non-retryable failures.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, ApiError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    let failure_type = classify_error(&error);
                    match self.should_retry(failure_type, attempt) {
                        RetryDecision::Retry {
                            delay,
                            attempt: next_attempt,
                        } => {
                            info!(
                                attempt = next_attempt,
                                retries = self.retries,
                                delay_ms = delay.as_millis(),
                                error = %error,
                                "retrying request"
                            );
                            tokio::time::sleep(delay).await;
                        }
                        RetryDecision::DoNotRetry { reason } => {
                            debug!(%reason, "not retrying request");
                            return Err(error);
                        }
                    }
                }
            }
        }
    }
}

/// Classifies a request error into a failure type for retry decisions.
///
/// Network-level failures (connection, DNS, timeout) and 5xx responses are
/// transient. Every 4xx except 429 is permanent - such requests are client
/// errors and retrying cannot help. A 429 is rate-limited and never
/// auto-retried.
#[instrument]
pub fn classify_error(error: &ApiError) -> FailureType {
    match error {
        ApiError::Network { .. } | ApiError::Timeout { .. } => FailureType::Transient,
        ApiError::RateLimited { .. } => FailureType::RateLimited,
        ApiError::Http { status, .. } => classify_http_status(*status),
        ApiError::InvalidUrl { .. } => FailureType::Permanent,
    }
}

/// Classifies an HTTP status code into a failure type.
fn classify_http_status(status: u16) -> FailureType {
    match status {
        429 => FailureType::RateLimited,
        status if (500..600).contains(&status) => FailureType::Transient,
        _ => FailureType::Permanent,
    }
}
