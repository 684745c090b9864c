//! Sliding-window rate limiting for outbound API requests.
//!
//! This module provides the [`RateLimiter`] struct which tracks the
//! timestamps of recently issued requests and blocks new requests when the
//! window is full, keeping the client inside the server-imposed budget of
//! `max_requests` per window.
//!
//! # Overview
//!
//! The limiter is local to one client instance; there is no coordination
//! across processes. Every transport attempt, including retries, passes
//! through [`RateLimiter::admit`] before touching the network.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use adminkit_core::api::RateLimiter;
//!
//! # async fn example() {
//! // At most 10 requests per second
//! let limiter = RateLimiter::new(10, Duration::from_secs(1));
//!
//! // Returns once issuing a request would not exceed the budget
//! limiter.admit().await;
//! # }
//! ```

use std::collections::VecDeque;

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use super::constants::MAX_RETRY_AFTER;

/// Sliding-window rate limiter for one client instance.
///
/// Tracks a most-recent-last log of request timestamps behind a
/// `tokio::sync::Mutex`; the log is pruned lazily on each check so it never
/// holds more entries than a correct sliding-window count would allow.
///
/// # Thread Safety
///
/// `RateLimiter` is `Send + Sync`; the client shares it across logically
/// concurrent calls. Starvation is bounded: each waiting caller is unblocked
/// once the oldest timestamp in the window expires.
#[derive(Debug)]
pub struct RateLimiter {
    /// Maximum requests allowed inside one window.
    max_requests: usize,
    /// Window length.
    per: Duration,
    /// Timestamps of requests issued within the current window,
    /// most-recent-last. Mutated only under the mutex.
    timestamps: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter allowing `max_requests` requests per `per`.
    ///
    /// `max_requests` is clamped to at least 1.
    #[must_use]
    #[instrument(skip_all, fields(max_requests, per_ms = per.as_millis()))]
    pub fn new(max_requests: usize, per: Duration) -> Self {
        debug!("creating rate limiter");
        Self {
            max_requests: max_requests.max(1),
            per,
            timestamps: Mutex::new(VecDeque::new()),
        }
    }

    /// Returns the configured budget (requests per window).
    #[must_use]
    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    /// Returns the configured window length.
    #[must_use]
    pub fn window(&self) -> Duration {
        self.per
    }

    /// Blocks until issuing a new request would not exceed the budget, then
    /// records the request timestamp.
    ///
    /// The check prunes timestamps older than `now - per`; if fewer than
    /// `max_requests` remain, `now` is recorded and the call returns
    /// immediately. Otherwise the caller sleeps until the oldest timestamp
    /// leaves the window and re-checks. No request is ever issued before
    /// this returns.
    #[instrument(level = "debug", skip(self))]
    pub async fn admit(&self) {
        loop {
            let wait = {
                let mut log = self.timestamps.lock().await;
                let now = Instant::now();
                Self::prune(&mut log, now, self.per);

                if log.len() < self.max_requests {
                    log.push_back(now);
                    None
                } else {
                    // Window full: wake when the oldest entry expires.
                    log.front().map(|oldest| *oldest + self.per - now)
                }
            };

            // Lock released before sleeping so other callers can re-check.
            match wait {
                None => return,
                Some(delay) => {
                    debug!(delay_ms = delay.as_millis(), "rate limit window full");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Returns the number of requests recorded inside the current window.
    pub async fn current_window(&self) -> usize {
        let mut log = self.timestamps.lock().await;
        Self::prune(&mut log, Instant::now(), self.per);
        log.len()
    }

    /// Drops timestamps that have left the window.
    fn prune(log: &mut VecDeque<Instant>, now: Instant, per: Duration) {
        while log
            .front()
            .is_some_and(|oldest| now.duration_since(*oldest) >= per)
        {
            log.pop_front();
        }
    }
}

/// Interprets a `Retry-After` header value as a wait duration.
///
/// Accepts both RFC 7231 forms, delta-seconds (`120`) and an HTTP-date.
/// Unparseable or negative values yield `None`, a date already behind us
/// yields zero, and anything above [`MAX_RETRY_AFTER`] is capped so a
/// misbehaving server cannot park the caller for hours.
#[must_use]
#[instrument]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let value = header_value.trim();

    if let Ok(seconds) = value.parse::<i64>() {
        if seconds < 0 {
            debug!(seconds, "ignoring negative Retry-After");
            return None;
        }
        #[allow(clippy::cast_sign_loss)]
        return Some(cap_retry_after(Duration::from_secs(seconds as u64)));
    }

    let Ok(datetime) = httpdate::parse_http_date(value) else {
        debug!(header_value = value, "ignoring unparseable Retry-After");
        return None;
    };
    match datetime.duration_since(std::time::SystemTime::now()) {
        Ok(delay) => Some(cap_retry_after(delay)),
        // A date already behind us means the caller may go ahead now.
        Err(_) => Some(Duration::ZERO),
    }
}

fn cap_retry_after(delay: Duration) -> Duration {
    if delay > MAX_RETRY_AFTER {
        warn!(
            delay_secs = delay.as_secs(),
            cap_secs = MAX_RETRY_AFTER.as_secs(),
            "capping oversized Retry-After"
        );
        return MAX_RETRY_AFTER;
    }
    delay
}
