//! Error types for the api module.
//!
//! This module defines the classified errors every client method can return,
//! providing context-rich messages for the command layer to render. The
//! taxonomy follows the retry contract: [`ApiError::Network`] and
//! [`ApiError::Timeout`] are retry-eligible, [`ApiError::Http`] is retried
//! only for 5xx, and [`ApiError::RateLimited`] is never auto-retried.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while talking to the remote API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network-level error (DNS resolution, connection refused, TLS, etc.)
    #[error("network error requesting {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout requesting {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Non-2xx, non-429 HTTP response.
    ///
    /// `message` prefers a server-provided `message`/`error` field from the
    /// response body, falling back to the HTTP status text.
    #[error("HTTP {status} requesting {url}: {message}")]
    Http {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// Server-provided or generic error message.
        message: String,
        /// The parsed response body, when one was returned.
        body: Option<serde_json::Value>,
    },

    /// HTTP 429 Too Many Requests.
    ///
    /// Never retried by the client; the caller decides whether to wait for
    /// `retry_after` and resubmit.
    #[error("rate limited requesting {url} (retry after {retry_after:?})")]
    RateLimited {
        /// The URL that was rate limited.
        url: String,
        /// Parsed Retry-After delay, if the server sent one.
        retry_after: Option<Duration>,
    },

    /// The configured base address or a request path is malformed.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },
}

impl ApiError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an HTTP status error.
    pub fn http(
        url: impl Into<String>,
        status: u16,
        message: impl Into<String>,
        body: Option<serde_json::Value>,
    ) -> Self {
        Self::Http {
            url: url.into(),
            status,
            message: message.into(),
            body,
        }
    }

    /// Creates a rate-limited error.
    pub fn rate_limited(url: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Self::RateLimited {
            url: url.into(),
            retry_after,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Returns the HTTP status code carried by this error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::RateLimited { .. } => Some(429),
            _ => None,
        }
    }
}

// Note: we intentionally do NOT implement `From<reqwest::Error>` because the
// variants require URL context the source error does not carry. The helper
// constructors are the seam where callers attach that context.
