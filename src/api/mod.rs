//! Rate-limited, retrying HTTP client for the remote admin API.
//!
//! This module composes four small components into one [`ApiClient`]:
//!
//! - [`RateLimiter`] - sliding window over recent request timestamps
//! - [`ConcurrencyLimiter`] - bounds simultaneously in-flight requests
//! - [`RetryPolicy`] - exponential backoff for transient failures
//! - transport - one HTTP attempt with bearer auth and error classification
//!
//! A caller invokes a client method, the concurrency limiter admits or
//! queues the call, the rate limiter blocks until within budget, the
//! transport executes, and transient failures re-enter the transport with
//! backoff. The classified error or parsed body is returned unchanged.
//!
//! # Example
//!
//! ```no_run
//! use adminkit_core::api::{ApiClient, ClientConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ApiClient::new(ClientConfig::new("https://api.example.com"))?;
//! client.set_auth_token("secret-token");
//! let orgs = client.get("/organizations", None).await?;
//! println!("{orgs}");
//! # Ok(())
//! # }
//! ```

mod client;
mod concurrency;
mod config;
pub mod constants;
mod error;
mod paginate;
pub mod rate_limit;
mod retry;
mod transport;

pub use client::{ApiClient, BatchOptions, BatchRequest, ClientStats, DownloadOptions, Settlement};
pub use concurrency::ConcurrencyLimiter;
pub use config::{ClientConfig, RateLimitConfig};
pub use error::ApiError;
pub use paginate::PaginateOptions;
pub use rate_limit::{RateLimiter, parse_retry_after};
pub use retry::{FailureType, RetryDecision, RetryPolicy, classify_error};

// Note: no module-local Result aliases. Use `Result<T, ApiError>` explicitly
// in function signatures.
