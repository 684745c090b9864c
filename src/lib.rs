//! Adminkit Core Library
//!
//! This library provides the resilient API access layer shared by the
//! adminkit command handlers: a single outbound channel to a remote REST
//! service with rate limiting, bounded concurrency, retries, cursor
//! pagination, chunked batch dispatch, streamed downloads, and a two-tier
//! response cache.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`api`] - Rate-limited, retrying HTTP client with pagination and batching
//! - [`cache`] - In-memory LRU/TTL cache with an optional persistent tier
//!
//! Command handlers, credential storage, CSV handling, and console output
//! live outside this crate; they consume [`ApiClient`] and [`CacheManager`]
//! through the surfaces re-exported here. The core never writes to the
//! console and never terminates the process; classified errors are returned
//! to the caller for rendering at the command layer.

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod cache;

// Re-export commonly used types
pub use api::{
    ApiClient, ApiError, BatchOptions, BatchRequest, ClientConfig, ClientStats,
    ConcurrencyLimiter, DownloadOptions, FailureType, PaginateOptions, RateLimitConfig,
    RateLimiter, RetryDecision, RetryPolicy, Settlement, classify_error,
};
pub use cache::{CacheConfig, CacheManager, CacheStats, generate_key};
