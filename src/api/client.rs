//! The API client facade composing limiters, retries, and transport.
//!
//! One [`ApiClient`] owns a single outbound channel to the remote service
//! and is shared by every command handler. Cloning is cheap (`Arc` inner);
//! all clones share the same limiter pair, token, and statistics.
//!
//! # Request pipeline
//!
//! ```text
//! caller -> ConcurrencyLimiter -> RetryPolicy -> RateLimiter -> Transport
//! ```
//!
//! The concurrency slot is held for the whole logical request, including
//! retries; every individual attempt re-enters the rate limiter so retries
//! never amplify load beyond the window budget.

use std::sync::Arc;

use futures_util::{Stream, StreamExt, future};
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, info, instrument};

use super::concurrency::ConcurrencyLimiter;
use super::config::{ClientConfig, RateLimitConfig};
use super::constants::DEFAULT_BATCH_CHUNK_SIZE;
use super::paginate::{self, PaginateOptions};
use super::rate_limit::RateLimiter;
use super::retry::RetryPolicy;
use super::transport::Transport;
use super::ApiError;

/// Progress callback fired with `(completed, total)` after each batch chunk.
pub type BatchProgress = Box<dyn Fn(usize, usize) + Send + Sync>;

/// Progress callback fired with a 0-100 percentage as download bytes arrive.
pub type DownloadProgress = Box<dyn Fn(f64) + Send + Sync>;

/// One request inside a [`ApiClient::batch`] call.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    /// HTTP method.
    pub method: Method,
    /// Path resolved against the client's base address.
    pub path: String,
    /// Optional JSON body.
    pub body: Option<Value>,
}

impl BatchRequest {
    /// Creates a GET batch entry.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            body: None,
        }
    }

    /// Creates a POST batch entry with a JSON body.
    #[must_use]
    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            body: Some(body),
        }
    }

    /// Creates a PUT batch entry with a JSON body.
    #[must_use]
    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::PUT,
            path: path.into(),
            body: Some(body),
        }
    }

    /// Creates a DELETE batch entry.
    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: Method::DELETE,
            path: path.into(),
            body: None,
        }
    }
}

/// Terminal outcome of one batch entry, aligned index-for-index with the
/// input. A rejected entry never aborts the rest of the batch.
#[derive(Debug)]
pub enum Settlement {
    /// The request resolved; carries the parsed response body.
    Fulfilled(Value),
    /// The request rejected; carries the classified error.
    Rejected(ApiError),
}

impl Settlement {
    /// Returns true for a fulfilled settlement.
    #[must_use]
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, Self::Fulfilled(_))
    }

    /// Returns the response body of a fulfilled settlement.
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Fulfilled(value) => Some(value),
            Self::Rejected(_) => None,
        }
    }

    /// Returns the error of a rejected settlement.
    #[must_use]
    pub fn error(&self) -> Option<&ApiError> {
        match self {
            Self::Fulfilled(_) => None,
            Self::Rejected(error) => Some(error),
        }
    }
}

/// Options for [`ApiClient::batch`].
#[derive(Default)]
pub struct BatchOptions {
    /// Requests dispatched concurrently per chunk. Default 10.
    pub chunk_size: Option<usize>,
    /// Fired once per completed chunk with `(completed, total)`.
    pub on_progress: Option<BatchProgress>,
}

impl BatchOptions {
    /// Creates options with the given chunk size.
    #[must_use]
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: Some(chunk_size),
            on_progress: None,
        }
    }

    /// Sets the per-chunk progress callback.
    #[must_use]
    pub fn with_progress(mut self, on_progress: impl Fn(usize, usize) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Box::new(on_progress));
        self
    }
}

/// Options for [`ApiClient::download`].
#[derive(Default)]
pub struct DownloadOptions {
    /// Fired with a 0-100 percentage as bytes arrive. Only invoked when the
    /// response declares a content length.
    pub on_progress: Option<DownloadProgress>,
}

impl DownloadOptions {
    /// Sets the progress callback.
    #[must_use]
    pub fn with_progress(mut self, on_progress: impl Fn(f64) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Box::new(on_progress));
        self
    }
}

/// Observability snapshot returned by [`ApiClient::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientStats {
    /// Transport attempts issued since construction (including retries).
    pub total_requests: u64,
    /// Requests recorded inside the current rate-limit window.
    pub current_window_requests: usize,
    /// The configured window budget.
    pub rate_limit: RateLimitConfig,
    /// The configured in-flight bound.
    pub concurrency_limit: usize,
}

#[derive(Debug)]
struct ClientInner {
    config: ClientConfig,
    transport: Transport,
    rate: RateLimiter,
    limiter: ConcurrencyLimiter,
    retry: RetryPolicy,
}

/// Rate-limited, retrying client for the remote admin API.
///
/// Created once per process from a [`ClientConfig`] and cloned into command
/// handlers. All mutable rate/concurrency state is private to the instance;
/// independent clients never share limiters.
#[derive(Debug, Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

impl ApiClient {
    /// Creates a client from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidUrl`] if the configured base address is
    /// malformed.
    #[instrument(skip_all, fields(base_url = %config.base_url))]
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let transport = Transport::new(&config.base_url, config.timeout)?;
        let rate = RateLimiter::new(config.rate_limit.max_requests, config.rate_limit.per);
        let limiter = ConcurrencyLimiter::new(config.max_concurrent);
        let retry = RetryPolicy::new(config.retries, config.retry_delay);

        info!(
            max_concurrent = config.max_concurrent,
            retries = config.retries,
            rate_limit = config.rate_limit.max_requests,
            window_ms = config.rate_limit.per.as_millis(),
            "creating API client"
        );

        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                transport,
                rate,
                limiter,
                retry,
            }),
        })
    }

    /// Returns the immutable configuration this client was built from.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Sets the bearer token attached to subsequent requests.
    ///
    /// Obtaining and refreshing the token is the auth subsystem's job; this
    /// client only carries it.
    pub fn set_auth_token(&self, token: impl Into<String>) {
        self.inner.transport.set_token(Some(token.into()));
    }

    /// Clears the bearer token.
    pub fn clear_auth_token(&self) {
        self.inner.transport.set_token(None);
    }

    /// Issues a GET request.
    ///
    /// # Errors
    ///
    /// Returns the classified [`ApiError`] once retries are exhausted or the
    /// failure is non-retryable.
    #[instrument(skip(self, query), fields(path))]
    pub async fn get(
        &self,
        path: &str,
        query: Option<&[(String, String)]>,
    ) -> Result<Value, ApiError> {
        self.request(Method::GET, path, query, None).await
    }

    /// Issues a POST request with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns the classified [`ApiError`] once retries are exhausted or the
    /// failure is non-retryable.
    #[instrument(skip(self, body), fields(path))]
    pub async fn post(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        self.request(Method::POST, path, None, Some(body)).await
    }

    /// Issues a PUT request with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns the classified [`ApiError`] once retries are exhausted or the
    /// failure is non-retryable.
    #[instrument(skip(self, body), fields(path))]
    pub async fn put(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        self.request(Method::PUT, path, None, Some(body)).await
    }

    /// Issues a DELETE request.
    ///
    /// # Errors
    ///
    /// Returns the classified [`ApiError`] once retries are exhausted or the
    /// failure is non-retryable.
    #[instrument(skip(self), fields(path))]
    pub async fn delete(&self, path: &str) -> Result<Value, ApiError> {
        self.request(Method::DELETE, path, None, None).await
    }

    /// Produces a lazy stream of individual items over offset pagination.
    ///
    /// Pages are fetched strictly in offset order with no prefetch; the
    /// first empty or short page ends the stream after its own items. A
    /// request failure aborts the stream with the underlying error.
    #[must_use]
    pub fn paginate(
        &self,
        path: &str,
        opts: PaginateOptions,
    ) -> impl Stream<Item = Result<Value, ApiError>> + use<> {
        paginate::items(self.clone(), path.to_string(), opts)
    }

    /// Dispatches `requests` in ordered chunks and captures per-item
    /// settlements.
    ///
    /// Each chunk runs concurrently (every request still subject to the
    /// concurrency and rate limiters); a failing request is captured as
    /// [`Settlement::Rejected`] without aborting the rest. The result is
    /// aligned index-for-index with the input.
    pub async fn batch(&self, requests: &[BatchRequest], opts: BatchOptions) -> Vec<Settlement> {
        let total = requests.len();
        let chunk_size = opts.chunk_size.unwrap_or(DEFAULT_BATCH_CHUNK_SIZE).max(1);
        let mut settlements = Vec::with_capacity(total);
        let mut completed = 0usize;

        debug!(total, chunk_size, "dispatching batch");

        for chunk in requests.chunks(chunk_size) {
            let chunk_results = future::join_all(chunk.iter().map(|request| async {
                match self
                    .request(request.method.clone(), &request.path, None, request.body.as_ref())
                    .await
                {
                    Ok(value) => Settlement::Fulfilled(value),
                    Err(error) => Settlement::Rejected(error),
                }
            }))
            .await;

            completed += chunk_results.len();
            settlements.extend(chunk_results);
            if let Some(on_progress) = &opts.on_progress {
                on_progress(completed, total);
            }
        }

        settlements
    }

    /// Streams a response body into memory, reporting progress as bytes
    /// arrive.
    ///
    /// The whole transfer holds one concurrency slot. Progress percentages
    /// are relative to the declared content length; without one the callback
    /// is not invoked. Downloads are not retried: a partially consumed
    /// stream is not safely re-issuable.
    ///
    /// # Errors
    ///
    /// Returns the classified [`ApiError`] for the initial request or a
    /// [`ApiError::Network`] if the stream fails mid-transfer.
    #[allow(clippy::cast_precision_loss)]
    #[instrument(skip(self, opts), fields(url))]
    pub async fn download(&self, url: &str, opts: DownloadOptions) -> Result<Vec<u8>, ApiError> {
        self.inner
            .limiter
            .run(async {
                self.inner.rate.admit().await;
                let response = self
                    .inner
                    .transport
                    .execute_raw(Method::GET, url, None, None)
                    .await?;

                let content_length = response.content_length();
                let final_url = response.url().to_string();
                let mut payload: Vec<u8> = Vec::new();
                let mut stream = response.bytes_stream();

                while let Some(chunk) = stream.next().await {
                    let chunk = chunk.map_err(|e| ApiError::network(final_url.clone(), e))?;
                    payload.extend_from_slice(&chunk);

                    if let (Some(on_progress), Some(total)) = (&opts.on_progress, content_length) {
                        if total > 0 {
                            let percent = (payload.len() as f64 / total as f64) * 100.0;
                            on_progress(percent.min(100.0));
                        }
                    }
                }

                debug!(url = %final_url, bytes = payload.len(), "download complete");
                Ok(payload)
            })
            .await
    }

    /// Returns a snapshot of the client's running statistics.
    pub async fn stats(&self) -> ClientStats {
        ClientStats {
            total_requests: self.inner.transport.total_requests(),
            current_window_requests: self.inner.rate.current_window().await,
            rate_limit: self.inner.config.rate_limit,
            concurrency_limit: self.inner.limiter.max_concurrent(),
        }
    }

    /// Runs one logical request through the full pipeline.
    ///
    /// The concurrency slot wraps the retry loop; each attempt re-enters
    /// the rate limiter before touching the transport.
    async fn request(
        &self,
        method: Method,
        path: &str,
        query: Option<&[(String, String)]>,
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        let inner = &self.inner;
        inner
            .limiter
            .run(inner.retry.run(|_attempt| {
                let method = method.clone();
                async move {
                    inner.rate.admit().await;
                    inner.transport.execute(method, path, query, body).await
                }
            }))
            .await
    }
}
