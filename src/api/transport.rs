//! Single-attempt HTTP execution with bearer auth and error classification.
//!
//! The transport performs exactly one attempt of a request with the
//! configured timeout, attaches the bearer token when one has been set, and
//! classifies the outcome into the [`ApiError`] taxonomy. Retry and limiter
//! logic live above it; the transport knows nothing about either.

use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::ApiError;
use super::rate_limit::parse_retry_after;

/// Executes one HTTP attempt against the remote API.
///
/// Holds the shared connection pool, the parsed base address, and the
/// bearer token. Every attempt - success or failure - bumps the running
/// request counter used by client statistics.
#[derive(Debug)]
pub struct Transport {
    http: Client,
    base_url: url::Url,
    token: RwLock<Option<String>>,
    total_requests: AtomicU64,
}

impl Transport {
    /// Creates a transport for the given base address and per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidUrl`] if the base address cannot be parsed.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with this static
    /// configuration. This should never happen in practice.
    #[allow(clippy::expect_used)]
    #[instrument(skip_all, fields(base_url))]
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let base_url = url::Url::parse(base_url)
            .map_err(|_| ApiError::invalid_url(base_url.to_string()))?;

        let http = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .build()
            .expect("failed to build HTTP client with static configuration");

        debug!(base_url = %base_url, timeout_ms = timeout.as_millis(), "creating transport");
        Ok(Self {
            http,
            base_url,
            token: RwLock::new(None),
            total_requests: AtomicU64::new(0),
        })
    }

    /// Sets the bearer token attached to subsequent requests.
    pub fn set_token(&self, token: Option<String>) {
        match self.token.write() {
            Ok(mut guard) => *guard = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
    }

    /// Returns the total number of attempts issued by this transport.
    #[must_use]
    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::SeqCst)
    }

    /// Resolves a request path against the base address.
    ///
    /// Absolute URLs pass through untouched so downloads can point at other
    /// hosts; relative paths join the configured base.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidUrl`] when the path cannot be resolved.
    pub fn resolve(&self, path: &str) -> Result<url::Url, ApiError> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return url::Url::parse(path).map_err(|_| ApiError::invalid_url(path.to_string()));
        }
        self.base_url
            .join(path)
            .map_err(|_| ApiError::invalid_url(path.to_string()))
    }

    /// Executes exactly one attempt and parses the JSON response body.
    ///
    /// An empty 2xx body parses to `Value::Null`.
    ///
    /// # Errors
    ///
    /// Returns the classified [`ApiError`] for network failures, timeouts,
    /// 429 responses, and other non-2xx statuses.
    #[instrument(skip(self, body), fields(method = %method, path))]
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        query: Option<&[(String, String)]>,
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        let response = self.execute_raw(method, path, query, body).await?;
        let url = response.url().to_string();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| classify_send_error(&url, e))?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|e| {
            warn!(url = %url, error = %e, "response body is not valid JSON");
            ApiError::http(url, 200, "response body is not valid JSON", None)
        })
    }

    /// Executes exactly one attempt and returns the raw response.
    ///
    /// Used by the client for streamed downloads where the body must not be
    /// buffered up front. Status classification happens here; a returned
    /// response is always 2xx.
    ///
    /// # Errors
    ///
    /// Returns the classified [`ApiError`] for network failures, timeouts,
    /// 429 responses, and other non-2xx statuses.
    pub async fn execute_raw(
        &self,
        method: Method,
        path: &str,
        query: Option<&[(String, String)]>,
        body: Option<&Value>,
    ) -> Result<reqwest::Response, ApiError> {
        let url = self.resolve(path)?;
        self.total_requests.fetch_add(1, Ordering::SeqCst);

        let mut request = self.http.request(method, url.clone());
        if let Some(query) = query {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        if let Some(token) = self.current_token() {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify_send_error(url.as_str(), e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            debug!(url = %url, ?retry_after, "server rate limited request");
            return Err(ApiError::rate_limited(url.to_string(), retry_after));
        }

        let status_code = status.as_u16();
        let body = response.json::<Value>().await.ok();
        let message = extract_server_message(body.as_ref()).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });
        Err(ApiError::http(url.to_string(), status_code, message, body))
    }

    fn current_token(&self) -> Option<String> {
        match self.token.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Maps a reqwest send error to the taxonomy: timeouts become
/// [`ApiError::Timeout`], everything else [`ApiError::Network`].
fn classify_send_error(url: &str, error: reqwest::Error) -> ApiError {
    if error.is_timeout() {
        ApiError::timeout(url)
    } else {
        ApiError::network(url, error)
    }
}

/// Pulls a server-provided error message out of a JSON body.
///
/// Looks for the conventional `message` and `error` string fields.
fn extract_server_message(body: Option<&Value>) -> Option<String> {
    let body = body?;
    for field in ["message", "error"] {
        if let Some(text) = body.get(field).and_then(Value::as_str) {
            if !text.is_empty() {
                return Some(text.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn transport_for(server: &MockServer) -> Transport {
        Transport::new(&server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_transport_rejects_invalid_base_url() {
        let result = Transport::new("not a url", Duration::from_secs(5));
        assert!(matches!(result, Err(ApiError::InvalidUrl { .. })));
    }

    #[test]
    fn test_resolve_joins_relative_paths() {
        let transport =
            Transport::new("https://api.example.com/v1/", Duration::from_secs(5)).unwrap();
        let url = transport.resolve("projects").unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v1/projects");
    }

    #[test]
    fn test_resolve_passes_absolute_urls_through() {
        let transport = Transport::new("https://api.example.com", Duration::from_secs(5)).unwrap();
        let url = transport.resolve("https://cdn.example.com/export.zip").unwrap();
        assert_eq!(url.as_str(), "https://cdn.example.com/export.zip");
    }

    #[tokio::test]
    async fn test_execute_parses_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/organizations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 7})))
            .mount(&server)
            .await;

        let transport = transport_for(&server);
        let value = transport
            .execute(Method::GET, "/organizations", None, None)
            .await
            .unwrap();
        assert_eq!(value, json!({"id": 7}));
        assert_eq!(transport.total_requests(), 1);
    }

    #[tokio::test]
    async fn test_execute_empty_body_is_null() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/projects/9"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let transport = transport_for(&server);
        let value = transport
            .execute(Method::DELETE, "/projects/9", None, None)
            .await
            .unwrap();
        assert_eq!(value, Value::Null);
    }

    #[tokio::test]
    async fn test_execute_sends_bearer_token_once_set() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/me"))
            .and(header("Authorization", "Bearer secret-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;

        let transport = transport_for(&server);
        transport.set_token(Some("secret-token".to_string()));
        let value = transport.execute(Method::GET, "/me", None, None).await.unwrap();
        assert_eq!(value, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_execute_forwards_query_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/projects"))
            .and(query_param("org", "42"))
            .and(body_json(json!({"name": "alpha"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 1})))
            .mount(&server)
            .await;

        let transport = transport_for(&server);
        let query = vec![("org".to_string(), "42".to_string())];
        let value = transport
            .execute(
                Method::POST,
                "/projects",
                Some(&query),
                Some(&json!({"name": "alpha"})),
            )
            .await
            .unwrap();
        assert_eq!(value, json!({"id": 1}));
    }

    #[tokio::test]
    async fn test_execute_prefers_server_message_field() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/projects/1"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"message": "project not found"})),
            )
            .mount(&server)
            .await;

        let transport = transport_for(&server);
        let error = transport
            .execute(Method::GET, "/projects/1", None, None)
            .await
            .unwrap_err();
        match error {
            ApiError::Http {
                status, message, ..
            } => {
                assert_eq!(status, 404);
                assert_eq!(message, "project not found");
            }
            other => panic!("Expected Http error, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_execute_falls_back_to_status_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let transport = transport_for(&server);
        let error = transport
            .execute(Method::GET, "/broken", None, None)
            .await
            .unwrap_err();
        match error {
            ApiError::Http {
                status, message, ..
            } => {
                assert_eq!(status, 500);
                assert_eq!(message, "Internal Server Error");
            }
            other => panic!("Expected Http error, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_execute_classifies_429_with_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/limited"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
            .mount(&server)
            .await;

        let transport = transport_for(&server);
        let error = transport
            .execute(Method::GET, "/limited", None, None)
            .await
            .unwrap_err();
        match error {
            ApiError::RateLimited { retry_after, .. } => {
                assert_eq!(retry_after, Some(Duration::from_secs(30)));
            }
            other => panic!("Expected RateLimited, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_execute_counts_failed_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let transport = transport_for(&server);
        let _ = transport.execute(Method::GET, "/broken", None, None).await;
        let _ = transport.execute(Method::GET, "/broken", None, None).await;
        assert_eq!(transport.total_requests(), 2);
    }
}
