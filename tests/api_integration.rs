//! End-to-end client behavior against a mock HTTP server.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use futures_util::TryStreamExt;
use serde_json::{Value, json};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use adminkit_core::{
    ApiClient, ApiError, BatchOptions, BatchRequest, ClientConfig, DownloadOptions,
    PaginateOptions, Settlement,
};

fn quick_config(server: &MockServer) -> ClientConfig {
    ClientConfig::new(server.uri())
        .with_retries(2, Duration::from_millis(10))
        .with_rate_limit(1000, Duration::from_millis(100))
}

#[tokio::test]
async fn transient_failure_recovers_within_retry_budget() {
    let server = MockServer::start().await;
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(move |_: &wiremock::Request| {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                ResponseTemplate::new(503)
            } else {
                ResponseTemplate::new(200).set_body_json(json!({"ok": true}))
            }
        })
        .mount(&server)
        .await;

    let client = ApiClient::new(quick_config(&server)).unwrap();
    let value = client.get("/flaky", None).await.unwrap();

    assert_eq!(value, json!({"ok": true}));
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn persistent_server_error_exhausts_retries() {
    let server = MockServer::start().await;
    // retries = 2, so exactly 3 attempts reach the server.
    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "boom"})))
        .expect(3)
        .mount(&server)
        .await;

    let client = ApiClient::new(quick_config(&server)).unwrap();
    let error = client.get("/down", None).await.unwrap_err();

    match error {
        ApiError::Http { status, message, .. } => {
            assert_eq!(status, 500);
            assert_eq!(message, "boom");
        }
        other => panic!("expected Http error, got {other:?}"),
    }
    assert_eq!(client.stats().await.total_requests, 3);
}

#[tokio::test]
async fn client_error_is_never_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "not found"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::new(quick_config(&server)).unwrap();
    let error = client.get("/missing", None).await.unwrap_err();

    assert!(matches!(error, ApiError::Http { status: 404, .. }));
}

#[tokio::test]
async fn rate_limit_response_surfaces_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/limited"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::new(quick_config(&server)).unwrap();
    let error = client.get("/limited", None).await.unwrap_err();

    match error {
        ApiError::RateLimited { retry_after, .. } => {
            assert_eq!(retry_after, Some(Duration::from_secs(7)));
        }
        other => panic!("expected RateLimited error, got {other:?}"),
    }
}

#[tokio::test]
async fn paginate_yields_items_across_pages_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": [1, 2]})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("offset", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": [3, 4]})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("offset", "4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": [5]})))
        .mount(&server)
        .await;

    let client = ApiClient::new(quick_config(&server)).unwrap();
    let items: Vec<Value> = client
        .paginate("/users", PaginateOptions::new(2))
        .try_collect()
        .await
        .unwrap();

    assert_eq!(items, vec![json!(1), json!(2), json!(3), json!(4), json!(5)]);
}

#[tokio::test]
async fn paginate_stops_after_empty_page_on_exact_multiple() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([1, 2])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("offset", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([3, 4])))
        .expect(1)
        .mount(&server)
        .await;
    // Total count is an exact multiple of the page size, so one trailing
    // empty page is fetched before the stream ends.
    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("offset", "4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::new(quick_config(&server)).unwrap();
    let items: Vec<Value> = client
        .paginate("/users", PaginateOptions::new(2))
        .try_collect()
        .await
        .unwrap();

    assert_eq!(items.len(), 4);
}

#[tokio::test]
async fn paginate_forwards_extra_params() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("org", "42"))
        .and(query_param("limit", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([1])))
        .mount(&server)
        .await;

    let client = ApiClient::new(quick_config(&server)).unwrap();
    let items: Vec<Value> = client
        .paginate("/users", PaginateOptions::new(10).with_param("org", "42"))
        .try_collect()
        .await
        .unwrap();

    assert_eq!(items, vec![json!(1)]);
}

#[tokio::test]
async fn paginate_aborts_on_request_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([1, 2])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("offset", "2"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let client = ApiClient::new(quick_config(&server)).unwrap();
    let result: Result<Vec<Value>, ApiError> = client
        .paginate("/users", PaginateOptions::new(2))
        .try_collect()
        .await;

    assert!(matches!(result, Err(ApiError::Http { status: 403, .. })));
}

#[tokio::test]
async fn batch_preserves_order_and_captures_failures() {
    let server = MockServer::start().await;
    for i in [0, 1, 3, 4] {
        Mock::given(method("GET"))
            .and(path(format!("/items/{i}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": i})))
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/items/2"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let requests: Vec<BatchRequest> =
        (0..5).map(|i| BatchRequest::get(format!("/items/{i}"))).collect();

    let progress = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&progress);
    let opts = BatchOptions::new(2).with_progress(move |completed, total| {
        recorder.lock().unwrap().push((completed, total));
    });

    let client = ApiClient::new(quick_config(&server)).unwrap();
    let settlements = client.batch(&requests, opts).await;

    assert_eq!(settlements.len(), 5);
    for (i, settlement) in settlements.iter().enumerate() {
        if i == 2 {
            assert!(matches!(
                settlement,
                Settlement::Rejected(ApiError::Http { status: 404, .. })
            ));
        } else {
            assert_eq!(settlement.value(), Some(&json!({"id": i})));
        }
    }
    assert_eq!(*progress.lock().unwrap(), vec![(2, 5), (4, 5), (5, 5)]);
}

#[tokio::test]
async fn download_reports_progress_up_to_completion() {
    let server = MockServer::start().await;
    let body = vec![3u8; 256 * 1024];
    Mock::given(method("GET"))
        .and(path("/export.csv"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .mount(&server)
        .await;

    let reports = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&reports);
    let opts = DownloadOptions::default().with_progress(move |percent| {
        recorder.lock().unwrap().push(percent);
    });

    let client = ApiClient::new(quick_config(&server)).unwrap();
    let payload = client.download("/export.csv", opts).await.unwrap();

    assert_eq!(payload, body);
    let reports = reports.lock().unwrap();
    assert!(!reports.is_empty());
    assert!(reports.windows(2).all(|pair| pair[0] <= pair[1]));
    assert!((reports.last().unwrap() - 100.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn download_failure_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/export.csv"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::new(quick_config(&server)).unwrap();
    let error = client
        .download("/export.csv", DownloadOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(error, ApiError::Http { status: 500, .. }));
}

#[tokio::test]
async fn requests_beyond_window_budget_are_delayed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let window = Duration::from_millis(150);
    let client = ApiClient::new(
        ClientConfig::new(server.uri())
            .with_retries(0, Duration::from_millis(10))
            .with_rate_limit(3, window),
    )
    .unwrap();

    let start = Instant::now();
    for _ in 0..4 {
        client.get("/ping", None).await.unwrap();
    }

    // The fourth request must wait for the first to leave the window.
    assert!(start.elapsed() >= window);
}

#[tokio::test]
async fn concurrent_requests_respect_in_flight_bound() {
    let server = MockServer::start().await;
    let delay = Duration::from_millis(100);
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})).set_delay(delay))
        .mount(&server)
        .await;

    let client = ApiClient::new(
        ClientConfig::new(server.uri())
            .with_retries(0, Duration::from_millis(10))
            .with_max_concurrent(2)
            .with_rate_limit(1000, Duration::from_millis(100)),
    )
    .unwrap();

    let start = Instant::now();
    let mut handles = Vec::new();
    for _ in 0..4 {
        let client = client.clone();
        handles.push(tokio::spawn(async move { client.get("/slow", None).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // Four 100ms requests with two slots take at least two rounds.
    assert!(start.elapsed() >= delay * 2);
}
