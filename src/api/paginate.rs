//! Lazy item streams over offset pagination.
//!
//! [`ApiClient::paginate`] produces a single-pass stream of individual items
//! drawn from repeated `GET` calls with `limit`/`offset` query parameters.
//! Exactly one page is materialized at a time: the next page is only fetched
//! once the previous page's items have been yielded, and no page is ever
//! prefetched ahead. The first empty or short page ends the stream after its
//! own items; a request failure aborts the stream with the underlying error.
//!
//! [`ApiClient::paginate`]: super::ApiClient::paginate

use std::collections::VecDeque;

use futures_util::Stream;
use futures_util::stream;
use serde_json::Value;
use tracing::debug;

use super::constants::DEFAULT_PAGE_SIZE;
use super::{ApiClient, ApiError};

/// Options for one pagination pass.
#[derive(Debug, Clone)]
pub struct PaginateOptions {
    /// Items requested per page (`limit` query parameter).
    pub page_size: usize,
    /// Extra query parameters sent with every page request.
    pub params: Vec<(String, String)>,
}

impl Default for PaginateOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            params: Vec::new(),
        }
    }
}

impl PaginateOptions {
    /// Creates options with the given page size and no extra parameters.
    ///
    /// `page_size` is clamped to at least 1.
    #[must_use]
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            params: Vec::new(),
        }
    }

    /// Adds a query parameter sent with every page request.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }
}

/// Pagination state advanced between page fetches.
struct PageCursor {
    offset: usize,
    page_size: usize,
    buffer: VecDeque<Value>,
    done: bool,
}

/// Builds the item stream for [`ApiClient::paginate`].
pub(super) fn items(
    client: ApiClient,
    path: String,
    opts: PaginateOptions,
) -> impl Stream<Item = Result<Value, ApiError>> {
    let page_size = opts.page_size.max(1);
    let cursor = PageCursor {
        offset: 0,
        page_size,
        buffer: VecDeque::new(),
        done: false,
    };

    stream::try_unfold(
        (client, path, opts.params, cursor),
        |(client, path, params, mut cursor)| async move {
            loop {
                if let Some(item) = cursor.buffer.pop_front() {
                    return Ok(Some((item, (client, path, params, cursor))));
                }
                if cursor.done {
                    return Ok(None);
                }

                let mut query = params.clone();
                query.push(("limit".to_string(), cursor.page_size.to_string()));
                query.push(("offset".to_string(), cursor.offset.to_string()));

                let page = client.get(&path, Some(&query)).await?;
                let items = extract_page_items(&path, page)?;
                debug!(
                    path = %path,
                    offset = cursor.offset,
                    count = items.len(),
                    "fetched page"
                );

                // A short or empty page is the last one.
                if items.len() < cursor.page_size {
                    cursor.done = true;
                }
                cursor.offset += cursor.page_size;
                cursor.buffer.extend(items);
            }
        },
    )
}

/// Pulls the item list out of a page response.
///
/// Accepts a bare JSON array or the conventional `items`/`data` wrappers.
fn extract_page_items(path: &str, page: Value) -> Result<Vec<Value>, ApiError> {
    match page {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => {
            for field in ["items", "data"] {
                if let Some(Value::Array(items)) = map.remove(field) {
                    return Ok(items);
                }
            }
            Err(ApiError::http(
                path,
                200,
                "paginated response is not a list",
                Some(Value::Object(map)),
            ))
        }
        other => Err(ApiError::http(
            path,
            200,
            "paginated response is not a list",
            Some(other),
        )),
    }
}
