//! Constants for the api module (timeouts, retry, rate limiting).

use std::time::Duration;

/// Default per-request timeout (30 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of retries after the initial attempt.
pub const DEFAULT_RETRIES: u32 = 3;

/// Default base delay for exponential backoff (1 second).
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Default maximum backoff delay cap (32 seconds).
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(32);

/// Default number of simultaneously in-flight requests.
pub const DEFAULT_MAX_CONCURRENT: usize = 5;

/// Default rate-limit budget: requests allowed per window.
pub const DEFAULT_RATE_LIMIT_MAX_REQUESTS: usize = 10;

/// Default rate-limit window length.
pub const DEFAULT_RATE_LIMIT_WINDOW: Duration = Duration::from_millis(1000);

/// Default page size for offset pagination.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Default chunk size for batch dispatch.
pub const DEFAULT_BATCH_CHUNK_SIZE: usize = 10;

/// Maximum Retry-After header value (1 hour) to prevent excessive delays.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);
