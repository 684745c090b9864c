//! A single cached value with expiry and recency bookkeeping.

use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;

/// Returns the current wall-clock time as milliseconds since the Unix epoch.
///
/// Falls back to 0 if the system clock reads before the epoch.
#[must_use]
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
}

/// One entry in the in-memory tier.
///
/// Expiry uses wall-clock time so entries can outlive the process in the
/// persistent tier; recency uses a store-assigned sequence number so access
/// order stays total even for operations inside the same millisecond.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The cached response body.
    pub value: Value,
    /// Absolute expiry in milliseconds since the epoch, `None` for no TTL.
    pub expires_at: Option<u64>,
    /// Access sequence stamped by the store on every read and write; a
    /// higher value means more recently used.
    pub last_accessed: u64,
}

impl CacheEntry {
    /// Creates an entry expiring `ttl_ms` milliseconds from now, or never
    /// when `ttl_ms` is `None`. The store stamps recency on insert.
    #[must_use]
    pub fn new(value: Value, ttl_ms: Option<u64>) -> Self {
        let now = current_timestamp_ms();
        Self::with_expires_at(value, ttl_ms.map(|ttl| now.saturating_add(ttl)))
    }

    /// Creates an entry with an absolute expiry, used when rehydrating from
    /// the persistent tier.
    #[must_use]
    pub fn with_expires_at(value: Value, expires_at: Option<u64>) -> Self {
        Self {
            value,
            expires_at,
            last_accessed: 0,
        }
    }

    /// Returns true once the entry's TTL has elapsed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| current_timestamp_ms() >= expires_at)
    }
}
