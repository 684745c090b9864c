//! The cache facade tying the memory and persistent tiers together.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};

use super::entry::CacheEntry;
use super::persist::PersistentStore;
use super::store::MemoryStore;

/// Default in-memory capacity in entries.
pub const DEFAULT_MAX_SIZE: usize = 1000;

/// Default time-to-live for cached entries.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Configuration for [`CacheManager`].
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum entries held in memory before eviction.
    pub max_size: usize,
    /// TTL applied when a caller does not pass one. `None` disables expiry.
    pub default_ttl: Option<Duration>,
    /// Directory for the persistent tier. `None` keeps the cache
    /// memory-only.
    pub persist_dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            default_ttl: Some(DEFAULT_TTL),
            persist_dir: None,
        }
    }
}

impl CacheConfig {
    /// Sets the in-memory capacity. Clamped to at least 1.
    #[must_use]
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size.max(1);
        self
    }

    /// Sets the default TTL, or disables expiry with `None`.
    #[must_use]
    pub fn with_default_ttl(mut self, default_ttl: Option<Duration>) -> Self {
        self.default_ttl = default_ttl;
        self
    }

    /// Enables the persistent tier rooted at `dir`.
    #[must_use]
    pub fn with_persist_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.persist_dir = Some(dir.into());
        self
    }
}

/// Snapshot returned by [`CacheManager::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Entries currently held in memory, expired or not.
    pub size: usize,
    /// Entries still within their TTL.
    pub valid_count: usize,
    /// Entries past their TTL but not yet collected.
    pub expired_count: usize,
    /// Configured in-memory capacity.
    pub max_size: usize,
}

/// Builds a deterministic cache key from a namespace and a parameter value.
///
/// Object keys are sorted recursively, so two parameter maps with the same
/// contents produce the same key regardless of construction order.
#[must_use]
pub fn generate_key(namespace: &str, params: &Value) -> String {
    let mut canonical = String::new();
    write_canonical(params, &mut canonical);
    format!("{namespace}:{canonical}")
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                if let Some(inner) = map.get(*key) {
                    write_canonical(inner, out);
                }
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}

/// Two-tier cache: bounded memory in front of an optional file-backed tier.
///
/// All operations are infallible at the API level; persistent I/O failures
/// are logged and surface as misses.
#[derive(Debug)]
pub struct CacheManager {
    store: Mutex<MemoryStore>,
    persist: Option<PersistentStore>,
    default_ttl: Option<Duration>,
}

impl CacheManager {
    /// Creates a manager from the given configuration.
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        info!(
            max_size = config.max_size,
            default_ttl_ms = config.default_ttl.map(|ttl| ttl.as_millis()),
            persistent = config.persist_dir.is_some(),
            "creating cache manager"
        );
        Self {
            store: Mutex::new(MemoryStore::new(config.max_size)),
            persist: config.persist_dir.map(PersistentStore::new),
            default_ttl: config.default_ttl,
        }
    }

    /// Looks up a cached value, falling back to the persistent tier and
    /// repopulating memory on a hit there.
    pub async fn get(&self, key: &str) -> Option<Value> {
        if let Some(value) = self.store.lock().await.get(key) {
            trace!(key, "memory cache hit");
            return Some(value);
        }

        let persist = self.persist.as_ref()?;
        let (value, expires) = persist.read_entry(key).await?;
        trace!(key, "persistent cache hit");

        let entry = CacheEntry::with_expires_at(value.clone(), expires);
        self.store.lock().await.set(key.to_string(), entry);
        Some(value)
    }

    /// Stores a value under `key`, using `ttl` or the configured default.
    pub async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) {
        let ttl = ttl.or(self.default_ttl);
        let ttl_ms = ttl.map(|ttl| u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX));
        let entry = CacheEntry::new(value.clone(), ttl_ms);
        let expires = entry.expires_at;

        self.store.lock().await.set(key.to_string(), entry);
        if let Some(persist) = &self.persist {
            persist.write(key, &value, expires).await;
        }
    }

    /// Removes `key` from both tiers. Returns true if the memory tier held
    /// it.
    pub async fn delete(&self, key: &str) -> bool {
        let removed = self.store.lock().await.delete(key);
        if let Some(persist) = &self.persist {
            persist.delete(key).await;
        }
        removed
    }

    /// Collects expired entries from the memory tier, returning how many
    /// were dropped. The persistent tier cleans itself lazily on read.
    pub async fn prune(&self) -> usize {
        let mut store = self.store.lock().await;
        if store.is_empty() {
            return 0;
        }
        let dropped = store.sweep();
        if dropped > 0 {
            debug!(dropped, "pruned expired cache entries");
        }
        dropped
    }

    /// Empties both tiers.
    pub async fn clear(&self) {
        self.store.lock().await.clear();
        if let Some(persist) = &self.persist {
            persist.clear().await;
        }
        debug!("cache cleared");
    }

    /// Runs `fetch` through the cache.
    ///
    /// On a hit the cached value is deserialized and returned without
    /// invoking `fetch`. On a miss `fetch` runs; a successful result is
    /// stored before being returned, and an error propagates uncached.
    /// Concurrent misses on the same key each invoke `fetch` - the cache
    /// does not coalesce in-flight lookups.
    ///
    /// # Errors
    ///
    /// Returns `fetch`'s error unchanged.
    pub async fn cached<T, E, F, Fut>(
        &self,
        namespace: &str,
        params: &Value,
        ttl: Option<Duration>,
        fetch: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = generate_key(namespace, params);

        if let Some(value) = self.get(&key).await {
            match serde_json::from_value(value) {
                Ok(decoded) => return Ok(decoded),
                Err(e) => {
                    warn!(key = %key, error = %e, "cached value no longer deserializes, refetching");
                    self.delete(&key).await;
                }
            }
        }

        let fresh = fetch().await?;
        match serde_json::to_value(&fresh) {
            Ok(value) => self.set(&key, value, ttl).await,
            Err(e) => warn!(key = %key, error = %e, "fetched value is not cacheable"),
        }
        Ok(fresh)
    }

    /// Returns a snapshot of the memory tier.
    pub async fn stats(&self) -> CacheStats {
        let store = self.store.lock().await;
        let size = store.len();
        let expired_count = store.expired_count();
        CacheStats {
            size,
            valid_count: size - expired_count,
            expired_count,
            max_size: store.max_size(),
        }
    }
}
