//! In-memory cache tier with lazy expiry and recency-based eviction.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, trace};

use super::entry::CacheEntry;

/// Bounded map of live cache entries.
///
/// Expiry is lazy: an expired entry is dropped when a read finds it, or
/// when a [`sweep`] pass visits it. When an insert would exceed `max_size`,
/// the entry with the oldest `last_accessed` is evicted first. Recency is a
/// monotonic per-store sequence, not wall-clock time: every get and set
/// stamps the entry with the next sequence value, so access order is total
/// even when operations land inside the same millisecond.
///
/// [`sweep`]: MemoryStore::sweep
#[derive(Debug)]
pub struct MemoryStore {
    entries: HashMap<String, CacheEntry>,
    max_size: usize,
    /// Access sequence; incremented on every get and set.
    clock: u64,
}

impl MemoryStore {
    /// Creates a store holding at most `max_size` entries.
    ///
    /// `max_size` is clamped to at least 1.
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: HashMap::new(),
            max_size: max_size.max(1),
            clock: 0,
        }
    }

    /// Returns the configured capacity.
    #[must_use]
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Returns the number of entries currently held, expired or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when no entries are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up a live value, refreshing its recency.
    ///
    /// An expired entry is removed and reported as a miss.
    pub fn get(&mut self, key: &str) -> Option<Value> {
        self.clock += 1;
        let stamp = self.clock;
        match self.entries.get_mut(key) {
            Some(entry) if entry.is_expired() => {
                trace!(key, "dropping expired entry on read");
                self.entries.remove(key);
                None
            }
            Some(entry) => {
                entry.last_accessed = stamp;
                Some(entry.value.clone())
            }
            None => None,
        }
    }

    /// Inserts or replaces an entry, evicting the least recently accessed
    /// entry first if the store is full.
    pub fn set(&mut self, key: String, mut entry: CacheEntry) {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_size {
            self.evict_least_recent();
        }
        self.clock += 1;
        entry.last_accessed = self.clock;
        self.entries.insert(key, entry);
    }

    /// Removes an entry, returning true if it was present.
    pub fn delete(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Removes all expired entries and returns how many were dropped.
    pub fn sweep(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        before - self.entries.len()
    }

    /// Counts entries that are past their TTL but not yet collected.
    #[must_use]
    pub fn expired_count(&self) -> usize {
        self.entries.values().filter(|entry| entry.is_expired()).count()
    }

    fn evict_least_recent(&mut self) {
        let victim = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_accessed)
            .map(|(key, _)| key.clone());
        if let Some(key) = victim {
            debug!(key = %key, "evicting least recently accessed entry");
            self.entries.remove(&key);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::super::entry::current_timestamp_ms;
    use super::*;

    fn live(value: i64) -> CacheEntry {
        CacheEntry::new(json!(value), None)
    }

    #[test]
    fn test_get_miss_on_unknown_key() {
        let mut store = MemoryStore::new(10);
        assert!(store.get("nope").is_none());
    }

    #[test]
    fn test_set_then_get() {
        let mut store = MemoryStore::new(10);
        store.set("k".to_string(), live(1));
        assert_eq!(store.get("k"), Some(json!(1)));
    }

    #[test]
    fn test_expired_entry_is_removed_on_read() {
        let mut store = MemoryStore::new(10);
        let mut entry = live(1);
        entry.expires_at = Some(current_timestamp_ms().saturating_sub(1));
        store.set("k".to_string(), entry);

        assert!(store.get("k").is_none());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_eviction_drops_oldest_insert_without_reads() {
        let mut store = MemoryStore::new(3);
        store.set("k1".to_string(), live(1));
        store.set("k2".to_string(), live(2));
        store.set("k3".to_string(), live(3));

        // Nothing was read, so insertion order is access order.
        store.set("k4".to_string(), live(4));
        assert!(store.get("k1").is_none());
        assert_eq!(store.get("k2"), Some(json!(2)));
        assert_eq!(store.get("k3"), Some(json!(3)));
        assert_eq!(store.get("k4"), Some(json!(4)));
    }

    #[test]
    fn test_read_refreshes_recency() {
        let mut store = MemoryStore::new(2);
        store.set("k1".to_string(), live(1));
        store.set("k2".to_string(), live(2));

        // Reading k1 makes k2 the eviction candidate.
        assert!(store.get("k1").is_some());
        store.set("k3".to_string(), live(3));
        assert!(store.get("k2").is_none());
        assert!(store.get("k1").is_some());
    }

    #[test]
    fn test_eviction_is_deterministic_under_rapid_access() {
        // All operations in one round land well inside a single millisecond;
        // sequence-based recency must still give a total access order.
        for round in 0..50 {
            let mut store = MemoryStore::new(3);
            store.set("k1".to_string(), live(1));
            store.set("k2".to_string(), live(2));
            store.set("k3".to_string(), live(3));
            assert!(store.get("k1").is_some());

            store.set("k4".to_string(), live(4));
            assert!(store.get("k2").is_none(), "round {round}: k2 must be evicted");
            assert!(store.get("k1").is_some(), "round {round}: k1 must survive");
            assert!(store.get("k3").is_some(), "round {round}: k3 must survive");
            assert!(store.get("k4").is_some(), "round {round}: k4 must survive");
        }
    }

    #[test]
    fn test_replacing_existing_key_does_not_evict() {
        let mut store = MemoryStore::new(2);
        store.set("k1".to_string(), live(1));
        store.set("k2".to_string(), live(2));
        store.set("k1".to_string(), live(10));

        assert_eq!(store.len(), 2);
        assert_eq!(store.get("k1"), Some(json!(10)));
        assert_eq!(store.get("k2"), Some(json!(2)));
    }

    #[test]
    fn test_sweep_collects_expired_entries() {
        let mut store = MemoryStore::new(10);
        let mut stale = live(1);
        stale.expires_at = Some(current_timestamp_ms().saturating_sub(1));
        store.set("stale".to_string(), stale);
        store.set("fresh".to_string(), live(2));

        assert_eq!(store.expired_count(), 1);
        assert_eq!(store.sweep(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_clear_empties_store() {
        let mut store = MemoryStore::new(10);
        store.set("k".to_string(), live(1));
        store.clear();
        assert_eq!(store.len(), 0);
    }
}
