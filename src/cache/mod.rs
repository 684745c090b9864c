//! Two-tier response cache with TTL expiry and bounded memory.
//!
//! The fast tier is an in-memory map bounded by entry count; when full, the
//! least recently accessed entry is evicted. The optional persistent tier
//! writes each entry to its own JSON file so cached responses survive
//! process restarts. All persistent I/O failures degrade to cache misses.

mod entry;
mod manager;
mod persist;
mod store;

pub use manager::{CacheConfig, CacheManager, CacheStats, generate_key};
