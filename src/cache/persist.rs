//! Persistent cache tier, one JSON file per key.
//!
//! Keys are hashed to fixed-length file names so arbitrary key material
//! never reaches the filesystem. Every I/O failure is logged and degrades
//! to a miss; the persistent tier can never fail a cache operation.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{trace, warn};

use super::entry::current_timestamp_ms;

/// On-disk record for one cached entry.
#[derive(Debug, Serialize, Deserialize)]
struct PersistentRecord {
    value: Value,
    /// Absolute expiry in milliseconds since the epoch.
    expires: Option<u64>,
}

/// Directory-backed cache tier.
#[derive(Debug)]
pub struct PersistentStore {
    dir: PathBuf,
}

impl PersistentStore {
    /// Creates a store rooted at `dir`. The directory is created on first
    /// write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Reads a live value together with its absolute expiry, deleting the
    /// file if its record has expired.
    pub async fn read_entry(&self, key: &str) -> Option<(Value, Option<u64>)> {
        let path = self.path_for(key);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read cache file");
                return None;
            }
        };

        let record: PersistentRecord = match serde_json::from_slice(&raw) {
            Ok(record) => record,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "discarding corrupt cache file");
                remove_quietly(&path).await;
                return None;
            }
        };

        if record
            .expires
            .is_some_and(|expires| current_timestamp_ms() >= expires)
        {
            trace!(key, "persistent entry expired");
            remove_quietly(&path).await;
            return None;
        }

        Some((record.value, record.expires))
    }

    /// Writes a value with an optional absolute expiry. Failures are logged
    /// and swallowed.
    pub async fn write(&self, key: &str, value: &Value, expires: Option<u64>) {
        let record = PersistentRecord {
            value: value.clone(),
            expires,
        };
        let raw = match serde_json::to_vec(&record) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key, error = %e, "failed to serialize cache record");
                return;
            }
        };

        if let Err(e) = tokio::fs::create_dir_all(&self.dir).await {
            warn!(dir = %self.dir.display(), error = %e, "failed to create cache directory");
            return;
        }
        let path = self.path_for(key);
        if let Err(e) = tokio::fs::write(&path, raw).await {
            warn!(path = %path.display(), error = %e, "failed to write cache file");
        }
    }

    /// Removes the file for `key`, if any.
    pub async fn delete(&self, key: &str) {
        remove_quietly(&self.path_for(key)).await;
    }

    /// Removes every cache file under the store directory.
    pub async fn clear(&self) {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "failed to list cache directory");
                return;
            }
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                remove_quietly(&path).await;
            }
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir.join(format!("{digest:x}.json"))
    }
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "failed to remove cache file");
        }
    }
}
