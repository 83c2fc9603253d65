//! Client persisted cache.
//!
//! Entries live in a [`Storage`] under `fogwalker_cache_{id}` as
//! `{"data": .., "timestamp": <ms>, "expiry": <ms>}`. Reads of an expired
//! entry remove it. Storage failures are logged and swallowed: callers see
//! absent values or silently skipped writes, never errors.
//!
//! A cache without storage ([`PersistedCache::detached`]) stands in for
//! execution contexts that have no durable store; every operation is a no-op.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use fogwalker_core::{FogwalkerError, Result, CLIENT_CACHE_PREFIX, CLIENT_DEFAULT_TTL};

use crate::storage::Storage;

#[derive(Serialize, Deserialize)]
struct StoredEntry<T> {
    data: T,
    /// Creation time, ms since the Unix epoch
    timestamp: i64,
    /// TTL in ms
    expiry: u64,
}

impl<T> StoredEntry<T> {
    fn age_ms(&self, now_ms: i64) -> u64 {
        u64::try_from(now_ms.saturating_sub(self.timestamp)).unwrap_or(0)
    }

    fn is_live_at(&self, now_ms: i64) -> bool {
        self.age_ms(now_ms) <= self.expiry
    }
}

/// Entry metadata for status displays.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheInfo {
    /// Entry present and live
    pub exists: bool,
    /// Time since the entry was written
    pub age: Duration,
    /// TTL the entry was written with
    pub ttl: Duration,
}

/// Per-identity cache over durable storage.
#[derive(Clone, Default)]
pub struct PersistedCache {
    storage: Option<Arc<dyn Storage>>,
}

impl PersistedCache {
    /// Creates a cache over `storage`.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage: Some(storage),
        }
    }

    /// Creates a cache with no backing store.
    pub fn detached() -> Self {
        Self { storage: None }
    }

    /// Whether a backing store is present.
    pub fn is_attached(&self) -> bool {
        self.storage.is_some()
    }

    fn key(id: &str) -> String {
        format!("{CLIENT_CACHE_PREFIX}{id}")
    }

    fn now_ms() -> i64 {
        Utc::now().timestamp_millis()
    }

    /// Reads a live value.
    pub fn get<T: DeserializeOwned>(&self, id: &str) -> Option<T> {
        let storage = self.storage.as_ref()?;
        let key = Self::key(id);

        let read = || -> Result<Option<StoredEntry<T>>> {
            match storage.get_item(&key)? {
                Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
                None => Ok(None),
            }
        };

        match read() {
            Ok(Some(entry)) if entry.is_live_at(Self::now_ms()) => Some(entry.data),
            Ok(Some(_)) => {
                debug!(id, "Persisted entry expired");
                if let Err(e) = storage.remove_item(&key) {
                    warn!(id, error = %e, "Failed to remove expired persisted entry");
                }
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!(id, error = %e, "Failed to read persisted cache");
                None
            }
        }
    }

    /// Writes a value with a TTL. A rejected write keeps the previous entry.
    pub fn set<T: Serialize>(&self, id: &str, value: &T, ttl: Duration) {
        let Some(storage) = &self.storage else {
            return;
        };

        let entry = StoredEntry {
            data: value,
            timestamp: Self::now_ms(),
            expiry: u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX),
        };
        let result = serde_json::to_string(&entry)
            .map_err(FogwalkerError::from)
            .and_then(|raw| storage.set_item(&Self::key(id), &raw));

        if let Err(e) = result {
            warn!(id, error = %e, "Failed to write persisted cache");
        }
    }

    /// Writes a value with the default TTL.
    pub fn set_default<T: Serialize>(&self, id: &str, value: &T) {
        self.set(id, value, CLIENT_DEFAULT_TTL);
    }

    /// Removes an entry.
    pub fn delete(&self, id: &str) {
        if let Some(storage) = &self.storage {
            if let Err(e) = storage.remove_item(&Self::key(id)) {
                warn!(id, error = %e, "Failed to delete persisted entry");
            }
        }
    }

    /// Removes every entry in the cache namespace; other keys are untouched.
    pub fn clear_all(&self) {
        let Some(storage) = &self.storage else {
            return;
        };

        let keys = match storage.keys() {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "Failed to list persisted cache keys");
                return;
            }
        };
        for key in keys.iter().filter(|k| k.starts_with(CLIENT_CACHE_PREFIX)) {
            if let Err(e) = storage.remove_item(key) {
                warn!(key, error = %e, "Failed to clear persisted entry");
            }
        }
    }

    /// Entry metadata. `None` without storage or when the entry is unreadable.
    pub fn info(&self, id: &str) -> Option<CacheInfo> {
        let storage = self.storage.as_ref()?;

        let raw = match storage.get_item(&Self::key(id)) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                return Some(CacheInfo {
                    exists: false,
                    age: Duration::ZERO,
                    ttl: Duration::ZERO,
                })
            }
            Err(e) => {
                debug!(id, error = %e, "Failed to read persisted entry info");
                return None;
            }
        };

        let entry: StoredEntry<serde_json::Value> = serde_json::from_str(&raw).ok()?;
        let now = Self::now_ms();
        Some(CacheInfo {
            exists: entry.is_live_at(now),
            age: Duration::from_millis(entry.age_ms(now)),
            ttl: Duration::from_millis(entry.expiry),
        })
    }
}
