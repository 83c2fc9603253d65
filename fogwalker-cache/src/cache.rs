//! In-memory TTL cache keyed by content cache key.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Cache entry with TTL.
#[derive(Clone)]
struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    /// Live iff `now - created_at <= ttl`.
    fn is_live_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) <= self.ttl
    }
}

/// Cache configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Optional capacity bound. `None` (the default) keeps every entry until it
    /// expires on read, is deleted, or the process exits.
    pub max_entries: Option<usize>,
    /// Purge expired entries before evicting a live one when at capacity.
    pub auto_cleanup: bool,
}

impl CacheConfig {
    /// Unbounded cache.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Bounded cache that evicts the oldest entry once full.
    pub fn bounded(max_entries: usize) -> Self {
        Self {
            max_entries: Some(max_entries),
            auto_cleanup: true,
        }
    }
}

/// Process-wide TTL cache.
///
/// Thread-safe; each `set` replaces its key atomically. No cross-key
/// transactions and no single-flight: concurrent misses for one key may both
/// write, and the last write wins.
pub struct TtlCache<V> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    config: CacheConfig,
}

impl<V: Clone> TtlCache<V> {
    /// Creates an unbounded cache.
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    /// Creates a cache with custom configuration.
    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Gets a live value.
    ///
    /// An expired entry is removed as a side effect and reported as absent.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                None => return None,
                Some(entry) if entry.is_live_at(now) => return Some(entry.value.clone()),
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write();
        // A writer may have replaced the entry between the two locks.
        match entries.get(key) {
            Some(entry) if entry.is_live_at(now) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                debug!(key, "Evicted expired cache entry");
                None
            }
            None => None,
        }
    }

    /// Stores a value, unconditionally replacing any previous one.
    pub fn set(&self, key: &str, value: V, ttl: Duration) {
        self.set_at(key, value, ttl, Instant::now());
    }

    /// Stores a value with an explicit creation instant.
    pub fn set_at(&self, key: &str, value: V, ttl: Duration, created_at: Instant) {
        let mut entries = self.entries.write();

        if let Some(max) = self.config.max_entries {
            if !entries.contains_key(key) && entries.len() >= max {
                if self.config.auto_cleanup {
                    let now = Instant::now();
                    entries.retain(|_, e| e.is_live_at(now));
                }
                // Still at capacity? Remove oldest entry
                if entries.len() >= max {
                    if let Some(oldest_key) = entries
                        .iter()
                        .min_by_key(|(_, e)| e.created_at)
                        .map(|(k, _)| k.clone())
                    {
                        entries.remove(&oldest_key);
                        debug!(key = %oldest_key, "Evicted oldest cache entry at capacity");
                    }
                }
            }
        }

        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                created_at,
                ttl,
            },
        );
    }

    /// Removes an entry.
    pub fn delete(&self, key: &str) {
        self.entries.write().remove(key);
    }

    /// Clears all entries.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Removes all expired entries.
    pub fn cleanup_expired(&self) {
        let now = Instant::now();
        self.entries.write().retain(|_, e| e.is_live_at(now));
    }

    /// Number of stored entries, including expired ones not yet read.
    pub fn size(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let entries = self.entries.read();
        let expired = entries.values().filter(|e| !e.is_live_at(now)).count();
        CacheStats {
            total_entries: entries.len(),
            expired_entries: expired,
            live_entries: entries.len().saturating_sub(expired),
            capacity: self.config.max_entries,
        }
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache statistics.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub expired_entries: usize,
    pub live_entries: usize,
    pub capacity: Option<usize>,
}
