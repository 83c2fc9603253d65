//! Durable key/value stores behind the persisted cache.
//!
//! [`Storage`] mirrors a browser's per-origin string store: string keys,
//! string values, synchronous calls that may fail (quota exceeded, storage
//! disabled). A failed write leaves the store exactly as it was.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::{debug, info};

use fogwalker_core::{FogwalkerError, Result};

/// Synchronous string key/value store.
pub trait Storage: Send + Sync {
    /// Reads a value.
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Writes a value, replacing any previous one.
    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Removes a value. Missing keys are not an error.
    fn remove_item(&self, key: &str) -> Result<()>;

    /// Lists all keys.
    fn keys(&self) -> Result<Vec<String>>;
}

/// Bytes a map occupies, counted as key plus value lengths.
fn footprint(items: &HashMap<String, String>) -> usize {
    items.iter().map(|(k, v)| k.len() + v.len()).sum()
}

/// Checks a prospective write against an optional quota.
fn check_quota(
    items: &HashMap<String, String>,
    key: &str,
    value: &str,
    quota: Option<usize>,
) -> Result<()> {
    let Some(limit) = quota else {
        return Ok(());
    };
    let replaced = items.get(key).map(|old| key.len() + old.len()).unwrap_or(0);
    let needed = footprint(items) - replaced + key.len() + value.len();
    if needed > limit {
        return Err(FogwalkerError::StorageFull { needed, limit });
    }
    Ok(())
}

/// In-memory store.
#[derive(Default)]
pub struct MemoryStorage {
    items: RwLock<HashMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryStorage {
    /// Creates an unlimited store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store rejecting writes beyond `quota` bytes.
    pub fn with_quota(quota: usize) -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
            quota: Some(quota),
        }
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Returns true if empty.
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.read().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut items = self.items.write();
        check_quota(&items, key, value, self.quota)?;
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.items.write().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.items.read().keys().cloned().collect())
    }
}

/// Store persisted as a single JSON object file.
///
/// Every mutation rewrites the file atomically (write to a temp file, then
/// rename) before the in-memory view changes, so a failed write changes
/// nothing.
pub struct FileStorage {
    path: PathBuf,
    items: RwLock<HashMap<String, String>>,
    quota: Option<usize>,
}

impl FileStorage {
    /// Opens the store at `path`, loading it if the file exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let items = match fs::read(&path) {
            Ok(bytes) if bytes.is_empty() => HashMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                FogwalkerError::Storage(format!("Corrupt store at {}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No store file yet, starting empty");
                HashMap::new()
            }
            Err(e) => return Err(e.into()),
        };

        info!(path = %path.display(), entries = items.len(), "Opened file storage");

        Ok(Self {
            path,
            items: RwLock::new(items),
            quota: None,
        })
    }

    /// Sets a byte quota for subsequent writes.
    pub fn with_quota(mut self, quota: usize) -> Self {
        self.quota = Some(quota);
        self
    }

    /// Returns the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, items: &HashMap<String, String>) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        let contents = serde_json::to_vec_pretty(items)?;
        let temp_path = self.path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(&contents)?;
        file.sync_all()?;

        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    /// Applies `change` to a copy, persists it, then swaps it in.
    fn mutate(&self, change: impl FnOnce(&mut HashMap<String, String>) -> Result<()>) -> Result<()> {
        let mut items = self.items.write();
        let mut next = items.clone();
        change(&mut next)?;
        self.persist(&next)?;
        *items = next;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.read().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.mutate(|items| {
            check_quota(items, key, value, self.quota)?;
            items.insert(key.to_string(), value.to_string());
            Ok(())
        })
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        if !self.items.read().contains_key(key) {
            return Ok(());
        }
        self.mutate(|items| {
            items.remove(key);
            Ok(())
        })
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.items.read().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_memory_roundtrip() {
        let storage = MemoryStorage::new();
        storage.set_item("a", "1").unwrap();
        assert_eq!(storage.get_item("a").unwrap(), Some("1".into()));
        storage.remove_item("a").unwrap();
        assert_eq!(storage.get_item("a").unwrap(), None);
        storage.remove_item("a").unwrap();
    }

    #[test]
    fn test_quota_rejects_without_partial_write() {
        let storage = MemoryStorage::with_quota(10);
        storage.set_item("k", "12345").unwrap();

        let err = storage.set_item("k", "0123456789").unwrap_err();
        assert!(matches!(err, FogwalkerError::StorageFull { needed: 11, limit: 10 }));
        assert_eq!(storage.get_item("k").unwrap(), Some("12345".into()));
    }

    #[test]
    fn test_quota_counts_replacement_not_addition() {
        let storage = MemoryStorage::with_quota(6);
        storage.set_item("k", "12345").unwrap();
        storage.set_item("k", "54321").unwrap();
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn test_file_storage_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let storage = FileStorage::open(&path).unwrap();
        storage.set_item("fogwalker_cache_sediment", "{}").unwrap();
        storage.set_item("other", "x").unwrap();
        storage.remove_item("other").unwrap();
        drop(storage);

        let reopened = FileStorage::open(&path).unwrap();
        assert_eq!(
            reopened.get_item("fogwalker_cache_sediment").unwrap(),
            Some("{}".into())
        );
        assert_eq!(reopened.keys().unwrap(), vec!["fogwalker_cache_sediment".to_string()]);
    }

    #[test]
    fn test_file_storage_atomic_write_leaves_no_temp() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.json");

        let storage = FileStorage::open(&path).unwrap();
        storage.set_item("k", "v").unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_file_storage_quota_leaves_file_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let storage = FileStorage::open(&path).unwrap().with_quota(4);
        storage.set_item("k", "v").unwrap();
        let before = fs::read(&path).unwrap();

        assert!(storage.set_item("k2", "long value").is_err());
        assert_eq!(fs::read(&path).unwrap(), before);
        assert_eq!(storage.get_item("k2").unwrap(), None);
    }

    #[test]
    fn test_corrupt_file_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, b"not json").unwrap();

        assert!(matches!(
            FileStorage::open(&path),
            Err(FogwalkerError::Storage(_))
        ));
    }
}
