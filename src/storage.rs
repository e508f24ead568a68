//! Key/value storage medium.
//!
//! The engine only ever sees the `KeyValueStore` port. `MemoryStore` backs
//! tests; `FileStore` keeps every key in one TOML table on disk.

use crate::error::{StoreError, StoreResult};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// String key/value medium the engine reads and writes.
pub trait KeyValueStore {
    /// Raw value stored under `key`, `None` when absent.
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&mut self, key: &str, value: &str) -> StoreResult<()>;

    /// Delete `key`. Removing an absent key is not an error.
    fn remove(&mut self, key: &str) -> StoreResult<()>;

    fn contains(&self, key: &str) -> StoreResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}

/// In-memory medium with optional write denial.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
    fail_writes: bool,
    denied_keys: HashSet<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deny every `set` and `remove`.
    pub fn with_fail_writes(mut self, fail_writes: bool) -> Self {
        self.fail_writes = fail_writes;
        self
    }

    /// Deny writes to a single key, e.g. to simulate a full quota on the
    /// unified document while the backup key still accepts writes.
    pub fn deny_writes_to(mut self, key: &str) -> Self {
        self.denied_keys.insert(key.to_string());
        self
    }

    /// Seed a value without going through write denial.
    pub fn insert(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }

    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    fn check_writable(&self, key: &str) -> StoreResult<()> {
        if self.fail_writes || self.denied_keys.contains(key) {
            return Err(StoreError::write(key, "write denied by storage medium"));
        }
        Ok(())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> StoreResult<()> {
        self.check_writable(key)?;
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> StoreResult<()> {
        self.check_writable(key)?;
        self.entries.remove(key);
        Ok(())
    }
}

/// File-backed medium: a TOML table of string values, rewritten on every
/// mutation.
#[derive(Debug)]
pub struct FileStore {
    file_path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    /// Open the store at `file_path`. A missing or empty file is an empty
    /// store; an unparsable file is an error so it is never overwritten.
    pub fn open(file_path: impl AsRef<Path>) -> StoreResult<Self> {
        let file_path = file_path.as_ref().to_path_buf();
        let entries = if file_path.exists() {
            let content = fs::read_to_string(&file_path)?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                toml::from_str(&content).map_err(|e| {
                    StoreError::read(&file_path.display().to_string(), e.to_string())
                })?
            }
        } else {
            BTreeMap::new()
        };
        Ok(Self { file_path, entries })
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    fn persist(&self, key: &str) -> StoreResult<()> {
        let content = toml::to_string_pretty(&self.entries)
            .map_err(|e| StoreError::write(key, e.to_string()))?;
        let tmp_path = self.file_path.with_extension("toml.tmp");
        fs::write(&tmp_path, content).map_err(|e| StoreError::write(key, e.to_string()))?;
        fs::rename(&tmp_path, &self.file_path)
            .map_err(|e| StoreError::write(key, e.to_string()))?;
        Ok(())
    }

    /// Apply a mutation and persist it, reverting the in-memory table if the
    /// file could not be written.
    fn mutate(&mut self, key: &str, value: Option<&str>) -> StoreResult<()> {
        let previous = match value {
            Some(v) => self.entries.insert(key.to_string(), v.to_string()),
            None => self.entries.remove(key),
        };
        if let Err(e) = self.persist(key) {
            match previous {
                Some(old) => {
                    self.entries.insert(key.to_string(), old);
                }
                None => {
                    self.entries.remove(key);
                }
            }
            return Err(e);
        }
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> StoreResult<()> {
        self.mutate(key, Some(value))
    }

    fn remove(&mut self, key: &str) -> StoreResult<()> {
        if !self.entries.contains_key(key) {
            return Ok(());
        }
        self.mutate(key, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn memory_store_round_trips_values() {
        let mut store = MemoryStore::new();
        store.set("a", "1").unwrap();
        assert_eq!(store.get("a").unwrap(), Some("1".to_string()));
        assert!(store.contains("a").unwrap());
        store.remove("a").unwrap();
        assert_eq!(store.get("a").unwrap(), None);
        // removing again is fine
        store.remove("a").unwrap();
    }

    #[test]
    fn memory_store_denies_writes() {
        let mut store = MemoryStore::new().with_fail_writes(true);
        assert!(store.set("a", "1").is_err());
        assert!(store.entries().is_empty());

        let mut store = MemoryStore::new().deny_writes_to("locked");
        assert!(store.set("locked", "1").is_err());
        assert!(store.set("open", "1").is_ok());
    }

    #[test]
    fn file_store_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.toml");

        let mut store = FileStore::open(&path).unwrap();
        store.set("organizer-data-v2", "{\"version\":\"2.0.0\"}").unwrap();
        store.set("multi", "line one\nline two").unwrap();
        drop(store);

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(
            reopened.get("organizer-data-v2").unwrap().as_deref(),
            Some("{\"version\":\"2.0.0\"}")
        );
        assert_eq!(
            reopened.get("multi").unwrap().as_deref(),
            Some("line one\nline two")
        );
        assert_eq!(reopened.file_path(), path.as_path());
    }

    #[test]
    fn file_store_remove_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.toml");

        let mut store = FileStore::open(&path).unwrap();
        store.set("k", "v").unwrap();
        store.remove("k").unwrap();
        drop(store);

        assert_eq!(FileStore::open(&path).unwrap().get("k").unwrap(), None);
    }

    #[test]
    fn file_store_refuses_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.toml");
        fs::write(&path, "this is = = not toml").unwrap();
        assert!(FileStore::open(&path).is_err());
    }
}
