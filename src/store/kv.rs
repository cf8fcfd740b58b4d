//! Key-value backends
//!
//! A store scoped to one data directory, holding one string value per key.
//! `FileStore` keeps each key in `<dir>/<key>.json` and replaces files
//! atomically (write to a temp file, then rename). `MemoryStore` is for tests
//! and ephemeral runs.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::error::{StoreError, StoreResult};

pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    fn set(&mut self, key: &str, value: &str) -> StoreResult<()>;

    fn remove(&mut self, key: &str) -> StoreResult<()>;
}

/// File-per-key store under one directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open a store, creating the directory if needed
    pub fn open(dir: impl AsRef<Path>) -> StoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> StoreResult<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> StoreResult<()> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");

        let mut file = File::create(&tmp).map_err(|e| StoreError::io(&tmp, e))?;
        file.write_all(value.as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(|e| StoreError::io(&tmp, e))?;
        drop(file);

        fs::rename(&tmp, &path).map_err(|e| StoreError::io(&path, e))
    }

    fn remove(&mut self, key: &str) -> StoreResult<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }
}

/// In-memory store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> StoreResult<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> StoreResult<()> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_file_store_set_get_remove() {
        let dir = tempdir().unwrap();
        let mut store = FileStore::open(dir.path().join("nested")).unwrap();

        assert_eq!(store.get("followedDevs").unwrap(), None);
        store.set("followedDevs", "[]").unwrap();
        assert_eq!(store.get("followedDevs").unwrap().as_deref(), Some("[]"));
        assert!(dir.path().join("nested").join("followedDevs.json").exists());
        assert!(!dir.path().join("nested").join("followedDevs.json.tmp").exists());

        store.set("followedDevs", "[1]").unwrap();
        assert_eq!(store.get("followedDevs").unwrap().as_deref(), Some("[1]"));

        store.remove("followedDevs").unwrap();
        assert_eq!(store.get("followedDevs").unwrap(), None);
        // removing a missing key is fine
        store.remove("followedDevs").unwrap();
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let mut store = FileStore::open(dir.path()).unwrap();
            store.set("chartProvider", "photon").unwrap();
        }
        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(store.get("chartProvider").unwrap().as_deref(), Some("photon"));
    }

    #[test]
    fn test_file_store_rejects_path_keys() {
        let dir = tempdir().unwrap();
        let mut store = FileStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.set("../escape", "x"),
            Err(StoreError::InvalidKey(_))
        ));
        assert!(store.get("").is_err());
    }

    #[test]
    fn test_memory_store() {
        let mut store = MemoryStore::new();
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }
}
