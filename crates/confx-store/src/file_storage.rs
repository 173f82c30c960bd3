//! File-backed storage
//!
//! The whole stored set lives in one JSON document that is regenerated on
//! every write. Writes are atomic; an invalidation hook lets callers drop any
//! derived copy of the file (another process's cache, a file watcher) after
//! each write or removal.

#![allow(clippy::result_large_err)]

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use confx_core::errors::ConfigError;
use confx_core::storage::{Storage, StoredValues};
use parking_lot::Mutex;

use crate::atomic::atomic_write;
use crate::errors::{io_error, Result};

/// Callback invoked with the storage file path after it changed
pub type InvalidationHook = Box<dyn Fn(&Path) + Send + Sync>;

pub struct FileStorage {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
    on_invalidate: Option<InvalidationHook>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
            on_invalidate: None,
        }
    }

    /// Register the callback run after every write or removal of the file
    pub fn with_invalidation_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Path) + Send + Sync + 'static,
    {
        self.on_invalidate = Some(Box::new(hook));
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<StoredValues> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(StoredValues::new()),
            Err(err) => return Err(io_error("read_storage_file", err)),
        };

        if content.trim().is_empty() {
            return Ok(StoredValues::new());
        }

        serde_json::from_str(&content).map_err(|e| ConfigError::Serialization {
            message: format!("{}: {}", self.path.display(), e),
        })
    }

    fn write(&self, values: &StoredValues) -> Result<()> {
        let content = serde_json::to_vec_pretty(values)?;
        atomic_write(&self.path, &content)?;
        self.invalidate();
        Ok(())
    }

    fn invalidate(&self) {
        if let Some(hook) = &self.on_invalidate {
            hook(&self.path);
        }
    }
}

impl Storage for FileStorage {
    fn save(&self, values: &StoredValues) -> Result<bool> {
        let _guard = self.write_lock.lock();
        let mut current = self.read()?;
        current.extend(values.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.write(&current)?;
        Ok(true)
    }

    fn get(&self) -> Result<StoredValues> {
        self.read()
    }

    fn clear(&self) -> Result<bool> {
        let _guard = self.write_lock.lock();
        match fs::remove_file(&self.path) {
            Ok(()) => {
                self.invalidate();
                Ok(true)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(true),
            Err(err) => Err(io_error("remove_storage_file", err)),
        }
    }

    fn clear_value(&self, key: &str) -> Result<bool> {
        let _guard = self.write_lock.lock();
        let mut current = self.read()?;
        if current.remove(key).is_none() {
            return Ok(true);
        }
        self.write(&current)?;
        Ok(true)
    }
}

impl fmt::Debug for FileStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileStorage")
            .field("path", &self.path)
            .field("has_invalidation_hook", &self.on_invalidate.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_reads_empty() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path().join("absent.json"));

        assert!(storage.get().unwrap().is_empty());
    }

    #[test]
    fn test_empty_file_reads_empty() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(&path, "  \n").unwrap();

        assert!(FileStorage::new(path).get().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_file_is_serialization_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();

        let err = FileStorage::new(path).get().unwrap_err();
        assert!(matches!(err, ConfigError::Serialization { .. }));
    }
}
