//! Cache contract for the persisted value set
//!
//! The repository caches the whole stored set under one key, so a warm cache
//! spares every process the storage read on first access.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::storage::StoredValues;

pub trait Cache: Send + Sync {
    fn get(&self, key: &str) -> Option<StoredValues>;

    /// Store `values` under `key` for `ttl`; a zero TTL removes the entry
    fn set(&self, key: &str, values: &StoredValues, ttl: Duration);

    fn delete(&self, key: &str);

    fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

#[derive(Debug)]
struct Entry {
    values: StoredValues,
    expires_at: Instant,
}

/// Process-local cache with per-entry expiry
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<StoredValues> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.values.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn set(&self, key: &str, values: &StoredValues, ttl: Duration) {
        let mut entries = self.entries.lock();
        if ttl.is_zero() {
            entries.remove(key);
            return;
        }
        // Saturate on overflow: an unrepresentable expiry means "never"
        let expires_at = Instant::now()
            .checked_add(ttl)
            .unwrap_or_else(|| Instant::now() + Duration::from_secs(u32::MAX.into()));
        entries.insert(
            key.to_string(),
            Entry {
                values: values.clone(),
                expires_at,
            },
        );
    }

    fn delete(&self, key: &str) {
        self.entries.lock().remove(key);
    }
}
