use parking_lot::RwLock;

use super::{Storage, StoredValues};
use crate::errors::Result;

/// Process-local storage
///
/// Nothing survives the process; useful for tests and for running a
/// repository before a durable backend is configured.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    data: RwLock<StoredValues>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-filled with `values`
    pub fn with_values(values: StoredValues) -> Self {
        Self {
            data: RwLock::new(values),
        }
    }
}

impl Storage for MemoryStorage {
    fn save(&self, values: &StoredValues) -> Result<bool> {
        let mut data = self.data.write();
        for (key, value) in values {
            data.insert(key.clone(), value.clone());
        }
        Ok(true)
    }

    fn get(&self) -> Result<StoredValues> {
        Ok(self.data.read().clone())
    }

    fn clear(&self) -> Result<bool> {
        self.data.write().clear();
        Ok(true)
    }

    fn clear_value(&self, key: &str) -> Result<bool> {
        self.data.write().remove(key);
        Ok(true)
    }
}
