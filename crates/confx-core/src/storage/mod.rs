//! Persistent storage contract
//!
//! Storage is a flat key/value space: keys are item storage keys, values
//! are whatever `ConfigItem::save_value` produced (scalars, or JSON strings
//! for cast containers). Backends only have to round-trip that map.

pub mod memory;

use std::collections::BTreeMap;

use crate::errors::Result;
use crate::value::Value;

pub use memory::MemoryStorage;

/// Flat storage record, keyed by item storage key
pub type StoredValues = BTreeMap<String, Value>;

/// Durable key/value persistence for item values
///
/// Implementations take `&self` and handle their own interior locking, so a
/// backend can be shared between a repository and the code that built it.
pub trait Storage: Send + Sync {
    /// Merge `values` into the stored set
    ///
    /// # Errors
    ///
    /// Returns `Storage` or `Io` when the backend cannot be written.
    fn save(&self, values: &StoredValues) -> Result<bool>;

    /// Full stored set
    ///
    /// # Errors
    ///
    /// Returns `Storage` or `Io` when the backend cannot be read, for example
    /// when its table has not been provisioned yet.
    fn get(&self) -> Result<StoredValues>;

    /// Delete every stored value
    ///
    /// # Errors
    ///
    /// Returns `Storage` or `Io` on backend failure.
    fn clear(&self) -> Result<bool>;

    /// Delete the value stored under `key`
    ///
    /// # Errors
    ///
    /// Returns `Storage` or `Io` on backend failure.
    fn clear_value(&self, key: &str) -> Result<bool>;
}
