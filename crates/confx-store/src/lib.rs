//! confx Store - durable backends and wiring for the persistent repository
//!
//! Provides:
//! - `FileStorage`: a JSON document rewritten atomically on every save
//! - `SqliteStorage`: a key/value table with embedded, checksummed migrations
//! - `Settings`: layered settings loading (file + `CONFX__*` environment)
//! - `bootstrap`: builds a ready `PersistentRepository` from settings

pub mod atomic;
pub mod bootstrap;
pub mod db;
pub mod errors;
pub mod file_storage;
pub mod migrations;
pub mod settings;
pub mod sqlite_storage;

// Re-export key types
pub use bootstrap::{build_repository, build_storage, load_static_config};
pub use errors::Result;
pub use file_storage::FileStorage;
pub use settings::{CacheSettings, EncryptionSettings, Settings, SqliteSettings, StorageSettings};
pub use sqlite_storage::{SqliteOptions, SqliteStorage};
