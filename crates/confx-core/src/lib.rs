//! confx Core - persistent configuration overlay
//!
//! This crate provides the in-memory side of confx:
//! - `Value` and the dotted-path `MemoryConfig` store
//! - `ConfigItem` descriptors with cast and encryption policies
//! - The `Storage`, `Cache`, `Encrypter` and `ValidationEngine` contracts,
//!   each with a process-local implementation
//! - `PersistentRepository`, the decorator that lazily restores persisted
//!   values and saves edits back through a storage backend
//!
//! Durable backends and settings-driven wiring live in `confx-store`.

pub mod cache;
pub mod crypto;
pub mod errors;
pub mod item;
pub mod logging_facility;
pub mod memory_config;
pub mod persistent;
pub mod repository;
pub mod storage;
pub mod validation;
pub mod value;

pub use confx_core_types::schema;

// Re-export commonly used types
pub use cache::{Cache, MemoryCache};
pub use crypto::{ChaChaEncrypter, Encrypter};
pub use errors::{ConfigError, ExError, ExErrorKind, Result, ValidationErrors};
pub use item::{Cast, ConfigItem, ItemDescriptor, ItemSpec};
pub use memory_config::MemoryConfig;
pub use persistent::{PersistentRepository, RepositoryState};
pub use repository::{shared, ConfigRepository, SharedConfig};
pub use storage::{MemoryStorage, Storage, StoredValues};
pub use validation::{RuleValidator, ValidationEngine, ValidationOutcome};
pub use value::Value;
