//! Canonical schema constants for structured logging and events
//!
//! These constants keep log fields consistent between the repository,
//! the storage backends and the CLI.

// Canonical field keys for structured logging
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";

// Config identifiers
pub const FIELD_ITEM_ID: &str = "item_id";
pub const FIELD_CONFIG_KEY: &str = "config_key";
pub const FIELD_CACHE_KEY: &str = "cache_key";

// Collection sizes
pub const FIELD_ITEM_COUNT: &str = "item_count";
pub const FIELD_VALUE_COUNT: &str = "value_count";

// Error fields
pub const FIELD_ERR_KIND: &str = "err.kind";
pub const FIELD_ERR_CODE: &str = "err.code";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";
