//! Error handling for confx-store
//!
//! Store failures are reported through confx-core's `ConfigError`, so the
//! repository can propagate them without knowing which backend produced them.

use confx_core::errors::ConfigError;

/// Result type alias using ConfigError
pub use confx_core::errors::Result;

/// Create a migration error
pub fn migration_error(migration_id: &str, reason: &str) -> ConfigError {
    ConfigError::Storage {
        op: "migration".to_string(),
        message: format!("Migration {} failed: {}", migration_id, reason),
    }
}

/// Create a checksum mismatch error
pub fn checksum_mismatch(migration_id: &str, expected: &str, actual: &str) -> ConfigError {
    ConfigError::Storage {
        op: "migration_checksum".to_string(),
        message: format!(
            "Checksum mismatch for migration {}: expected {}, got {}",
            migration_id, expected, actual
        ),
    }
}

/// Create an error for a table or column name that is not a plain identifier
pub fn invalid_identifier(name: &str) -> ConfigError {
    ConfigError::InvalidSettings {
        message: format!("'{}' is not a valid SQL identifier", name),
    }
}

/// Create a database error from rusqlite::Error
pub fn from_rusqlite(err: rusqlite::Error) -> ConfigError {
    ConfigError::Storage {
        op: "sqlite".to_string(),
        message: err.to_string(),
    }
}

/// Create an IO error
pub fn io_error(operation: &str, err: std::io::Error) -> ConfigError {
    ConfigError::Io {
        op: operation.to_string(),
        message: err.to_string(),
    }
}

/// Create an error for a settings document the `config` crate rejected
pub fn settings_error(err: config::ConfigError) -> ConfigError {
    ConfigError::InvalidSettings {
        message: err.to_string(),
    }
}
