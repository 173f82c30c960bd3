use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// Result type alias using ConfigError
pub type Result<T> = std::result::Result<T, ConfigError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code used by the CLI, by log events and
/// by tests that assert on failure classes rather than message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Item definition
    MissingKey,
    UnboundRepository,
    UnsupportedCast,
    InvalidRule,

    // Value transforms
    Decryption,
    Encryption,
    Serialization,

    // Input
    Validation,
    InvalidSettings,

    // Integration/IO
    Persistence,
    Io,

    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::MissingKey => "ERR_MISSING_KEY",
            ExErrorKind::UnboundRepository => "ERR_UNBOUND_REPOSITORY",
            ExErrorKind::UnsupportedCast => "ERR_UNSUPPORTED_CAST",
            ExErrorKind::InvalidRule => "ERR_INVALID_RULE",
            ExErrorKind::Decryption => "ERR_DECRYPTION",
            ExErrorKind::Encryption => "ERR_ENCRYPTION",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Validation => "ERR_VALIDATION",
            ExErrorKind::InvalidSettings => "ERR_INVALID_SETTINGS",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// Carries a classification plus the operation and config key involved, so a
/// failure can be reported without parsing its message.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    key: Option<String>,
    message: String,
}

impl ExError {
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            key: None,
            message: String::new(),
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add config key context
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ExError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(key) = &self.key {
            write!(f, " (key: {})", key)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {}

// ========== End Error Facility ==========

/// Per-field validation messages, keyed by item id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationErrors {
    messages: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new(messages: BTreeMap<String, Vec<String>>) -> Self {
        Self { messages }
    }

    pub fn messages(&self) -> &BTreeMap<String, Vec<String>> {
        &self.messages
    }

    /// Messages for a single item id
    pub fn get(&self, id: &str) -> Option<&[String]> {
        self.messages.get(id).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// First message of the first failing field
    pub fn first(&self) -> Option<&str> {
        self.messages
            .values()
            .flat_map(|messages| messages.iter())
            .map(String::as_str)
            .next()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let all: Vec<&str> = self
            .messages
            .values()
            .flat_map(|messages| messages.iter())
            .map(String::as_str)
            .collect();
        write!(f, "{}", all.join(" "))
    }
}

/// Error taxonomy for confx operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Item descriptor has no storage key
    #[error("Config item descriptor must specify a key")]
    MissingKey { id: Option<String> },

    /// Item value accessed before a config repository was bound
    #[error("Config item {key} is not bound to a config repository")]
    UnboundRepository { key: String },

    /// Cast tag outside the supported vocabulary
    #[error("Unsupported cast '{cast}' for config item {key}")]
    UnsupportedCast { key: String, cast: String },

    /// Ciphertext could not be decrypted (key rotation, corruption, plain value)
    #[error("Failed to decrypt value: {message}")]
    Decryption { message: String },

    /// Value could not be encrypted, or no encrypter is configured
    #[error("Failed to encrypt value: {message}")]
    Encryption { message: String },

    /// Backing store failure
    #[error("Storage operation '{op}' failed: {message}")]
    Storage { op: String, message: String },

    /// Input rejected by validation rules
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// Rule descriptor not understood by the validation engine
    #[error("Invalid validation rule: {rule}")]
    InvalidRule { rule: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Invalid settings: {message}")]
    InvalidSettings { message: String },

    #[error("I/O error during {op}: {message}")]
    Io { op: String, message: String },
}

impl ConfigError {
    /// True for failures that restore treats as "skip this key"
    pub fn is_recoverable_on_restore(&self) -> bool {
        matches!(
            self,
            ConfigError::Decryption { .. }
                | ConfigError::Serialization { .. }
                | ConfigError::UnsupportedCast { .. }
        )
    }
}

impl From<ConfigError> for ExError {
    fn from(err: ConfigError) -> Self {
        let message = err.to_string();
        match err {
            ConfigError::MissingKey { id } => {
                let ex = ExError::new(ExErrorKind::MissingKey).with_message(message);
                match id {
                    Some(id) => ex.with_key(id),
                    None => ex,
                }
            }
            ConfigError::UnboundRepository { key } => {
                ExError::new(ExErrorKind::UnboundRepository)
                    .with_key(key)
                    .with_message(message)
            }
            ConfigError::UnsupportedCast { key, .. } => ExError::new(ExErrorKind::UnsupportedCast)
                .with_key(key)
                .with_message(message),
            ConfigError::Decryption { .. } => {
                ExError::new(ExErrorKind::Decryption).with_message(message)
            }
            ConfigError::Encryption { .. } => {
                ExError::new(ExErrorKind::Encryption).with_message(message)
            }
            ConfigError::Storage { op, .. } => ExError::new(ExErrorKind::Persistence)
                .with_op(op)
                .with_message(message),
            ConfigError::Validation(_) => {
                ExError::new(ExErrorKind::Validation).with_message(message)
            }
            ConfigError::InvalidRule { .. } => {
                ExError::new(ExErrorKind::InvalidRule).with_message(message)
            }
            ConfigError::Serialization { .. } => {
                ExError::new(ExErrorKind::Serialization).with_message(message)
            }
            ConfigError::InvalidSettings { .. } => {
                ExError::new(ExErrorKind::InvalidSettings).with_message(message)
            }
            ConfigError::Io { op, .. } => ExError::new(ExErrorKind::Io)
                .with_op(op)
                .with_message(message),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Serialization {
            message: err.to_string(),
        }
    }
}
