//! Redaction wrapper for secret material
//!
//! Cipher keys and decrypted config values pass through `Debug` impls of
//! items, settings and errors. Wrapping them in `Sensitive<T>` keeps them out
//! of logs.

use std::fmt;

const REDACTED: &str = "***REDACTED***";

/// Wrapper that redacts its content in `Debug` and `Display`
///
/// # Example
///
/// ```
/// use confx_core_types::Sensitive;
///
/// let key = Sensitive::new([7u8; 32]);
/// assert_eq!(format!("{:?}", key), "***REDACTED***");
/// assert_eq!(key.expose()[0], 7);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Sensitive<T>(T);

impl<T> Sensitive<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Borrow the secret. Keep the borrow short and never log it.
    pub fn expose(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> From<T> for Sensitive<T> {
    fn from(value: T) -> Self {
        Self(value)
    }
}

impl<T> fmt::Debug for Sensitive<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl<T> fmt::Display for Sensitive<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}
