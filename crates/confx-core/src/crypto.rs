//! Encryption at rest for item values
//!
//! Items flagged `encrypt` hand their serialized string to an `Encrypter`
//! before it reaches storage. `ChaChaEncrypter` is the built-in cipher:
//! ChaCha20-Poly1305 with a random nonce per value, wrapped in a
//! self-describing envelope:
//!
//! ```text
//! enc:v1:<key_id>:<nonce_b64>:<ciphertext_b64>
//! ```

use std::fmt;

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use chacha20poly1305::aead::{Aead, AeadCore, OsRng};
use chacha20poly1305::{ChaCha20Poly1305, KeyInit, Nonce};
use confx_core_types::Sensitive;

use crate::errors::{ConfigError, Result};

const ENVELOPE_PREFIX: &str = "enc:v1:";
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// Symmetric string cipher
pub trait Encrypter: Send + Sync {
    /// # Errors
    ///
    /// Returns `Encryption` if the cipher cannot be initialised or fails.
    fn encrypt_string(&self, plaintext: &str) -> Result<String>;

    /// # Errors
    ///
    /// Returns `Decryption` for anything that is not a ciphertext produced
    /// with this cipher's key.
    fn decrypt_string(&self, ciphertext: &str) -> Result<String>;
}

/// ChaCha20-Poly1305 encrypter
#[derive(Clone)]
pub struct ChaChaEncrypter {
    key_id: String,
    key: Sensitive<[u8; KEY_LEN]>,
}

impl ChaChaEncrypter {
    pub fn new(key_id: impl Into<String>, key: [u8; KEY_LEN]) -> Self {
        Self {
            key_id: key_id.into(),
            key: Sensitive::new(key),
        }
    }

    /// Build from a base64 key (URL-safe without padding, or standard)
    ///
    /// # Errors
    ///
    /// Returns `InvalidSettings` if the text is not base64 or does not decode
    /// to 32 bytes.
    pub fn from_base64(key_id: impl Into<String>, encoded: &str) -> Result<Self> {
        let encoded = encoded.trim();
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded.as_bytes())
            .or_else(|_| STANDARD.decode(encoded.as_bytes()))
            .map_err(|error| ConfigError::InvalidSettings {
                message: format!("encryption key is not valid base64: {error}"),
            })?;

        let key: [u8; KEY_LEN] =
            bytes
                .as_slice()
                .try_into()
                .map_err(|_| ConfigError::InvalidSettings {
                    message: format!(
                        "encryption key must be {KEY_LEN} bytes, got {}",
                        bytes.len()
                    ),
                })?;
        Ok(Self::new(key_id, key))
    }

    /// Build from a base64 key held in environment variable `var`
    ///
    /// # Errors
    ///
    /// Returns `InvalidSettings` if the variable is unset, empty or invalid.
    pub fn from_env(var: &str, key_id: impl Into<String>) -> Result<Self> {
        let encoded = std::env::var(var)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| ConfigError::InvalidSettings {
                message: format!("environment variable {var} holds no encryption key"),
            })?;
        Self::from_base64(key_id, &encoded)
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    fn cipher(&self) -> std::result::Result<ChaCha20Poly1305, String> {
        ChaCha20Poly1305::new_from_slice(self.key.expose()).map_err(|error| error.to_string())
    }
}

impl fmt::Debug for ChaChaEncrypter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChaChaEncrypter")
            .field("key_id", &self.key_id)
            .field("key", &self.key)
            .finish()
    }
}

fn decryption_error(message: impl Into<String>) -> ConfigError {
    ConfigError::Decryption {
        message: message.into(),
    }
}

impl Encrypter for ChaChaEncrypter {
    fn encrypt_string(&self, plaintext: &str) -> Result<String> {
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);

        let aead = self.cipher().map_err(|message| ConfigError::Encryption {
            message: format!("failed to initialize cipher: {message}"),
        })?;
        let ciphertext =
            aead.encrypt(&nonce, plaintext.as_bytes())
                .map_err(|error| ConfigError::Encryption {
                    message: error.to_string(),
                })?;

        Ok(format!(
            "{ENVELOPE_PREFIX}{}:{}:{}",
            self.key_id,
            URL_SAFE_NO_PAD.encode(nonce.as_slice()),
            URL_SAFE_NO_PAD.encode(ciphertext)
        ))
    }

    fn decrypt_string(&self, stored: &str) -> Result<String> {
        let envelope = stored
            .strip_prefix(ENVELOPE_PREFIX)
            .ok_or_else(|| decryption_error("value is not an encrypted envelope"))?;

        let mut parts = envelope.split(':');
        let (Some(key_id), Some(nonce_b64), Some(ciphertext_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(decryption_error("encrypted envelope is malformed"));
        };

        if key_id != self.key_id {
            return Err(decryption_error(format!(
                "encryption key id {key_id} is not configured"
            )));
        }

        let nonce_raw = URL_SAFE_NO_PAD
            .decode(nonce_b64.as_bytes())
            .map_err(|error| decryption_error(format!("failed to decode nonce: {error}")))?;
        if nonce_raw.len() != NONCE_LEN {
            return Err(decryption_error("nonce length is invalid"));
        }
        let ciphertext = URL_SAFE_NO_PAD
            .decode(ciphertext_b64.as_bytes())
            .map_err(|error| decryption_error(format!("failed to decode payload: {error}")))?;

        let aead = self.cipher().map_err(decryption_error)?;
        let plaintext = aead
            .decrypt(Nonce::from_slice(&nonce_raw), ciphertext.as_ref())
            .map_err(|_| decryption_error("authentication failed"))?;

        String::from_utf8(plaintext)
            .map_err(|error| decryption_error(format!("plaintext is not utf8: {error}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encrypter(key_id: &str, byte: u8) -> ChaChaEncrypter {
        ChaChaEncrypter::new(key_id, [byte; KEY_LEN])
    }

    #[test]
    fn test_ciphertext_is_enveloped_and_randomized() {
        let enc = encrypter("k1", 7);
        let first = enc.encrypt_string("s3cret").unwrap();
        let second = enc.encrypt_string("s3cret").unwrap();

        assert!(first.starts_with("enc:v1:k1:"));
        assert_ne!(first, second);
        assert_eq!(enc.decrypt_string(&first).unwrap(), "s3cret");
        assert_eq!(enc.decrypt_string(&second).unwrap(), "s3cret");
    }

    fn nonce_of(stored: &str) -> Vec<u8> {
        let nonce_b64 = stored.split(':').nth(3).unwrap();
        URL_SAFE_NO_PAD.decode(nonce_b64).unwrap()
    }

    #[test]
    fn test_nonce_uses_every_bit() {
        let enc = encrypter("k1", 7);
        let nonces: Vec<Vec<u8>> = (0..64)
            .map(|_| nonce_of(&enc.encrypt_string("s3cret").unwrap()))
            .collect();

        assert!(nonces.iter().all(|n| n.len() == NONCE_LEN));
        // Byte 6 would always carry a fixed version nibble if nonces were
        // cut from UUIDs, and byte 8 fixed variant bits
        assert!(nonces.iter().any(|n| n[6] >> 4 != 0x4));
        assert!(nonces.iter().any(|n| n[8] >> 6 != 0b10));
    }

    #[test]
    fn test_plaintext_is_not_accepted() {
        let err = encrypter("k1", 7).decrypt_string("s3cret").unwrap_err();
        assert!(matches!(err, ConfigError::Decryption { .. }));
    }

    #[test]
    fn test_wrong_key_fails_authentication() {
        let stored = encrypter("k1", 7).encrypt_string("s3cret").unwrap();
        let err = encrypter("k1", 8).decrypt_string(&stored).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Decryption {
                message: "authentication failed".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_key_id_rejected() {
        let stored = encrypter("old", 7).encrypt_string("s3cret").unwrap();
        let err = encrypter("new", 7).decrypt_string(&stored).unwrap_err();
        assert!(err.to_string().contains("old"));
    }

    #[test]
    fn test_from_base64_accepts_both_alphabets() {
        let key = [3u8; KEY_LEN];
        let url = URL_SAFE_NO_PAD.encode(key);
        let std = STANDARD.encode(key);

        let a = ChaChaEncrypter::from_base64("k", &url).unwrap();
        let b = ChaChaEncrypter::from_base64("k", &std).unwrap();
        let stored = a.encrypt_string("x").unwrap();
        assert_eq!(b.decrypt_string(&stored).unwrap(), "x");
    }

    #[test]
    fn test_from_base64_rejects_short_key() {
        let short = URL_SAFE_NO_PAD.encode([1u8; 16]);
        assert!(matches!(
            ChaChaEncrypter::from_base64("k", &short),
            Err(ConfigError::InvalidSettings { .. })
        ));
    }

    #[test]
    fn test_debug_redacts_key() {
        let text = format!("{:?}", encrypter("k1", 9));
        assert!(text.contains("REDACTED"));
        assert!(!text.contains("9, 9"));
    }
}
