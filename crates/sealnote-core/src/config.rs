//! Master key configuration.
//!
//! The process-wide fallback key arrives as a Base64-encoded 256-bit value
//! at startup. A missing or malformed value is a fatal construction error,
//! never a runtime fallback: a service without its master key cannot decrypt
//! anything sealed under it.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use sealnote_crypto::{DataKey, KEY_SIZE};
use thiserror::Error;

/// Environment variable the master key is read from by default.
pub const MASTER_KEY_ENV: &str = "SEALNOTE_MASTER_KEY";

/// Errors loading the master key at startup.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MasterKeyError {
    /// The configured source had no value
    #[error("master key not provided (expected in {var})")]
    Missing {
        /// Environment variable that was consulted
        var: String,
    },

    /// The value was not valid Base64
    #[error("master key is not valid base64")]
    InvalidBase64,

    /// The decoded value was not 256 bits
    #[error("master key has wrong length: expected {expected} bytes, got {actual}")]
    InvalidLength {
        /// Expected length in bytes
        expected: usize,
        /// Decoded length in bytes
        actual: usize,
    },
}

/// The process-wide master key.
///
/// Loaded once at startup; never persisted, cached, or invalidated.
pub struct MasterKey {
    key: DataKey,
}

impl MasterKey {
    /// Parse a Base64-encoded 256-bit key.
    ///
    /// # Errors
    ///
    /// Returns `InvalidBase64` or `InvalidLength` for malformed input.
    pub fn from_base64(encoded: &str) -> Result<Self, MasterKeyError> {
        let trimmed = encoded.trim();
        if trimmed.is_empty() {
            return Err(MasterKeyError::Missing { var: MASTER_KEY_ENV.to_string() });
        }

        let bytes = BASE64.decode(trimmed).map_err(|_| MasterKeyError::InvalidBase64)?;

        if bytes.len() != KEY_SIZE {
            return Err(MasterKeyError::InvalidLength { expected: KEY_SIZE, actual: bytes.len() });
        }

        let Ok(key) = DataKey::from_bytes(&bytes) else {
            // Length was checked above
            return Err(MasterKeyError::InvalidLength { expected: KEY_SIZE, actual: bytes.len() });
        };

        Ok(Self { key })
    }

    /// Load the key from an environment variable.
    ///
    /// # Errors
    ///
    /// Returns `Missing` if the variable is unset, otherwise the
    /// `from_base64` errors.
    pub fn from_env(var: &str) -> Result<Self, MasterKeyError> {
        let value =
            std::env::var(var).map_err(|_| MasterKeyError::Missing { var: var.to_string() })?;
        Self::from_base64(&value)
    }

    /// The underlying data key.
    pub fn data_key(&self) -> &DataKey {
        &self.key
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey").finish_non_exhaustive()
    }
}
