//! Error types for envelope encryption operations.

use thiserror::Error;

use crate::repository::RepositoryError;

/// Errors from key store and envelope cipher operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    /// The requested key is absent or has been destroyed.
    ///
    /// Permanent: a destroyed key is never reactivated, so callers must not
    /// retry. Distinguishable from `AuthenticationFailed` so boundaries can
    /// show "no longer available" instead of "corrupted".
    #[error("key not found: {key_id}")]
    KeyNotFound {
        /// The key identifier that failed to resolve
        key_id: String,
    },

    /// Authentication tag did not verify (tampered ciphertext, wrong key,
    /// or wrong IV). Permanent; never retried.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Fresh key material could not be generated or persisted.
    /// Fatal to the calling operation; not retried.
    #[error("key generation failed: {0}")]
    KeyGenerationFailed(String),

    /// A stored envelope or key record could not be decoded
    #[error("malformed envelope data: {0}")]
    Malformed(String),

    /// Persistence collaborator failure
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sealnote_crypto::CryptoError> for EnvelopeError {
    fn from(err: sealnote_crypto::CryptoError) -> Self {
        match err {
            sealnote_crypto::CryptoError::AuthenticationFailed => Self::AuthenticationFailed,
            other => Self::Malformed(other.to_string()),
        }
    }
}
