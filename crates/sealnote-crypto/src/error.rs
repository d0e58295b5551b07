//! Error types for cryptographic operations

use thiserror::Error;

/// Errors from envelope encryption primitives
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Authentication tag did not verify (tampered ciphertext, wrong key,
    /// or wrong IV). Deliberately carries no detail: GCM cannot distinguish
    /// the causes and callers must not retry.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Key material has the wrong length
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected key length in bytes
        expected: usize,
        /// Actual key length in bytes
        actual: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CryptoError::InvalidKeyLength { expected: 32, actual: 16 };
        assert_eq!(err.to_string(), "invalid key length: expected 32, got 16");
    }

    #[test]
    fn authentication_failure_carries_no_detail() {
        assert_eq!(CryptoError::AuthenticationFailed.to_string(), "authentication failed");
    }
}
