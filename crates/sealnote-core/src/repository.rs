//! Errors surfaced by persistence collaborators.

use thiserror::Error;

/// Errors from persistence collaborators (key and message repositories).
///
/// The core treats the repositories as opaque; failures are carried as
/// strings the way the underlying store reported them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// Underlying store unavailable or failed (connection, I/O, timeout)
    #[error("repository I/O error: {0}")]
    Io(String),

    /// Stored data could not be decoded (corrupt base64, wrong length)
    #[error("corrupt repository record: {0}")]
    Corrupt(String),
}
