//! Error types for one-time-code operations.

use thiserror::Error;

/// Error from the email transport collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("email transport failed: {0}")]
pub struct EmailError(pub String);

/// Errors from one-time-code verification and delivery.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OtpError {
    /// Candidate code is malformed (empty or not six digits).
    /// Rejected before any HMAC is computed.
    #[error("one-time code is malformed")]
    InvalidCode,

    /// The user has no secret or the required method is not set up
    #[error("two-factor authentication is not configured")]
    NotConfigured,

    /// A code was sent to this recipient too recently.
    /// Recoverable: the caller waits out the remaining seconds.
    #[error("resend cooldown active: {remaining_secs}s remaining")]
    CooldownActive {
        /// Seconds until another send is allowed
        remaining_secs: u64,
    },

    /// The email collaborator failed to deliver the code
    #[error(transparent)]
    Email(#[from] EmailError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cooldown_reports_remaining_seconds() {
        let err = OtpError::CooldownActive { remaining_secs: 3 };
        assert_eq!(err.to_string(), "resend cooldown active: 3s remaining");
    }
}
