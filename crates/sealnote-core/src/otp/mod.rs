//! One-time-code verification for the login second factor.
//!
//! Codes are standard 6-digit TOTP values (30-second steps) derived from a
//! per-user 160-bit secret. Two delivery methods exist: an authenticator
//! app provisioned through an `otpauth://` URI, and email delivery of the
//! current code guarded by a per-recipient resend cooldown enforced
//! server-side regardless of client retries.
//!
//! Verification accepts a candidate that matches any step in a ±3 window
//! (±90 seconds) around the current time counter, tolerating clock skew.
//! All seven offsets are always evaluated and compared in constant time,
//! so timing does not leak which offset matched.

mod error;
mod memory;

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

pub use error::{EmailError, OtpError};
pub use memory::{MemoryEmailTransport, SentEmail};
use rand::RngCore;
use sealnote_crypto::{
    CODE_DIGITS, SECRET_SIZE, base32_encode, code_matches, hotp, provisioning_uri, time_counter,
};

use crate::clock::Clock;

/// How a user receives one-time codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TwoFactorMethod {
    /// Authenticator app (provisioned once via URI/QR)
    Totp,
    /// Current code delivered by email on demand
    Email,
}

/// The second-factor fields of a user record.
///
/// The user record itself is owned by an external collaborator; the core
/// only reads and writes these three fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwoFactorCredential {
    /// Shared secret (160 bits); `None` until set up
    pub secret: Option<Vec<u8>>,
    /// Configured delivery method
    pub method: Option<TwoFactorMethod>,
    /// Whether the second factor is active for this user
    pub enabled: bool,
}

/// Email delivery collaborator.
///
/// No retry in the core; failure surfaces to the caller.
pub trait EmailTransport: Send + Sync + 'static {
    /// Deliver one message.
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), EmailError>;
}

/// Verifier tuning.
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Accepted window around the current time counter, in steps
    pub window: i64,
    /// Minimum seconds between email codes per recipient
    pub resend_cooldown_secs: u64,
    /// Issuer name used in provisioning URIs and email subjects
    pub issuer: String,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self { window: 3, resend_cooldown_secs: 5, issuer: "Sealnote".to_string() }
    }
}

/// Derives, delivers, and validates time-based one-time codes.
pub struct OneTimeCodeVerifier<T>
where
    T: EmailTransport,
{
    email: T,
    clock: Arc<dyn Clock>,
    config: VerifierConfig,
    /// Last send time per recipient; check-then-set happens atomically
    /// under one lock so concurrent resends cannot both pass the cooldown
    last_sent: Mutex<HashMap<String, u64>>,
}

impl<T> OneTimeCodeVerifier<T>
where
    T: EmailTransport,
{
    /// Create a verifier over an email transport.
    pub fn new(email: T, clock: Arc<dyn Clock>, config: VerifierConfig) -> Self {
        Self { email, clock, config, last_sent: Mutex::new(HashMap::new()) }
    }

    /// Generate a fresh 160-bit shared secret.
    pub fn generate_secret(&self) -> Vec<u8> {
        let mut secret = vec![0u8; SECRET_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut secret);
        secret
    }

    /// Set up the second factor: fresh secret, method recorded, enabled.
    /// For the email method the first code is delivered immediately.
    ///
    /// # Errors
    ///
    /// Returns `Email` if the initial delivery fails; the credential is
    /// not returned in that case so callers do not persist a half-working
    /// setup.
    pub fn setup(
        &self,
        method: TwoFactorMethod,
        recipient: &str,
    ) -> Result<TwoFactorCredential, OtpError> {
        let credential = TwoFactorCredential {
            secret: Some(self.generate_secret()),
            method: Some(method),
            enabled: true,
        };

        if method == TwoFactorMethod::Email {
            self.send_email_code(&credential, recipient)?;
        }

        Ok(credential)
    }

    /// Verify a candidate code against the credential's secret.
    ///
    /// Returns `Ok(true)` iff the candidate matches some step in the
    /// accepted window. All offsets are evaluated unconditionally.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCode` for malformed candidates (before computing
    /// any HMAC) and `NotConfigured` if the credential has no secret.
    pub fn verify(
        &self,
        credential: &TwoFactorCredential,
        candidate: &str,
    ) -> Result<bool, OtpError> {
        let secret = credential
            .secret
            .as_deref()
            .filter(|secret| !secret.is_empty())
            .ok_or(OtpError::NotConfigured)?;

        if candidate.len() != CODE_DIGITS || !candidate.bytes().all(|b| b.is_ascii_digit()) {
            return Err(OtpError::InvalidCode);
        }

        let counter = time_counter(self.clock.unix_seconds());

        // Evaluate every offset; accumulate without short-circuiting
        let mut matched = false;
        for offset in -self.config.window..=self.config.window {
            let code = hotp(secret, counter.wrapping_add_signed(offset));
            matched |= code_matches(candidate, &code);
        }

        Ok(matched)
    }

    /// The code for the current time step. Used for email delivery.
    ///
    /// # Errors
    ///
    /// Returns `NotConfigured` if the credential has no secret.
    pub fn current_code(&self, credential: &TwoFactorCredential) -> Result<String, OtpError> {
        let secret = credential
            .secret
            .as_deref()
            .filter(|secret| !secret.is_empty())
            .ok_or(OtpError::NotConfigured)?;

        Ok(hotp(secret, time_counter(self.clock.unix_seconds())))
    }

    /// Email the current code to `recipient`, enforcing the per-recipient
    /// resend cooldown.
    ///
    /// # Errors
    ///
    /// Returns `NotConfigured` unless the credential has a secret and the
    /// email method; `CooldownActive` if a code went out too recently
    /// (enforced server-side regardless of client retries); `Email` if
    /// the transport fails (the cooldown slot is released so the caller
    /// may retry).
    pub fn send_email_code(
        &self,
        credential: &TwoFactorCredential,
        recipient: &str,
    ) -> Result<(), OtpError> {
        if credential.method != Some(TwoFactorMethod::Email) {
            return Err(OtpError::NotConfigured);
        }

        let code = self.current_code(credential)?;
        let now = self.clock.unix_seconds();

        // Atomic check-then-set: reserve the slot before sending so a
        // concurrent resend cannot also pass the cooldown check
        let previous = {
            let mut last_sent = self.last_sent.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(&prev) = last_sent.get(recipient) {
                let elapsed = now.saturating_sub(prev);
                if elapsed < self.config.resend_cooldown_secs {
                    let remaining = self.config.resend_cooldown_secs - elapsed;
                    tracing::debug!(recipient, remaining, "resend cooldown active");
                    return Err(OtpError::CooldownActive { remaining_secs: remaining });
                }
            }
            last_sent.insert(recipient.to_string(), now)
        };

        let subject = format!("Your {} verification code", self.config.issuer);
        let body = format!(
            "Your verification code is: {code}\n\
             This code expires in 30 seconds.\n\n\
             Do not share this code with anyone, including {} support.",
            self.config.issuer
        );

        if let Err(err) = self.email.send(recipient, &subject, &body) {
            // Release the reservation so the caller may retry, unless a
            // later send already overwrote it
            let mut last_sent = self.last_sent.lock().unwrap_or_else(PoisonError::into_inner);
            if last_sent.get(recipient) == Some(&now) {
                match previous {
                    Some(prev) => {
                        last_sent.insert(recipient.to_string(), prev);
                    },
                    None => {
                        last_sent.remove(recipient);
                    },
                }
            }
            return Err(err.into());
        }

        tracing::info!(recipient, "verification code sent");
        Ok(())
    }

    /// Provisioning URI for authenticator apps.
    ///
    /// # Errors
    ///
    /// Returns `NotConfigured` if the credential has no secret.
    pub fn provisioning_uri(
        &self,
        credential: &TwoFactorCredential,
        account: &str,
    ) -> Result<String, OtpError> {
        let secret = credential.secret.as_deref().ok_or(OtpError::NotConfigured)?;
        Ok(provisioning_uri(secret, account, &self.config.issuer))
    }

    /// Generate a 10-character uppercase recovery code.
    pub fn generate_backup_code(&self) -> String {
        let mut bytes = [0u8; 8];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        base32_encode(&bytes).chars().take(10).collect()
    }
}
