//! Sealnote Cryptographic Primitives
//!
//! Cryptographic building blocks for Sealnote. Pure functions with
//! deterministic outputs. Callers provide random bytes (keys, IVs) for
//! deterministic testing.
//!
//! # Envelope Encryption
//!
//! Every message is sealed under its own 256-bit data key with AES-256-GCM.
//! Destroying the data key makes that message's ciphertext permanently
//! unrecoverable, giving forward secrecy at message granularity without a
//! key per session.
//!
//! ```text
//! Data Key (per message, 32 random bytes)
//!        │
//!        ▼
//! AES-256-GCM seal (fresh 12-byte IV per call)
//!        │
//!        ▼
//! Ciphertext ‖ 16-byte authentication tag
//! ```
//!
//! # Security
//!
//! - IVs MUST be unique per key; reuse breaks GCM's authentication guarantee
//! - Failed authentication tag -> reject ciphertext, never partial plaintext
//! - Key material is zeroized on drop
//!
//! # One-Time Codes
//!
//! HMAC-SHA1 counter-based codes per RFC 4226 with the standard 30-second
//! time step (RFC 6238). Code comparison is constant-time.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod envelope;
pub mod error;
pub mod otp;

pub use envelope::{DataKey, IV_SIZE, KEY_SIZE, TAG_SIZE, open, seal};
pub use error::CryptoError;
pub use otp::{
    CODE_DIGITS, SECRET_SIZE, TIME_STEP_SECS, base32_encode, code_matches, hotp,
    provisioning_uri, time_counter,
};
