//! Sealnote core services
//!
//! Three collaborating services make up the core of the Sealnote ephemeral
//! messaging system:
//!
//! - [`envelope`]: per-message envelope encryption. A key store (in-memory
//!   cache in front of a persistence collaborator) hands out fresh 256-bit
//!   data keys; the cipher seals and opens message content with AES-256-GCM
//!   and destroys keys when a message dies.
//! - [`lifecycle`]: the message state machine. Read-once consumption,
//!   time-based expiration (with a periodic background sweep), and admin
//!   revocation. Every destructive transition destroys the message's data
//!   key exactly once and emits an audit event.
//! - [`otp`]: time-based one-time codes for the login second factor, with
//!   an email-delivered variant guarded by a per-recipient resend cooldown.
//!
//! ```text
//! caller ──▶ EnvelopeCipher ──▶ KeyStore ──▶ KeyRepository
//!                 │
//!                 ▼ envelope {key_id, iv, ciphertext}
//!           MessageLifecycle ──▶ MessageRepository
//!                 │                    ▲
//!                 ▼ destroy key        │ periodic
//!             AuditSink           Sweeper task
//! ```
//!
//! External collaborators (persistence, email, audit) are consumed through
//! narrow traits; in-memory implementations ship for tests and simulation.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod audit;
pub mod clock;
pub mod config;
pub mod envelope;
pub mod lifecycle;
pub mod otp;
pub mod repository;

pub use audit::{AuditAction, AuditEvent, AuditSink, MemoryAuditSink, TracingAuditSink};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{MasterKey, MasterKeyError};
pub use envelope::{
    Envelope, EnvelopeCipher, EnvelopeError, KeyRecord, KeyRepository, KeyStore,
    MASTER_KEY_ID, MemoryKeyRepository,
};
pub use lifecycle::{
    LifecycleError, Message, MessageContent, MessageLifecycle, MessageRepository, MessageState,
    MemoryMessageRepository, SweepReport, Sweeper, SweeperConfig, shutdown_channel,
};
pub use otp::{
    EmailError, EmailTransport, MemoryEmailTransport, OneTimeCodeVerifier, OtpError,
    TwoFactorCredential, TwoFactorMethod, VerifierConfig,
};
pub use repository::RepositoryError;
