//! Message lifecycle state machine.
//!
//! ## Architecture
//!
//! ```text
//! caller
//!   ├─ MessageLifecycle (state machine)  ← THIS MODULE
//!   │   ├─ EnvelopeCipher (seal/open, key destruction)
//!   │   ├─ MessageRepository (persistence collaborator)
//!   │   └─ AuditSink (fire-and-forget events)
//!   └─ Sweeper (periodic expiration task)
//! ```
//!
//! ## State machine
//!
//! ```text
//! Active ──mark_read──▶ Read            (non-read-once)
//! Active ──mark_read──▶ Expired         (read-once: key destroyed)
//! Active │ Read ──sweep(now)──▶ Expired (key destroyed, record deleted)
//! Active │ Read ──revoke──▶ Revoked     (terminal, key destroyed)
//! ```
//!
//! Every destructive edge destroys the message's data key exactly once and
//! emits exactly one audit event, even when a read races the sweep. The
//! guard is a per-message in-flight set: a transition that finds the id
//! already claimed observes the message as already gone.

mod memory;
mod sweep;

use std::{
    collections::HashSet,
    sync::{Arc, Mutex, PoisonError},
};

pub use memory::MemoryMessageRepository;
pub use sweep::{Sweeper, SweeperConfig, shutdown_channel};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    audit::{AuditAction, AuditEvent, AuditSink, emit},
    clock::Clock,
    envelope::{Envelope, EnvelopeCipher, EnvelopeError, KeyRepository},
    repository::RepositoryError,
};

/// A stored message and its lifecycle fields.
///
/// Mutated only through the transition methods of [`MessageLifecycle`];
/// never by ad hoc field writes from call sites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Unique message identifier
    pub id: Uuid,
    /// Opaque reference to the sending user
    pub sender: String,
    /// Opaque reference to the receiving user
    pub receiver: String,
    /// Sealed content
    pub envelope: Envelope,
    /// Unix seconds the message was created
    pub created_at: u64,
    /// Whether the content self-destructs on first read
    pub read_once: bool,
    /// Unix seconds of the first successful read; set at most once
    pub read_at: Option<u64>,
    /// Unix seconds after which the sweep reclaims the message;
    /// `None` means no automatic expiration
    pub expires_at: Option<u64>,
    /// Whether an admin revoked the message; never flips back
    pub revoked: bool,
    /// Reason supplied at revocation
    pub revocation_reason: Option<String>,
    /// Actor who revoked the message
    pub revoked_by: Option<String>,
    /// Unix seconds of the revocation
    pub revoked_at: Option<u64>,
}

/// Lifecycle state derived from a message's fields at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageState {
    /// Live and unread
    Active,
    /// Read at least once (non-read-once messages only); non-terminal
    Read,
    /// Past its expiration; awaiting or past the sweep. Terminal.
    Expired,
    /// Revoked by an admin. Terminal.
    Revoked,
}

impl Message {
    /// Derive the lifecycle state at `now`.
    pub fn state(&self, now: u64) -> MessageState {
        if self.revoked {
            MessageState::Revoked
        } else if self.expires_at.is_some_and(|at| at <= now) {
            MessageState::Expired
        } else if self.read_at.is_some() {
            MessageState::Read
        } else {
            MessageState::Active
        }
    }
}

/// Persistence collaborator for messages.
///
/// Implementations typically share internal state via Arc, so clones access
/// the same underlying storage.
pub trait MessageRepository: Clone + Send + Sync + 'static {
    /// Persist a message, overwriting any record with the same id.
    fn save(&self, message: &Message) -> Result<(), RepositoryError>;

    /// Look up a message by id.
    fn find_by_id(&self, id: Uuid) -> Result<Option<Message>, RepositoryError>;

    /// All messages whose `expires_at` is set and `<= ts`.
    fn find_expired_before(&self, ts: u64) -> Result<Vec<Message>, RepositoryError>;

    /// Delete a record. Idempotent; unknown ids are not an error.
    fn delete(&self, id: Uuid) -> Result<(), RepositoryError>;
}

/// Outcome of reading a message's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    /// The decrypted content
    Plaintext(String),
    /// Fixed sentinel: the message was revoked; decryption is not invoked
    Revoked,
    /// The content is no longer available: its key was destroyed
    /// (read-once already consumed, or swept)
    Unavailable,
}

/// Errors from lifecycle transitions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// No such message, or it has already been consumed or swept
    #[error("message not found: {0}")]
    MessageNotFound(Uuid),

    /// The acting user may not perform this transition
    /// (e.g. a non-receiver marking a message read)
    #[error("unauthorized transition on message {message_id}")]
    UnauthorizedTransition {
        /// The message the transition targeted
        message_id: Uuid,
    },

    /// Envelope or key store failure
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    /// Persistence collaborator failure
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Counters from one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Messages expired: key destroyed, audited, record deleted
    pub expired: usize,
    /// Messages skipped because another transition held their guard
    pub skipped: usize,
    /// Messages whose expiration failed; retried on the next pass
    pub failed: usize,
}

/// The message lifecycle state machine.
///
/// Clones share the in-flight guard set, so transition exclusivity holds
/// across clones (the sweeper runs on a clone).
pub struct MessageLifecycle<M, K>
where
    M: MessageRepository,
    K: KeyRepository,
{
    messages: M,
    cipher: Arc<EnvelopeCipher<K>>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    in_flight: Arc<Mutex<HashSet<Uuid>>>,
}

impl<M, K> Clone for MessageLifecycle<M, K>
where
    M: MessageRepository,
    K: KeyRepository,
{
    fn clone(&self) -> Self {
        Self {
            messages: self.messages.clone(),
            cipher: Arc::clone(&self.cipher),
            audit: Arc::clone(&self.audit),
            clock: Arc::clone(&self.clock),
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

/// RAII claim on a message id; released on drop.
struct TransitionGuard {
    set: Arc<Mutex<HashSet<Uuid>>>,
    id: Uuid,
}

impl Drop for TransitionGuard {
    fn drop(&mut self) {
        self.set.lock().unwrap_or_else(PoisonError::into_inner).remove(&self.id);
    }
}

impl<M, K> MessageLifecycle<M, K>
where
    M: MessageRepository,
    K: KeyRepository,
{
    /// Create a lifecycle manager over its collaborators.
    pub fn new(
        messages: M,
        cipher: Arc<EnvelopeCipher<K>>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            messages,
            cipher,
            audit,
            clock,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Store a new message: fresh data key, sealed content, persisted
    /// record. `ttl_secs = None` means no automatic expiration.
    ///
    /// # Errors
    ///
    /// Returns `Envelope` errors from key generation or sealing, and
    /// `Repository` errors from persistence.
    pub fn send(
        &self,
        sender: &str,
        receiver: &str,
        plaintext: &str,
        read_once: bool,
        ttl_secs: Option<u64>,
    ) -> Result<Uuid, LifecycleError> {
        let key_id = self.cipher.generate_key()?;
        let envelope = self.cipher.encrypt(plaintext.as_bytes(), Some(&key_id))?;

        let now = self.clock.unix_seconds();
        let message = Message {
            id: Uuid::new_v4(),
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            envelope,
            created_at: now,
            read_once,
            read_at: None,
            expires_at: ttl_secs.map(|ttl| now.saturating_add(ttl)),
            revoked: false,
            revocation_reason: None,
            revoked_by: None,
            revoked_at: None,
        };

        self.messages.save(&message)?;
        tracing::debug!(message_id = %message.id, read_once, "stored message");
        Ok(message.id)
    }

    /// Read a message's content without transitioning it.
    ///
    /// Revoked messages yield the fixed [`MessageContent::Revoked`]
    /// sentinel without invoking decryption. A destroyed key yields
    /// [`MessageContent::Unavailable`] instead of the raw key error.
    ///
    /// # Errors
    ///
    /// Returns `MessageNotFound` for unknown ids,
    /// `UnauthorizedTransition` if `reader` is neither participant, and
    /// `Envelope(AuthenticationFailed)` for corrupted ciphertext.
    pub fn read(&self, id: Uuid, reader: &str) -> Result<MessageContent, LifecycleError> {
        let message =
            self.messages.find_by_id(id)?.ok_or(LifecycleError::MessageNotFound(id))?;

        if message.receiver != reader && message.sender != reader {
            return Err(LifecycleError::UnauthorizedTransition { message_id: id });
        }

        if message.revoked {
            return Ok(MessageContent::Revoked);
        }

        match self.cipher.decrypt(&message.envelope) {
            Ok(bytes) => {
                let text = String::from_utf8(bytes).map_err(|_| {
                    EnvelopeError::Malformed("message content is not UTF-8".to_string())
                })?;
                Ok(MessageContent::Plaintext(text))
            },
            Err(EnvelopeError::KeyNotFound { .. }) => Ok(MessageContent::Unavailable),
            Err(err) => Err(err.into()),
        }
    }

    /// Mark a message read by its receiver.
    ///
    /// Non-read-once: sets `read_at` (at most once); a repeat call is a
    /// no-op. Read-once: sets `read_at`, expires the message immediately,
    /// destroys its key, and emits one destruction audit event, exactly
    /// once even under concurrent reads or a racing sweep.
    ///
    /// # Errors
    ///
    /// Returns `MessageNotFound` if the message is unknown, already
    /// consumed, swept, or mid-transition elsewhere;
    /// `UnauthorizedTransition` if `reader` is not the receiver.
    pub fn mark_read(&self, id: Uuid, reader: &str) -> Result<(), LifecycleError> {
        let Some(_guard) = self.try_claim(id) else {
            // Another transition owns this message; to this caller it is
            // already gone
            return Err(LifecycleError::MessageNotFound(id));
        };

        let mut message =
            self.messages.find_by_id(id)?.ok_or(LifecycleError::MessageNotFound(id))?;

        if message.receiver != reader {
            return Err(LifecycleError::UnauthorizedTransition { message_id: id });
        }

        let now = self.clock.unix_seconds();
        match message.state(now) {
            MessageState::Expired | MessageState::Revoked => {
                // Terminal; the content is already gone
                return Err(LifecycleError::MessageNotFound(id));
            },
            MessageState::Read => {
                // read_at is set at most once
                return Ok(());
            },
            MessageState::Active => {},
        }

        message.read_at = Some(now);

        if message.read_once {
            message.expires_at = Some(now);
            // Persist the transition before destroying the key: if the
            // destroy fails the sweep retries it (destroy is idempotent)
            self.messages.save(&message)?;
            self.cipher.destroy_key(&message.envelope.key_id)?;
            emit(
                self.audit.as_ref(),
                AuditEvent {
                    actor: Some(reader.to_string()),
                    action: AuditAction::MessageDestroyed,
                    details: format!("read-once message {id} accessed"),
                    at: now,
                },
            );
            tracing::debug!(message_id = %id, "read-once message consumed");
        } else {
            self.messages.save(&message)?;
        }

        Ok(())
    }

    /// Revoke a message. Permanent; re-revoking is a no-op with no second
    /// key destruction or audit event.
    ///
    /// # Errors
    ///
    /// Returns `MessageNotFound` for unknown, expired, or mid-transition
    /// messages. Expired is terminal: a consumed-but-unswept tombstone is
    /// already dead and the sweep will reclaim it.
    pub fn revoke(&self, id: Uuid, actor: &str, reason: &str) -> Result<(), LifecycleError> {
        let Some(_guard) = self.try_claim(id) else {
            return Err(LifecycleError::MessageNotFound(id));
        };

        let mut message =
            self.messages.find_by_id(id)?.ok_or(LifecycleError::MessageNotFound(id))?;

        if message.revoked {
            return Ok(());
        }

        let now = self.clock.unix_seconds();
        if message.state(now) == MessageState::Expired {
            return Err(LifecycleError::MessageNotFound(id));
        }

        message.revoked = true;
        message.revoked_by = Some(actor.to_string());
        message.revoked_at = Some(now);
        message.revocation_reason = Some(reason.to_string());

        self.messages.save(&message)?;
        self.cipher.destroy_key(&message.envelope.key_id)?;

        emit(
            self.audit.as_ref(),
            AuditEvent {
                actor: Some(actor.to_string()),
                action: AuditAction::MessageRevoked,
                details: format!("message {id} revoked: {reason}"),
                at: now,
            },
        );
        tracing::info!(message_id = %id, actor, "message revoked");

        Ok(())
    }

    /// Expire every message whose `expires_at` is at or before `now`.
    ///
    /// Per message: destroy the key, delete the record, then emit one
    /// expiration audit event. Destroy-before-delete, because losing the
    /// key reference first would leak the key material indefinitely; the
    /// event comes last so a failed delete does not report the same
    /// expiration twice across retries. Each message is its own
    /// transaction boundary: one failure is counted and retried next pass
    /// without aborting the rest.
    ///
    /// # Errors
    ///
    /// Returns `Repository` only if the expired-message scan itself fails.
    pub fn sweep(&self, now: u64) -> Result<SweepReport, LifecycleError> {
        let expired = self.messages.find_expired_before(now)?;
        let mut report = SweepReport::default();

        for message in expired {
            let Some(_guard) = self.try_claim(message.id) else {
                // A live read or revocation owns this message; it will be
                // picked up on the next pass if still expired
                report.skipped += 1;
                continue;
            };

            match self.expire_one(&message, now) {
                Ok(()) => report.expired += 1,
                Err(err) => {
                    tracing::warn!(message_id = %message.id, error = %err, "sweep step failed");
                    report.failed += 1;
                },
            }
        }

        if report.expired > 0 || report.failed > 0 {
            tracing::debug!(
                expired = report.expired,
                skipped = report.skipped,
                failed = report.failed,
                "sweep pass complete"
            );
        }

        Ok(report)
    }

    fn expire_one(&self, message: &Message, now: u64) -> Result<(), LifecycleError> {
        self.cipher.destroy_key(&message.envelope.key_id)?;
        self.messages.delete(message.id)?;

        emit(
            self.audit.as_ref(),
            AuditEvent {
                actor: None,
                action: AuditAction::MessageExpired,
                details: format!(
                    "message {} from {} to {} expired and was deleted",
                    message.id, message.sender, message.receiver
                ),
                at: now,
            },
        );

        Ok(())
    }

    fn try_claim(&self, id: Uuid) -> Option<TransitionGuard> {
        let mut set = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if set.insert(id) {
            Some(TransitionGuard { set: Arc::clone(&self.in_flight), id })
        } else {
            None
        }
    }
}
