//! Audit trail collaborator.
//!
//! The core emits structured events at every destructive transition (key
//! destruction, expiration, revocation). The sink is fire-and-forget: a
//! failing sink is logged locally and ignored, and must never cause a
//! transition to fail or roll back.

use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;

/// Action recorded by an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    /// A read-once message was consumed and its key destroyed
    MessageDestroyed,
    /// An expired message was swept and deleted
    MessageExpired,
    /// An admin revoked a message
    MessageRevoked,
}

impl AuditAction {
    /// Stable wire name of the action.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MessageDestroyed => "MESSAGE_DESTROYED",
            Self::MessageExpired => "MESSAGE_EXPIRED",
            Self::MessageRevoked => "MESSAGE_REVOKED",
        }
    }
}

/// A single structured audit event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    /// Acting user, when the action has one (revocations)
    pub actor: Option<String>,
    /// What happened
    pub action: AuditAction,
    /// Human-readable detail line
    pub details: String,
    /// Unix seconds when the event occurred
    pub at: u64,
}

/// Error from an audit sink.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("audit sink unavailable: {0}")]
pub struct AuditError(pub String);

/// Destination for audit events.
///
/// Implementations typically forward to durable storage; the core never
/// blocks on or fails because of them.
pub trait AuditSink: Send + Sync + 'static {
    /// Record one event.
    fn record(&self, event: AuditEvent) -> Result<(), AuditError>;
}

/// Record an event, logging and swallowing sink failures.
pub(crate) fn emit(sink: &dyn AuditSink, event: AuditEvent) {
    let action = event.action.as_str();
    if let Err(err) = sink.record(event) {
        tracing::warn!(action, error = %err, "audit sink failed; continuing");
    }
}

/// Sink that writes events to the `tracing` log stream.
#[derive(Clone, Default)]
pub struct TracingAuditSink;

impl TracingAuditSink {
    /// Create a new tracing-backed sink.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        tracing::info!(
            action = event.action.as_str(),
            actor = event.actor.as_deref(),
            at = event.at,
            details = %event.details,
            "audit"
        );
        Ok(())
    }
}

/// In-memory sink for tests and simulation.
///
/// Clones share the same event list.
#[derive(Clone, Default)]
pub struct MemoryAuditSink {
    inner: Arc<Mutex<MemorySinkInner>>,
}

#[derive(Default)]
struct MemorySinkInner {
    events: Vec<AuditEvent>,
    failing: bool,
}

impl MemoryAuditSink {
    /// Create a new empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded events.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).events.clone()
    }

    /// Events with the given action.
    pub fn events_with_action(&self, action: AuditAction) -> Vec<AuditEvent> {
        self.events().into_iter().filter(|event| event.action == action).collect()
    }

    /// Make subsequent `record` calls fail (simulates a down sink).
    pub fn set_failing(&self, failing: bool) {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).failing = failing;
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.failing {
            return Err(AuditError("sink marked failing".to_string()));
        }
        inner.events.push(event);
        Ok(())
    }
}
