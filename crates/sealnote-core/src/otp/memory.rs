//! In-memory email transport for testing and simulation.

use std::sync::{Arc, Mutex, PoisonError};

use super::{EmailTransport, error::EmailError};

/// One delivered email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    /// Recipient address
    pub to: String,
    /// Subject line
    pub subject: String,
    /// Message body
    pub body: String,
}

/// In-memory email transport that records deliveries.
///
/// Clones share the same outbox.
#[derive(Clone, Default)]
pub struct MemoryEmailTransport {
    inner: Arc<Mutex<MemoryEmailInner>>,
}

#[derive(Default)]
struct MemoryEmailInner {
    sent: Vec<SentEmail>,
    failing: bool,
}

impl MemoryEmailTransport {
    /// Create a new transport with an empty outbox.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything delivered so far.
    pub fn sent(&self) -> Vec<SentEmail> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).sent.clone()
    }

    /// Make subsequent sends fail (simulates a down mail server).
    pub fn set_failing(&self, failing: bool) {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).failing = failing;
    }
}

impl EmailTransport for MemoryEmailTransport {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), EmailError> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.failing {
            return Err(EmailError("mail server marked failing".to_string()));
        }
        inner.sent.push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_sent_mail() {
        let transport = MemoryEmailTransport::new();

        transport.send("bob@example.com", "hi", "body").unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "bob@example.com");
    }

    #[test]
    fn failing_transport_returns_error() {
        let transport = MemoryEmailTransport::new();
        transport.set_failing(true);

        assert!(transport.send("bob@example.com", "hi", "body").is_err());
        assert!(transport.sent().is_empty());
    }
}
