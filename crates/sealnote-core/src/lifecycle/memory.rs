//! In-memory message repository for testing and simulation.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use uuid::Uuid;

use super::{Message, MessageRepository};
use crate::repository::RepositoryError;

/// In-memory message repository.
///
/// Clones share the same records via `Arc<Mutex<_>>`.
#[derive(Clone, Default)]
pub struct MemoryMessageRepository {
    inner: Arc<Mutex<MemoryMessageInner>>,
}

#[derive(Default)]
struct MemoryMessageInner {
    messages: HashMap<Uuid, Message>,
    failing: bool,
}

impl MemoryMessageRepository {
    /// Create a new empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent operations fail (simulates an unavailable store).
    pub fn set_failing(&self, failing: bool) {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).failing = failing;
    }

    /// Number of stored messages.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).messages.len()
    }

    /// Whether the repository holds no messages.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MessageRepository for MemoryMessageRepository {
    fn save(&self, message: &Message) -> Result<(), RepositoryError> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.failing {
            return Err(RepositoryError::Io("message repository marked failing".to_string()));
        }
        inner.messages.insert(message.id, message.clone());
        Ok(())
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<Message>, RepositoryError> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.failing {
            return Err(RepositoryError::Io("message repository marked failing".to_string()));
        }
        Ok(inner.messages.get(&id).cloned())
    }

    fn find_expired_before(&self, ts: u64) -> Result<Vec<Message>, RepositoryError> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.failing {
            return Err(RepositoryError::Io("message repository marked failing".to_string()));
        }
        Ok(inner
            .messages
            .values()
            .filter(|message| message.expires_at.is_some_and(|at| at <= ts))
            .cloned()
            .collect())
    }

    fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.failing {
            return Err(RepositoryError::Io("message repository marked failing".to_string()));
        }
        inner.messages.remove(&id);
        Ok(())
    }
}
