//! In-memory key repository for testing and simulation.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use super::keystore::{KeyRecord, KeyRepository};
use crate::repository::RepositoryError;

/// In-memory key repository.
///
/// All state is behind `Arc<Mutex<_>>` so clones share the same records,
/// matching the sharing semantics of a real database-backed implementation.
#[derive(Clone, Default)]
pub struct MemoryKeyRepository {
    inner: Arc<Mutex<MemoryKeyInner>>,
}

#[derive(Default)]
struct MemoryKeyInner {
    records: HashMap<String, KeyRecord>,
    failing: bool,
}

impl MemoryKeyRepository {
    /// Create a new empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent operations fail (simulates an unavailable store).
    pub fn set_failing(&self, failing: bool) {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).failing = failing;
    }

    /// Raw record lookup ignoring the active flag. Test observability only.
    pub fn record(&self, key_id: &str) -> Option<KeyRecord> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).records.get(key_id).cloned()
    }

    /// Number of stored records, active or not.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).records.len()
    }

    /// Whether the repository holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyRepository for MemoryKeyRepository {
    fn save(&self, record: &KeyRecord) -> Result<(), RepositoryError> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.failing {
            return Err(RepositoryError::Io("key repository marked failing".to_string()));
        }
        inner.records.insert(record.key_id.clone(), record.clone());
        Ok(())
    }

    fn find_active(&self, key_id: &str) -> Result<Option<KeyRecord>, RepositoryError> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.failing {
            return Err(RepositoryError::Io("key repository marked failing".to_string()));
        }
        Ok(inner.records.get(key_id).filter(|record| record.active).cloned())
    }

    fn mark_inactive(&self, key_id: &str) -> Result<(), RepositoryError> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.failing {
            return Err(RepositoryError::Io("key repository marked failing".to_string()));
        }
        if let Some(record) = inner.records.get_mut(key_id) {
            record.active = false;
        }
        Ok(())
    }
}
