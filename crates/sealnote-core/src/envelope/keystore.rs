//! Durable key store with an in-memory cache.
//!
//! Maps opaque key identifiers to 256-bit data keys. The cache is purely a
//! latency optimization and never the source of truth: every generated or
//! destroyed key's state change is durably recorded in the repository
//! before the cache is touched.

use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::RngCore;
use sealnote_crypto::{DataKey, KEY_SIZE};
use uuid::Uuid;
use zeroize::Zeroize;

use super::error::EnvelopeError;
use crate::repository::RepositoryError;

/// A persisted key record.
///
/// `active = false` is logical deletion: ciphertexts issued under the key
/// stay auditable, but the key must never resolve again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRecord {
    /// Opaque key identifier
    pub key_id: String,
    /// Base64-encoded 256-bit key material
    pub key_material: String,
    /// False once the key has been destroyed; never flips back
    pub active: bool,
}

/// Persistence collaborator for key records.
///
/// Implementations typically share internal state via Arc, so clones access
/// the same underlying storage.
pub trait KeyRepository: Clone + Send + Sync + 'static {
    /// Persist a new active key record.
    fn save(&self, record: &KeyRecord) -> Result<(), RepositoryError>;

    /// Look up a record by id, returning it only while active.
    fn find_active(&self, key_id: &str) -> Result<Option<KeyRecord>, RepositoryError>;

    /// Flip a record to inactive. Idempotent; unknown ids are not an error.
    fn mark_inactive(&self, key_id: &str) -> Result<(), RepositoryError>;
}

/// Key store: repository-backed with a concurrent read cache.
///
/// Clones share the same cache.
pub struct KeyStore<R>
where
    R: KeyRepository,
{
    repo: R,
    cache: Arc<RwLock<HashMap<String, DataKey>>>,
}

impl<R> Clone for KeyStore<R>
where
    R: KeyRepository,
{
    fn clone(&self) -> Self {
        Self { repo: self.repo.clone(), cache: Arc::clone(&self.cache) }
    }
}

impl<R> KeyStore<R>
where
    R: KeyRepository,
{
    /// Create a key store over a repository.
    pub fn new(repo: R) -> Self {
        Self { repo, cache: Arc::new(RwLock::new(HashMap::new())) }
    }

    /// Generate and persist a fresh 256-bit key, returning its identifier.
    ///
    /// Identifiers are UUIDv4 (122 random bits), so collisions are not a
    /// practical concern. Persist-then-cache ordering keeps the repository
    /// the source of truth.
    ///
    /// # Errors
    ///
    /// Returns `KeyGenerationFailed` if the repository rejects the record.
    pub fn generate(&self) -> Result<String, EnvelopeError> {
        let mut material = [0u8; KEY_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut material);

        let Ok(key) = DataKey::from_bytes(&material) else {
            unreachable!("material buffer is exactly KEY_SIZE bytes");
        };
        material.zeroize();

        let key_id = Uuid::new_v4().to_string();
        let record = KeyRecord {
            key_id: key_id.clone(),
            key_material: BASE64.encode(key.as_bytes()),
            active: true,
        };

        self.repo
            .save(&record)
            .map_err(|err| EnvelopeError::KeyGenerationFailed(err.to_string()))?;

        self.cache_insert(key_id.clone(), key);

        tracing::debug!(key_id = %key_id, "generated data key");
        Ok(key_id)
    }

    /// Resolve a key id to its material, cache first then repository.
    ///
    /// The repository hit is re-validated after the cache insert: a destroy
    /// that lands between the lookup and the insert has already evicted the
    /// cache, so an unvalidated insert would leave the dead key servable
    /// forever. The re-check sees the destroy's mark-inactive (which
    /// happens before its eviction) and removes the stale entry.
    ///
    /// # Errors
    ///
    /// Returns `KeyNotFound` if the id is absent or the key is inactive.
    pub fn resolve(&self, key_id: &str) -> Result<DataKey, EnvelopeError> {
        if let Some(key) = self.cache.read().unwrap_or_else(PoisonError::into_inner).get(key_id) {
            return Ok(key.clone());
        }

        let record = self
            .repo
            .find_active(key_id)?
            .ok_or_else(|| EnvelopeError::KeyNotFound { key_id: key_id.to_string() })?;

        let bytes = BASE64.decode(&record.key_material).map_err(|_| {
            EnvelopeError::Malformed(format!("key material for {key_id} is not base64"))
        })?;
        let key = DataKey::from_bytes(&bytes)
            .map_err(|err| EnvelopeError::Malformed(err.to_string()))?;

        self.cache_insert(key_id.to_string(), key.clone());

        match self.repo.find_active(key_id) {
            Ok(Some(_)) => Ok(key),
            Ok(None) => {
                // Destroyed while we were inserting; undo the stale insert
                self.cache_evict(key_id);
                Err(EnvelopeError::KeyNotFound { key_id: key_id.to_string() })
            },
            Err(err) => {
                self.cache_evict(key_id);
                Err(err.into())
            },
        }
    }

    /// Destroy a key: mark inactive in the repository, then evict from the
    /// cache.
    ///
    /// Repository-first ordering means there is no window where a key the
    /// repository already recorded as destroyed is still servable from
    /// cache. Idempotent: destroying an unknown or already-destroyed key is
    /// not an error.
    pub fn destroy(&self, key_id: &str) -> Result<(), EnvelopeError> {
        self.repo.mark_inactive(key_id)?;
        self.cache_evict(key_id);

        tracing::debug!(key_id = %key_id, "destroyed data key");
        Ok(())
    }

    /// Whether the cache currently holds this id. Test observability only.
    pub fn is_cached(&self, key_id: &str) -> bool {
        self.cache.read().unwrap_or_else(PoisonError::into_inner).contains_key(key_id)
    }

    fn cache_insert(&self, key_id: String, key: DataKey) {
        self.cache.write().unwrap_or_else(PoisonError::into_inner).insert(key_id, key);
    }

    fn cache_evict(&self, key_id: &str) {
        self.cache.write().unwrap_or_else(PoisonError::into_inner).remove(key_id);
    }
}
