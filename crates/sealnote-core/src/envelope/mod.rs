//! Envelope encryption: per-message data keys bound to a master-key
//! fallback.
//!
//! Every message is sealed under its own data key; destroying the key makes
//! that message's ciphertext permanently unrecoverable. The reserved id
//! `"master"` denotes the process-wide key loaded at startup, used when a
//! caller encrypts without requesting a data key; it is never stored,
//! cached, or destroyed.
//!
//! A requested key that fails to resolve fails the call with `KeyNotFound`.
//! There is no silent substitution of the master key: encrypting under a
//! different key than the caller asked for would leave them wrong about
//! which key protects the message.

mod error;
mod keystore;
mod memory;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
pub use error::EnvelopeError;
pub use keystore::{KeyRecord, KeyRepository, KeyStore};
pub use memory::MemoryKeyRepository;
use rand::RngCore;
use sealnote_crypto::{DataKey, IV_SIZE, open, seal};

use crate::config::MasterKey;

/// Reserved identifier of the process-wide master key.
pub const MASTER_KEY_ID: &str = "master";

/// A sealed ciphertext with everything needed to open it later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Identifier of the key the plaintext was sealed under
    pub key_id: String,
    /// The fresh random IV used for this (and only this) seal
    pub iv: [u8; IV_SIZE],
    /// Ciphertext with the 16-byte authentication tag appended
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    /// IV as the opaque Base64 string handed to persistence collaborators.
    pub fn iv_b64(&self) -> String {
        BASE64.encode(self.iv)
    }

    /// Ciphertext as the opaque Base64 string handed to persistence
    /// collaborators.
    pub fn ciphertext_b64(&self) -> String {
        BASE64.encode(&self.ciphertext)
    }

    /// Rebuild an envelope from its persisted Base64 form.
    ///
    /// # Errors
    ///
    /// Returns `Malformed` if either field fails to decode or the IV has
    /// the wrong length.
    pub fn from_b64(key_id: &str, iv: &str, ciphertext: &str) -> Result<Self, EnvelopeError> {
        let iv_bytes = BASE64
            .decode(iv)
            .map_err(|_| EnvelopeError::Malformed("IV is not base64".to_string()))?;
        let iv_array: [u8; IV_SIZE] = iv_bytes.try_into().map_err(|_| {
            EnvelopeError::Malformed(format!("IV must be {IV_SIZE} bytes"))
        })?;
        let ciphertext = BASE64
            .decode(ciphertext)
            .map_err(|_| EnvelopeError::Malformed("ciphertext is not base64".to_string()))?;

        Ok(Self { key_id: key_id.to_string(), iv: iv_array, ciphertext })
    }
}

/// Envelope cipher: seals and opens message content, managing per-message
/// data keys through the key store.
///
/// Clones share the key store cache.
pub struct EnvelopeCipher<R>
where
    R: KeyRepository,
{
    keys: KeyStore<R>,
    master: DataKey,
}

impl<R> Clone for EnvelopeCipher<R>
where
    R: KeyRepository,
{
    fn clone(&self) -> Self {
        Self { keys: self.keys.clone(), master: self.master.clone() }
    }
}

impl<R> EnvelopeCipher<R>
where
    R: KeyRepository,
{
    /// Create a cipher over a key repository with the startup master key.
    pub fn new(repo: R, master: MasterKey) -> Self {
        Self { keys: KeyStore::new(repo), master: master.data_key().clone() }
    }

    /// Generate a fresh data key and return its identifier.
    ///
    /// # Errors
    ///
    /// Returns `KeyGenerationFailed` if the key cannot be persisted.
    pub fn generate_key(&self) -> Result<String, EnvelopeError> {
        self.keys.generate()
    }

    /// Seal a plaintext.
    ///
    /// With `Some(key_id)` the named key must resolve; a miss fails the
    /// call. With `None` the master key is used and the envelope carries
    /// the id `"master"`. A fresh random 12-byte IV is drawn per call.
    ///
    /// # Errors
    ///
    /// Returns `KeyNotFound` if the requested key is absent or destroyed.
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        key_id: Option<&str>,
    ) -> Result<Envelope, EnvelopeError> {
        let (key, key_id) = match key_id {
            None | Some(MASTER_KEY_ID) => (self.master.clone(), MASTER_KEY_ID.to_string()),
            Some(id) => (self.keys.resolve(id)?, id.to_string()),
        };

        let mut iv = [0u8; IV_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut iv);

        let ciphertext = seal(plaintext, &key, &iv);

        Ok(Envelope { key_id, iv, ciphertext })
    }

    /// Open a sealed envelope.
    ///
    /// # Errors
    ///
    /// Returns `KeyNotFound` if the key is absent or destroyed (`"master"`
    /// always resolves), and `AuthenticationFailed` if the tag does not
    /// verify. The two are deliberately distinct: "message no longer
    /// available" versus "message corrupted".
    pub fn decrypt(&self, envelope: &Envelope) -> Result<Vec<u8>, EnvelopeError> {
        let key = if envelope.key_id == MASTER_KEY_ID {
            self.master.clone()
        } else {
            self.keys.resolve(&envelope.key_id)?
        };

        Ok(open(&envelope.ciphertext, &key, &envelope.iv)?)
    }

    /// Destroy a data key. No-op for `"master"`; otherwise idempotent.
    ///
    /// # Errors
    ///
    /// Returns `Repository` if the persistence collaborator fails.
    pub fn destroy_key(&self, key_id: &str) -> Result<(), EnvelopeError> {
        if key_id == MASTER_KEY_ID {
            return Ok(());
        }
        self.keys.destroy(key_id)
    }

    /// The underlying key store. Test observability only.
    pub fn key_store(&self) -> &KeyStore<R> {
        &self.keys
    }
}
