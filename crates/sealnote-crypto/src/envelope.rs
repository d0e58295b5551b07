//! Message sealing with AES-256-GCM
//!
//! All functions are pure - random bytes must be provided by the caller.
//! This enables deterministic testing and keeps key generation policy out
//! of the primitive layer.

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit},
};
use zeroize::Zeroize;

use crate::error::CryptoError;

/// Size of a data key in bytes (AES-256)
pub const KEY_SIZE: usize = 32;

/// Size of the GCM initialization vector in bytes (the recommended 96 bits)
pub const IV_SIZE: usize = 12;

/// Size of the GCM authentication tag appended to the ciphertext (128 bits)
pub const TAG_SIZE: usize = 16;

/// A 256-bit symmetric data key.
///
/// Sealed envelopes reference the key only by an opaque identifier; the
/// material itself never leaves the key store unencoded. Zeroized on drop.
#[derive(Clone)]
pub struct DataKey {
    key: [u8; KEY_SIZE],
}

impl DataKey {
    /// Wrap exactly [`KEY_SIZE`] bytes of key material.
    ///
    /// # Errors
    ///
    /// Returns `InvalidKeyLength` if `bytes` is not exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: KEY_SIZE,
                actual: bytes.len(),
            });
        }

        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(bytes);
        Ok(Self { key })
    }

    /// Raw key material.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.key
    }
}

impl Drop for DataKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl std::fmt::Debug for DataKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material
        f.debug_struct("DataKey").finish_non_exhaustive()
    }
}

/// Seal a plaintext under `key` with a caller-provided IV.
///
/// Returns the ciphertext with the 16-byte authentication tag appended.
///
/// # Security
///
/// The IV MUST be freshly random per call and never reused under the same
/// key. IV reuse breaks GCM's authentication guarantee.
pub fn seal(plaintext: &[u8], key: &DataKey, iv: &[u8; IV_SIZE]) -> Vec<u8> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));

    let Ok(ciphertext) = cipher.encrypt(Nonce::from_slice(iv), plaintext) else {
        unreachable!("AES-256-GCM encryption cannot fail with valid inputs");
    };

    ciphertext
}

/// Open a sealed ciphertext under `key` with the IV it was sealed with.
///
/// # Errors
///
/// Returns `AuthenticationFailed` if the tag does not verify: tampered
/// ciphertext, wrong key, or wrong IV. The three causes are deliberately
/// indistinguishable.
pub fn open(ciphertext: &[u8], key: &DataKey, iv: &[u8; IV_SIZE]) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));

    cipher
        .decrypt(Nonce::from_slice(iv), ciphertext)
        .map_err(|_| CryptoError::AuthenticationFailed)
}
