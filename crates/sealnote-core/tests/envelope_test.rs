//! Envelope cipher integration tests.

use std::collections::HashSet;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use sealnote_core::{
    EnvelopeCipher, EnvelopeError, MASTER_KEY_ID, MasterKey, MemoryKeyRepository,
};

fn master() -> MasterKey {
    MasterKey::from_base64(&BASE64.encode([42u8; 32])).unwrap()
}

fn cipher() -> EnvelopeCipher<MemoryKeyRepository> {
    EnvelopeCipher::new(MemoryKeyRepository::new(), master())
}

#[test]
fn per_message_key_roundtrip() {
    let cipher = cipher();

    let key_id = cipher.generate_key().unwrap();
    let envelope = cipher.encrypt("meet at noon".as_bytes(), Some(&key_id)).unwrap();

    assert_eq!(envelope.key_id, key_id);
    assert_eq!(cipher.decrypt(&envelope).unwrap(), b"meet at noon");
}

#[test]
fn master_key_flow_survives_restart() {
    // Two ciphers built from the same configured master key, fresh
    // repositories: master-sealed content decrypts across "restarts"
    let before = EnvelopeCipher::new(MemoryKeyRepository::new(), master());
    let envelope = before.encrypt(b"durable", None).unwrap();
    assert_eq!(envelope.key_id, MASTER_KEY_ID);

    let after = EnvelopeCipher::new(MemoryKeyRepository::new(), master());
    assert_eq!(after.decrypt(&envelope).unwrap(), b"durable");
}

#[test]
fn unknown_key_fails_without_master_fallback() {
    let cipher = cipher();

    let result = cipher.encrypt(b"payload", Some("dangling-key-id"));

    // The call fails outright; nothing is sealed under the wrong key
    assert!(matches!(
        result,
        Err(EnvelopeError::KeyNotFound { ref key_id }) if key_id == "dangling-key-id"
    ));
}

#[test]
fn destruction_is_final_even_with_warm_cache() {
    let cipher = cipher();
    let key_id = cipher.generate_key().unwrap();
    let envelope = cipher.encrypt(b"burn after reading", Some(&key_id)).unwrap();

    // The generating cipher has the key cached; destroy must still win
    assert!(cipher.key_store().is_cached(&key_id));
    cipher.destroy_key(&key_id).unwrap();

    assert!(!cipher.key_store().is_cached(&key_id));
    assert!(matches!(cipher.decrypt(&envelope), Err(EnvelopeError::KeyNotFound { .. })));
    assert!(matches!(
        cipher.encrypt(b"too late", Some(&key_id)),
        Err(EnvelopeError::KeyNotFound { .. })
    ));
}

#[test]
fn destroyed_key_stays_dead_across_cold_caches() {
    let repo = MemoryKeyRepository::new();
    let writer = EnvelopeCipher::new(repo.clone(), master());
    let key_id = writer.generate_key().unwrap();
    let envelope = writer.encrypt(b"short-lived", Some(&key_id)).unwrap();

    writer.destroy_key(&key_id).unwrap();

    // A peer over the same repository with a cold cache cannot resurrect it
    let reader = EnvelopeCipher::new(repo, master());
    assert!(matches!(reader.decrypt(&envelope), Err(EnvelopeError::KeyNotFound { .. })));
}

#[test]
fn destroy_is_idempotent_and_master_is_untouchable() {
    let cipher = cipher();
    let key_id = cipher.generate_key().unwrap();

    cipher.destroy_key(&key_id).unwrap();
    cipher.destroy_key(&key_id).unwrap();
    cipher.destroy_key("never-existed").unwrap();
    cipher.destroy_key(MASTER_KEY_ID).unwrap();

    let envelope = cipher.encrypt(b"master lives", None).unwrap();
    assert_eq!(cipher.decrypt(&envelope).unwrap(), b"master lives");
}

#[test]
fn ivs_are_unique_across_many_seals() {
    let cipher = cipher();
    let mut seen = HashSet::new();

    for _ in 0..10_000 {
        let envelope = cipher.encrypt(b"same plaintext", None).unwrap();
        assert!(seen.insert(envelope.iv), "IV reused across seals");
    }
}

#[test]
fn same_plaintext_seals_to_different_ciphertexts() {
    let cipher = cipher();

    let a = cipher.encrypt(b"identical", None).unwrap();
    let b = cipher.encrypt(b"identical", None).unwrap();

    assert_ne!(a.iv, b.iv);
    assert_ne!(a.ciphertext, b.ciphertext);
}

#[test]
fn persisted_form_roundtrips_through_base64() {
    let cipher = cipher();
    let key_id = cipher.generate_key().unwrap();
    let envelope = cipher.encrypt(b"stored as strings", Some(&key_id)).unwrap();

    let rebuilt = sealnote_core::Envelope::from_b64(
        &envelope.key_id,
        &envelope.iv_b64(),
        &envelope.ciphertext_b64(),
    )
    .unwrap();

    assert_eq!(cipher.decrypt(&rebuilt).unwrap(), b"stored as strings");
}
