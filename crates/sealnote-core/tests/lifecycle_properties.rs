//! Property-based tests for lifecycle state derivation and the expired
//! message scan.

use proptest::prelude::*;
use sealnote_core::{
    Envelope, Message, MessageRepository, MessageState, MemoryMessageRepository,
};
use uuid::Uuid;

fn arb_message() -> impl Strategy<Value = Message> {
    (
        proptest::bool::ANY,
        proptest::option::of(0u64..10_000),
        proptest::option::of(0u64..10_000),
        proptest::bool::ANY,
    )
        .prop_map(|(read_once, read_at, expires_at, revoked)| Message {
            id: Uuid::new_v4(),
            sender: "alice".to_string(),
            receiver: "bob".to_string(),
            envelope: Envelope { key_id: "k".to_string(), iv: [0u8; 12], ciphertext: vec![0xAA] },
            created_at: 0,
            read_once,
            read_at,
            expires_at,
            revoked,
            revocation_reason: None,
            revoked_by: None,
            revoked_at: None,
        })
}

proptest! {
    /// Revocation dominates every other field combination.
    #[test]
    fn revoked_messages_are_always_revoked(message in arb_message(), now in 0u64..20_000) {
        let mut message = message;
        message.revoked = true;
        prop_assert_eq!(message.state(now), MessageState::Revoked);
    }

    /// For fixed fields, Expired is absorbing as time moves forward:
    /// a message never flips back to Active or Read.
    #[test]
    fn expiry_is_monotone_in_time(
        message in arb_message(),
        now in 0u64..20_000,
        later_by in 0u64..20_000,
    ) {
        if message.state(now) == MessageState::Expired {
            prop_assert_eq!(message.state(now + later_by), MessageState::Expired);
        }
    }

    /// A non-revoked message is Expired exactly when its deadline has
    /// passed, deadline inclusive.
    #[test]
    fn expiry_boundary_is_inclusive(message in arb_message(), now in 0u64..20_000) {
        let mut message = message;
        message.revoked = false;

        let expired = message.state(now) == MessageState::Expired;
        prop_assert_eq!(expired, message.expires_at.is_some_and(|at| at <= now));
    }

    /// The repository scan returns exactly the messages whose deadline has
    /// passed, and nothing else.
    #[test]
    fn expired_scan_agrees_with_deadlines(
        messages in proptest::collection::vec(arb_message(), 0..20),
        now in 0u64..20_000,
    ) {
        let repo = MemoryMessageRepository::new();
        for message in &messages {
            repo.save(message).unwrap();
        }

        let scanned = repo.find_expired_before(now).unwrap();

        let due = messages
            .iter()
            .filter(|m| m.expires_at.is_some_and(|at| at <= now))
            .count();
        prop_assert_eq!(scanned.len(), due);
        prop_assert!(scanned.iter().all(|m| m.expires_at.is_some_and(|at| at <= now)));
    }
}
