//! Idempotency key derivation for message creation.
//!
//! The key is the sole deduplication mechanism: creation must go through a
//! conditional insert on the key's unique index, never a check-then-insert.

use uuid::Uuid;

use contrail_common::types::MessageType;

/// Deterministic key for one (subscription, receiver, message kind,
/// status version) tuple. Any one input changing yields a different key.
pub fn message_key(
    subscription_id: Uuid,
    receiver_id: Uuid,
    message_type: MessageType,
    status_version: i32,
) -> String {
    format!(
        "{}:{}:{}:v{}",
        subscription_id, receiver_id, message_type, status_version
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_deterministic() {
        let sub = Uuid::new_v4();
        let recv = Uuid::new_v4();
        let a = message_key(sub, recv, MessageType::Departure, 3);
        let b = message_key(sub, recv, MessageType::Departure, 3);
        assert_eq!(a, b);
    }

    #[test]
    fn test_any_input_change_yields_a_new_key() {
        let sub = Uuid::new_v4();
        let recv = Uuid::new_v4();
        let base = message_key(sub, recv, MessageType::Departure, 3);

        assert_ne!(
            base,
            message_key(Uuid::new_v4(), recv, MessageType::Departure, 3)
        );
        assert_ne!(
            base,
            message_key(sub, Uuid::new_v4(), MessageType::Departure, 3)
        );
        assert_ne!(base, message_key(sub, recv, MessageType::Arrival, 3));
        assert_ne!(base, message_key(sub, recv, MessageType::Departure, 4));
    }

    #[test]
    fn test_key_embeds_version_marker() {
        let key = message_key(Uuid::new_v4(), Uuid::new_v4(), MessageType::Delay, 12);
        assert!(key.ends_with(":delay:v12"));
    }
}
