//! MTProto message framing types.

use std::time::{SystemTime, UNIX_EPOCH};

/// A 64-bit MTProto message identifier.
///
/// The upper 32 bits are derived from the current Unix time; the lower 32
/// bits are a monotonically increasing counter within the second, shifted
/// left by two to leave room for a reserved low bit (0 for client-originated
/// messages, 1 for server-originated ones — see [`MessageId::generate_server`]).
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct MessageId(pub u64);

impl MessageId {
    /// Generate a new server-originated message ID using the system clock.
    ///
    /// `counter` must be properly sequenced by the caller (e.g. incremented
    /// once per reply sent on a connection).
    pub fn generate_server(counter: u64) -> Self {
        let unix_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        // Upper 32 bits = seconds, lower 32 bits = intra-second counter × 4,
        // low bit set (server messages carry odd ids, client ones even).
        Self((unix_secs << 32) | (counter << 2) | 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_server_sets_low_bit() {
        let id = MessageId::generate_server(5);
        assert_eq!(id.0 & 1, 1);
    }

    #[test]
    fn generate_server_carries_counter() {
        let a = MessageId::generate_server(1);
        let b = MessageId::generate_server(2);
        assert_ne!(a.0, b.0);
    }

    #[test]
    fn plaintext_round_trips_through_bytes() {
        let msg = Message::plaintext(MessageId(42), 1, vec![1, 2, 3]);
        let bytes = msg.to_plaintext_bytes();
        assert_eq!(&bytes[..8], &[0u8; 8]);
        assert_eq!(i64::from_le_bytes(bytes[8..16].try_into().unwrap()), 42);
        assert_eq!(u32::from_le_bytes(bytes[16..20].try_into().unwrap()), 3);
        assert_eq!(&bytes[20..], &[1, 2, 3]);
    }
}

/// A framed MTProto message ready to be sent.
#[derive(Debug)]
pub struct Message {
    /// Unique identifier for this message.
    pub id: MessageId,
    /// Session-scoped sequence number (even for content-unrelated, odd for content-related).
    pub seq_no: i32,
    /// The serialized TL body (constructor ID + fields).
    pub body: Vec<u8>,
}

impl Message {
    /// Construct a new plaintext message (used before key exchange).
    pub fn plaintext(id: MessageId, seq_no: i32, body: Vec<u8>) -> Self {
        Self { id, seq_no, body }
    }

    /// Serialize the message into the plaintext wire format:
    ///
    /// ```text
    /// auth_key_id:long  (0 for plaintext)
    /// message_id:long
    /// message_data_length:int
    /// message_data:bytes
    /// ```
    pub fn to_plaintext_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8 + 8 + 4 + self.body.len());
        buf.extend(0i64.to_le_bytes());           // auth_key_id = 0
        buf.extend(self.id.0.to_le_bytes());      // message_id
        buf.extend((self.body.len() as u32).to_le_bytes()); // length
        buf.extend(&self.body);
        buf
    }
}
