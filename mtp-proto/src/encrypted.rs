//! Server-side MTProto 2.0 encrypted envelope (post-handshake traffic).
//!
//! The server decrypts frames the client encrypted and encrypts responses
//! back, using the `(salt, client_session_id, message_id, seq_no,
//! message_length, body)` inner layout byte for byte.

use mtp_crypto::{decrypt_data_v2, encrypt_data_v2, AuthKey, DequeBuffer};

/// Errors from [`decrypt_envelope`].
#[derive(Debug)]
pub enum DecryptError {
    /// The underlying crypto layer rejected the message.
    Crypto(mtp_crypto::DecryptError),
    /// The decrypted inner message was too short to contain a valid header.
    FrameTooShort,
}

impl std::fmt::Display for DecryptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Crypto(e) => write!(f, "crypto: {e}"),
            Self::FrameTooShort => write!(f, "inner plaintext too short"),
        }
    }
}
impl std::error::Error for DecryptError {}

/// The inner payload extracted from a client's encrypted frame.
pub struct DecryptedMessage {
    /// `salt` the client believes is current.
    pub salt: i64,
    /// `client_session_id` — keys the [`crate::session_registry::ClientSessionRegistry`].
    pub client_session_id: i64,
    /// `message_id` of the inner message.
    pub message_id: i64,
    /// `seq_no` of the inner message.
    pub seq_no: i32,
    /// TL-serialized body of the inner message.
    pub body: Vec<u8>,
}

/// Decrypt a frame sent by a client, given its `auth_key`.
///
/// `frame` must be `auth_key_id(8) || msg_key(16) || ciphertext`.
pub fn decrypt_envelope(
    frame: &mut Vec<u8>,
    auth_key: &AuthKey,
) -> Result<DecryptedMessage, DecryptError> {
    let plaintext = decrypt_data_v2(frame, auth_key).map_err(DecryptError::Crypto)?;

    // inner: salt(8) + client_session_id(8) + message_id(8) + seq_no(4) + message_length(4) + body
    if plaintext.len() < 32 {
        return Err(DecryptError::FrameTooShort);
    }

    let salt = i64::from_le_bytes(plaintext[..8].try_into().unwrap());
    let client_session_id = i64::from_le_bytes(plaintext[8..16].try_into().unwrap());
    let message_id = i64::from_le_bytes(plaintext[16..24].try_into().unwrap());
    let seq_no = i32::from_le_bytes(plaintext[24..28].try_into().unwrap());
    let message_length = u32::from_le_bytes(plaintext[28..32].try_into().unwrap()) as usize;

    let body = plaintext[32..32 + message_length.min(plaintext.len() - 32)].to_vec();

    Ok(DecryptedMessage { salt, client_session_id, message_id, seq_no, body })
}

/// Encrypt a response to a client, addressed by the same
/// `(salt, client_session_id, message_id, seq_no)` the envelope carries.
pub fn encrypt_envelope(
    auth_key: &AuthKey,
    salt: i64,
    client_session_id: i64,
    message_id: i64,
    seq_no: i32,
    body: &[u8],
) -> Vec<u8> {
    let inner_len = 8 + 8 + 8 + 4 + 4 + body.len();
    let mut buf = DequeBuffer::with_capacity(inner_len, 32);
    buf.extend(salt.to_le_bytes());
    buf.extend(client_session_id.to_le_bytes());
    buf.extend(message_id.to_le_bytes());
    buf.extend(seq_no.to_le_bytes());
    buf.extend((body.len() as u32).to_le_bytes());
    buf.extend(body.iter().copied());

    encrypt_data_v2(&mut buf, auth_key);
    buf.as_ref().to_vec()
}

/// Build the `bad_server_salt` soft-failure response: the client's frame
/// decrypts and authenticates fine, but its `salt` is stale. Re-encoded
/// through the same [`encrypt_envelope`] path as any other reply.
pub fn bad_server_salt_response(
    auth_key: &AuthKey,
    salt: i64,
    client_session_id: i64,
    reply_to_message_id: i64,
    reply_to_seq_no: i32,
    bad_msg_id: i64,
    correct_salt: i64,
) -> Vec<u8> {
    use mtp_tl::serialize::Serializable;
    let notification = mtp_tl::types::BadServerSalt {
        bad_msg_id,
        bad_msg_seqno: reply_to_seq_no,
        error_code: 48, // ERROR_BAD_SERVER_SALT, per the ambient protocol's numbering
        new_server_salt: correct_salt,
    };
    encrypt_envelope(
        auth_key,
        salt,
        client_session_id,
        reply_to_message_id,
        reply_to_seq_no,
        &notification.to_bytes(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> AuthKey {
        AuthKey::from_bytes([7u8; 256])
    }

    #[test]
    fn round_trips_through_encrypt_decrypt() {
        let key = test_key();
        let body = b"hello client".to_vec();
        let mut frame = encrypt_envelope(&key, 42, 99, 1000, 1, &body);
        let decrypted = decrypt_envelope(&mut frame, &key).unwrap();
        assert_eq!(decrypted.salt, 42);
        assert_eq!(decrypted.client_session_id, 99);
        assert_eq!(decrypted.message_id, 1000);
        assert_eq!(decrypted.seq_no, 1);
        assert_eq!(decrypted.body, body);
    }

    #[test]
    fn decrypt_rejects_wrong_key() {
        let key = test_key();
        let other = AuthKey::from_bytes([9u8; 256]);
        let mut frame = encrypt_envelope(&key, 1, 2, 3, 1, b"x");
        assert!(decrypt_envelope(&mut frame, &other).is_err());
    }

    #[test]
    fn bad_server_salt_response_round_trips() {
        let key = test_key();
        let mut frame = bad_server_salt_response(&key, 1, 2, 3, 1, 3, 77);
        let decrypted = decrypt_envelope(&mut frame, &key).unwrap();
        assert!(!decrypted.body.is_empty());
    }
}
