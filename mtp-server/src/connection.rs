//! Per-connection task: Abridged framing, handshake dispatch, encrypted dispatch.
//!
//! Applies the Abridged transport's read/write framing in the server
//! direction: we receive the client's `0xef` init byte (instead of sending
//! it) and otherwise apply the same length-prefix framing on both legs of
//! the connection.

use std::sync::Arc;

use mtp_crypto::CryptoCfg;
use mtp_proto::handshake::{self, HandshakeState};
use mtp_proto::session_registry::{ClientSession, ClientSessionRegistry};
use mtp_proto::{encrypted, Message, MessageId};
use mtp_store::AuthKeyStore;
use mtp_tl::deserialize::Deserializable;
use mtp_tl::serialize::Serializable;
use mtp_tl::tag;
use mtp_tl::types;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Shared, process-wide state every connection task reads from.
pub struct Shared {
    pub cfg: Arc<CryptoCfg>,
    pub store: Arc<dyn AuthKeyStore>,
    pub registry: ClientSessionRegistry,
}

/// Errors that end a connection task.
#[derive(Debug)]
pub enum ConnectionError {
    Io(std::io::Error),
    Handshake(handshake::Error),
    UnknownConstructor(u32),
    UnknownAuthKey(i64),
    Decrypt(encrypted::DecryptError),
}

impl std::fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::Handshake(e) => write!(f, "handshake error: {e}"),
            Self::UnknownConstructor(id) => write!(f, "unknown constructor {id:#010x}"),
            Self::UnknownAuthKey(id) => write!(f, "unknown auth_key_id {id}"),
            Self::Decrypt(e) => write!(f, "decrypt error: {e}"),
        }
    }
}
impl std::error::Error for ConnectionError {}
impl From<std::io::Error> for ConnectionError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Drive one client connection end to end: read the Abridged init byte,
/// then alternate between the plaintext handshake path and the encrypted
/// path depending on each frame's leading `auth_key_id`.
pub async fn handle(mut stream: TcpStream, connection_id: u64, shared: Arc<Shared>) -> Result<(), ConnectionError> {
    let mut init = [0u8; 1];
    stream.read_exact(&mut init).await?;
    if init[0] != 0xef {
        log::warn!("[connection] unexpected transport init byte {:#04x}, closing", init[0]);
        return Ok(());
    }

    let mut state = HandshakeState::new();
    let mut next_message_id: u64 = 0;

    loop {
        let frame = match recv_abridged(&mut stream).await {
            Ok(frame) => frame,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        if frame.len() < 8 {
            log::warn!("[connection] frame shorter than auth_key_id, closing");
            return Ok(());
        }
        let auth_key_id = i64::from_le_bytes(frame[..8].try_into().unwrap());

        if auth_key_id == 0 {
            let reply = handle_plaintext(&shared, &mut state, &frame, &mut next_message_id).await?;
            if let Some(reply) = reply {
                send_abridged(&mut stream, &reply).await?;
            }
        } else {
            handle_encrypted(&shared, connection_id, auth_key_id, frame, &mut stream).await?;
        }
    }
}

async fn handle_plaintext(
    shared: &Shared,
    state: &mut HandshakeState,
    frame: &[u8],
    next_message_id: &mut u64,
) -> Result<Option<Vec<u8>>, ConnectionError> {
    let cfg = &shared.cfg;
    // auth_key_id(8) || message_id(8) || message_length(4) || body
    if frame.len() < 20 {
        log::warn!("[connection] plaintext frame too short, closing");
        return Ok(None);
    }
    let body_len = u32::from_le_bytes(frame[16..20].try_into().unwrap()) as usize;
    let body = &frame[20..20 + body_len.min(frame.len() - 20)];
    if body.len() < 4 {
        return Ok(None);
    }
    let constructor = u32::from_le_bytes(body[..4].try_into().unwrap());

    let owned_state = std::mem::replace(state, HandshakeState::new());

    let (response_bytes, new_state) = match constructor {
        tag::REQ_PQ_MULTI => {
            let req = types::ReqPqMulti::from_bytes(body).map_err(|_| {
                ConnectionError::UnknownConstructor(constructor)
            })?;
            let (resp, new_state) = handshake::on_req_pq(cfg, owned_state, &req)
                .map_err(ConnectionError::Handshake)?;
            (resp.to_bytes(), new_state)
        }
        tag::REQ_DH_PARAMS => {
            let req = types::ReqDhParams::from_bytes(body).map_err(|_| {
                ConnectionError::UnknownConstructor(constructor)
            })?;
            let (resp, new_state) = handshake::on_req_dh_params(cfg, owned_state, &req)
                .map_err(ConnectionError::Handshake)?;
            (resp.to_bytes(), new_state)
        }
        tag::SET_CLIENT_DH_PARAMS => {
            let req = types::SetClientDhParams::from_bytes(body).map_err(|_| {
                ConnectionError::UnknownConstructor(constructor)
            })?;
            let (finished, new_state) = handshake::on_set_client_dh_params(owned_state, &req)
                .map_err(ConnectionError::Handshake)?;
            shared.store.put(finished.auth_key.clone()).await?;
            log::info!(
                "[connection] handshake complete, auth_key_id={}",
                mtp_store::auth_key_id(&finished.auth_key)
            );
            (finished.answer.to_bytes(), new_state)
        }
        other => {
            log::warn!("[connection] unknown constructor {other:#010x}, dropping frame");
            *state = owned_state;
            return Ok(None);
        }
    };

    *state = new_state;

    *next_message_id += 1;
    let msg = Message::plaintext(MessageId::generate_server(*next_message_id), 0, response_bytes);
    Ok(Some(msg.to_plaintext_bytes()))
}

async fn handle_encrypted(
    shared: &Shared,
    connection_id: u64,
    auth_key_id: i64,
    mut frame: Vec<u8>,
    stream: &mut TcpStream,
) -> Result<(), ConnectionError> {
    let auth_key = shared
        .store
        .get(auth_key_id)
        .await?
        .ok_or(ConnectionError::UnknownAuthKey(auth_key_id))?;

    let decrypted = encrypted::decrypt_envelope(&mut frame, &auth_key).map_err(ConnectionError::Decrypt)?;

    let session = shared
        .registry
        .get_or_insert_with(decrypted.client_session_id, || ClientSession {
            auth_key_id: auth_key_id as u64,
            server_salt: decrypted.salt,
            last_message_id: decrypted.message_id,
            connection_id,
        })
        .await;

    if decrypted.salt != session.server_salt {
        log::info!(
            "[connection] stale server_salt from session {}, correcting",
            decrypted.client_session_id
        );
        let reply = encrypted::bad_server_salt_response(
            &auth_key,
            session.server_salt,
            decrypted.client_session_id,
            decrypted.message_id,
            decrypted.seq_no,
            decrypted.message_id,
            session.server_salt,
        );
        send_abridged(stream, &reply).await?;
        return Ok(());
    }

    shared
        .registry
        .update(decrypted.client_session_id, decrypted.message_id, session.server_salt)
        .await;

    // The RPC surface beyond the handshake is out of scope for this core;
    // acknowledge with a well-formed rpc_error rather than silently dropping.
    let error = types::RpcError {
        error_code: 500,
        error_message: "NOT_IMPLEMENTED".to_string(),
    };
    let reply = encrypted::encrypt_envelope(
        &auth_key,
        session.server_salt,
        decrypted.client_session_id,
        decrypted.message_id,
        decrypted.seq_no,
        &error.to_bytes(),
    );
    send_abridged(stream, &reply).await?;
    Ok(())
}

// ─── Abridged framing (server direction) ────────────────────────────────────

async fn send_abridged(stream: &mut TcpStream, data: &[u8]) -> std::io::Result<()> {
    let words = data.len() / 4;
    if words < 0x7f {
        stream.write_all(&[words as u8]).await?;
    } else {
        stream
            .write_all(&[0x7f, (words & 0xff) as u8, ((words >> 8) & 0xff) as u8, ((words >> 16) & 0xff) as u8])
            .await?;
    }
    stream.write_all(data).await?;
    Ok(())
}

async fn recv_abridged(stream: &mut TcpStream) -> std::io::Result<Vec<u8>> {
    let mut h = [0u8; 1];
    stream.read_exact(&mut h).await?;
    let words = if h[0] < 0x7f {
        h[0] as usize
    } else {
        let mut b = [0u8; 3];
        stream.read_exact(&mut b).await?;
        b[0] as usize | (b[1] as usize) << 8 | (b[2] as usize) << 16
    };
    let mut buf = vec![0u8; words * 4];
    stream.read_exact(&mut buf).await?;
    Ok(buf)
}
