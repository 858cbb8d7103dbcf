//! Server-side unauthenticated handshake state machine.
//!
//! Three ordered transitions, each consuming the previous step's nonces and
//! producing the next response:
//!
//! ```text
//! on_req_pq(cfg, state, req_pq)       -> (resPQ, AwaitReqDhParams)
//! on_req_dh_params(cfg, state, req)   -> (ServerDhParams, AwaitSetClientDhParams)
//! on_set_client_dh_params(state, req) -> (SetClientDhParamsAnswer, Done)
//! ```
//!
//! Each takes the connection's current `HandshakeState` and rejects with
//! `Error::OutOfOrder` unless it matches the one state that transition is
//! valid from. Each transition is a pure `do_*` function taking explicit
//! randomness, with a thin public wrapper that sources randomness from
//! `getrandom`. The server consumes requests and emits responses, the
//! reverse of a client driving the same handshake.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use mtp_crypto::{aes, generate_key_data_from_nonce, rsa, AuthKey, CryptoCfg};
use mtp_tl::deserialize::{Cursor, Deserializable};
use mtp_tl::serialize::Serializable;
use mtp_tl::types;
use num_bigint::BigUint;
use sha1::{Digest, Sha1};

// ─── Error ────────────────────────────────────────────────────────────────────

/// Errors produced while driving the handshake state machine.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// `p`/`q` sent back by the client do not match the factors we handed out.
    MismatchedFactors,
    /// `public_key_fingerprint` does not match our [`CryptoCfg::fingerprint`].
    UnknownFingerprint { fingerprint: i64 },
    /// RSA-decrypted plaintext's SHA-1 prefix didn't match its payload.
    BadRsaPlaintext,
    /// The decoded `p_q_inner_data`/`client_DH_inner_data` failed to parse.
    MalformedInner(mtp_tl::deserialize::Error),
    /// A nonce carried from a previous step didn't match.
    NonceMismatch,
    /// A nonce carried from a previous step didn't match.
    ServerNonceMismatch,
    /// `g`, `g_a`, or `g_b` fell outside the safe DH range.
    DegenerateDhParameter,
    /// Client's `encrypted_data` was not 16-byte aligned.
    UnalignedCiphertext,
    /// A handshake step arrived while the connection wasn't waiting for it.
    OutOfOrder,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MismatchedFactors => write!(f, "p/q do not match our factorization"),
            Self::UnknownFingerprint { fingerprint } =>
                write!(f, "unknown RSA fingerprint {fingerprint}"),
            Self::BadRsaPlaintext => write!(f, "RSA plaintext SHA-1 prefix mismatch"),
            Self::MalformedInner(e) => write!(f, "malformed inner object: {e}"),
            Self::NonceMismatch => write!(f, "nonce mismatch"),
            Self::ServerNonceMismatch => write!(f, "server_nonce mismatch"),
            Self::DegenerateDhParameter => write!(f, "DH parameter out of safe range"),
            Self::UnalignedCiphertext => write!(f, "ciphertext not block-aligned"),
            Self::OutOfOrder => write!(f, "handshake step received out of order"),
        }
    }
}

impl std::error::Error for Error {}

// ─── State ───────────────────────────────────────────────────────────────────

/// Per-connection handshake state, modelled explicitly rather than hidden
/// inside a nested call chain, so a caller can always tell which message
/// this connection is waiting for.
pub enum HandshakeState {
    /// Waiting for `req_pq_multi`.
    AwaitReqPq,
    /// Waiting for `req_DH_params`; carries the nonces handed out in `resPQ`.
    AwaitReqDhParams { nonce: [u8; 16], server_nonce: [u8; 16] },
    /// Waiting for `set_client_DH_params`; carries everything needed to
    /// derive `auth_key` once the client's `g_b` arrives.
    AwaitSetClientDhParams {
        nonce: [u8; 16],
        server_nonce: [u8; 16],
        new_nonce: [u8; 32],
        a: BigUint,
        g_a: BigUint,
        dh_prime: BigUint,
    },
    /// Handshake complete.
    Done { auth_key: AuthKey },
}

impl HandshakeState {
    /// A fresh state machine awaiting `req_pq_multi`.
    pub fn new() -> Self { Self::AwaitReqPq }
}

impl Default for HandshakeState {
    fn default() -> Self { Self::new() }
}

/// Successful conclusion of `on_set_client_dh_params`.
pub struct Finished {
    /// Response to send back (`dh_gen_ok`, as `dh_gen_retry`/`dh_gen_fail`
    /// are out of scope per the handshake's non-goals).
    pub answer: types::DhGenOk,
    /// The derived 256-byte authorization key.
    pub auth_key: AuthKey,
    /// The salt to hand the client's session: `new_nonce[..8] XOR server_nonce[..8]`.
    pub first_salt: i64,
}

// ─── Transition 1: req_pq ────────────────────────────────────────────────────

/// Handle `req_pq_multi`, returning `resPQ` and the next state.
///
/// Only valid from [`HandshakeState::AwaitReqPq`]; any other state means
/// the client sent this step out of order.
pub fn on_req_pq(
    cfg: &CryptoCfg,
    state: HandshakeState,
    req: &types::ReqPqMulti,
) -> Result<(types::ResPq, HandshakeState), Error> {
    let resp = types::ResPq {
        nonce: req.nonce,
        server_nonce: req.nonce, // placeholder overwritten below
        pq: cfg.pq.to_be_bytes().to_vec(),
        server_public_key_fingerprints: vec![cfg.fingerprint as i64],
    };
    let mut rnd = [0u8; 16];
    getrandom::getrandom(&mut rnd).expect("getrandom");
    do_on_req_pq(cfg, state, req, &rnd, resp)
}

fn do_on_req_pq(
    cfg: &CryptoCfg,
    state: HandshakeState,
    req: &types::ReqPqMulti,
    server_nonce_rnd: &[u8; 16],
    mut resp: types::ResPq,
) -> Result<(types::ResPq, HandshakeState), Error> {
    if !matches!(state, HandshakeState::AwaitReqPq) {
        return Err(Error::OutOfOrder);
    }
    resp.server_nonce = *server_nonce_rnd;
    resp.pq = cfg.pq.to_be_bytes().to_vec();
    resp.server_public_key_fingerprints = vec![cfg.fingerprint as i64];
    Ok((
        resp,
        HandshakeState::AwaitReqDhParams { nonce: req.nonce, server_nonce: *server_nonce_rnd },
    ))
}

// ─── Transition 2: req_DH_params ─────────────────────────────────────────────

/// Handle `req_DH_params`. On success returns `server_DH_params_ok`,
/// on a recoverable protocol violation returns `server_DH_params_fail`.
pub fn on_req_dh_params(
    cfg: &CryptoCfg,
    state: HandshakeState,
    req: &types::ReqDhParams,
) -> Result<(types::ServerDhParams, HandshakeState), Error> {
    let mut rnd = [0u8; 256 + 16]; // 256 for secret exponent `a`, 16 for inner padding
    getrandom::getrandom(&mut rnd).expect("getrandom");
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() as i32;
    do_on_req_dh_params(cfg, state, req, &rnd, now)
}

fn do_on_req_dh_params(
    cfg: &CryptoCfg,
    state: HandshakeState,
    req: &types::ReqDhParams,
    random: &[u8; 272],
    now: i32,
) -> Result<(types::ServerDhParams, HandshakeState), Error> {
    let (nonce, server_nonce) = match state {
        HandshakeState::AwaitReqDhParams { nonce, server_nonce } => (nonce, server_nonce),
        _ => return Err(Error::OutOfOrder),
    };
    if req.nonce != nonce {
        return Err(Error::NonceMismatch);
    }
    if req.server_nonce != server_nonce {
        return Err(Error::ServerNonceMismatch);
    }

    let our_p = cfg.p.to_be_bytes();
    let our_p = trim_leading_zeros(&our_p);
    let our_q = cfg.q.to_be_bytes();
    let our_q = trim_leading_zeros(&our_q);
    if req.p != our_p || req.q != our_q {
        return Err(Error::MismatchedFactors);
    }

    if req.public_key_fingerprint as u64 != cfg.fingerprint {
        return Err(Error::UnknownFingerprint { fingerprint: req.public_key_fingerprint });
    }

    // Raw RSA decrypt: plaintext is SHA1(inner) || inner || random_padding.
    let plain = cfg.rsa_private.decrypt(&req.encrypted_data);
    let claimed_hash: [u8; 20] = plain[..20].try_into().unwrap();

    let mut cursor = Cursor::from_slice(&plain[20..]);
    let inner = types::PQInnerData::deserialize(&mut cursor)
        .map_err(Error::MalformedInner)?;

    let actual_hash: [u8; 20] = sha1_of(&plain[20..20 + cursor.pos()]);
    if claimed_hash != actual_hash {
        return Err(Error::BadRsaPlaintext);
    }

    if inner.nonce != nonce {
        return Err(Error::NonceMismatch);
    }
    if inner.server_nonce != server_nonce {
        return Err(Error::ServerNonceMismatch);
    }
    if inner.pq != cfg.pq.to_be_bytes() {
        return Err(Error::MismatchedFactors);
    }
    let new_nonce = inner.new_nonce;

    // Pick our own DH secret exponent `a` and compute `g_a`.
    let a = BigUint::from_bytes_be(&random[..256]);
    let dh_prime = BigUint::from_bytes_be(&cfg.dh_prime);
    let g = BigUint::from(cfg.dh_g);
    let g_a = g.modpow(&a, &dh_prime);
    check_dh_range(&g, &g_a, &dh_prime)?;

    let inner_data = types::ServerDhInnerData {
        nonce,
        server_nonce,
        g: cfg.dh_g as i32,
        dh_prime: cfg.dh_prime.to_vec(),
        g_a: g_a.to_bytes_be(),
        server_time: now,
    };
    let inner_bytes = inner_data.to_bytes();
    let digest = sha1_of(&inner_bytes);

    let pad_len = (16 - ((20 + inner_bytes.len()) % 16)) % 16;
    let pad = &random[256..256 + pad_len];

    let mut plaintext = Vec::with_capacity(20 + inner_bytes.len() + pad_len);
    plaintext.extend_from_slice(&digest);
    plaintext.extend_from_slice(&inner_bytes);
    plaintext.extend_from_slice(pad);

    let (key, iv) = generate_key_data_from_nonce(&server_nonce, &new_nonce);
    aes::ige_encrypt(&mut plaintext, &key, &iv);

    let resp = types::ServerDhParams::Ok(types::ServerDhParamsOk {
        nonce,
        server_nonce,
        encrypted_answer: plaintext,
    });

    Ok((
        resp,
        HandshakeState::AwaitSetClientDhParams { nonce, server_nonce, new_nonce, a, g_a, dh_prime },
    ))
}

// ─── Transition 3: set_client_DH_params ──────────────────────────────────────

/// Handle `set_client_DH_params`, deriving `auth_key` on success.
pub fn on_set_client_dh_params(
    state: HandshakeState,
    req: &types::SetClientDhParams,
) -> Result<(Finished, HandshakeState), Error> {
    do_on_set_client_dh_params(state, req)
}

fn do_on_set_client_dh_params(
    state: HandshakeState,
    req: &types::SetClientDhParams,
) -> Result<(Finished, HandshakeState), Error> {
    let (nonce, server_nonce, new_nonce, a, g_a, dh_prime) = match state {
        HandshakeState::AwaitSetClientDhParams { nonce, server_nonce, new_nonce, a, g_a, dh_prime } =>
            (nonce, server_nonce, new_nonce, a, g_a, dh_prime),
        _ => return Err(Error::NonceMismatch),
    };

    if req.nonce != nonce {
        return Err(Error::NonceMismatch);
    }
    if req.server_nonce != server_nonce {
        return Err(Error::ServerNonceMismatch);
    }
    if req.encrypted_data.len() % 16 != 0 {
        return Err(Error::UnalignedCiphertext);
    }

    let (key, iv) = generate_key_data_from_nonce(&server_nonce, &new_nonce);
    let mut buf = req.encrypted_data.clone();
    aes::ige_decrypt(&mut buf, &key, &iv);

    let claimed_hash: [u8; 20] = buf[..20].try_into().unwrap();
    let mut cursor = Cursor::from_slice(&buf[20..]);
    let inner = types::ClientDhInnerData::deserialize(&mut cursor)
        .map_err(Error::MalformedInner)?;
    let actual_hash = sha1_of(&buf[20..20 + cursor.pos()]);
    if claimed_hash != actual_hash {
        return Err(Error::BadRsaPlaintext);
    }

    if inner.nonce != nonce {
        return Err(Error::NonceMismatch);
    }
    if inner.server_nonce != server_nonce {
        return Err(Error::ServerNonceMismatch);
    }

    let g_b = BigUint::from_bytes_be(&inner.g_b);
    check_dh_range(&g_b, &g_b, &dh_prime).map_err(|_| Error::DegenerateDhParameter)?;

    let gab = g_b.modpow(&a, &dh_prime);
    let mut key_bytes = [0u8; 256];
    let gab_bytes = gab.to_bytes_be();
    let skip = 256 - gab_bytes.len();
    key_bytes[skip..].copy_from_slice(&gab_bytes);

    let auth_key = AuthKey::from_bytes(key_bytes);
    let new_nonce_hash1 = auth_key.calc_new_nonce_hash(&new_nonce, 1);

    let mut salt_bytes = [0u8; 8];
    for ((dst, a), b) in salt_bytes.iter_mut().zip(&new_nonce[..8]).zip(&server_nonce[..8]) {
        *dst = a ^ b;
    }
    let first_salt = i64::from_le_bytes(salt_bytes);

    let _ = g_a; // g_a was already sent to the client in transition 2.

    Ok((
        Finished {
            answer: types::DhGenOk { nonce, server_nonce, new_nonce_hash1 },
            auth_key: auth_key.clone(),
            first_salt,
        },
        HandshakeState::Done { auth_key },
    ))
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn sha1_of(data: &[u8]) -> [u8; 20] {
    let mut h = Sha1::new();
    h.update(data);
    h.finalize().into()
}

fn trim_leading_zeros(bytes: &[u8]) -> Vec<u8> {
    let skip = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len() - 1);
    bytes[skip..].to_vec()
}

/// Degenerate-parameter check shared across `g`, `g_a`, and `g_b`: the value
/// must lie in `(1, p-1)`, and `g_a`/`g_b` additionally in the tighter
/// `(2^(2048-64), p - 2^(2048-64))` safety margin (the same checks the
/// teacher's client applies to the values it receives).
fn check_dh_range(g: &BigUint, g_pow: &BigUint, dh_prime: &BigUint) -> Result<(), Error> {
    let one = BigUint::from(1u32);
    let p_minus_1 = dh_prime - &one;
    if !(g > &one && g < &p_minus_1) {
        return Err(Error::DegenerateDhParameter);
    }
    let safety = one.clone() << (2048 - 64);
    let hi = dh_prime - &safety;
    if !(g_pow > &safety && g_pow < &hi) {
        return Err(Error::DegenerateDhParameter);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cfg() -> CryptoCfg {
        // 512-bit toy RSA key and a small DH prime so unit tests run fast;
        // production configuration uses real 2048-bit material.
        CryptoCfg::new(
            "30700263540772359530884480937948197045881527039228176049410414158059\
             14984838617654901683597724064120686280716270599899026417910929933871\
             48989101554249244437200503018639",
            "1",
            "30700263540772359530884480937948197045881527039228176049410414158059\
             14984838617654901683597724064120686280716270599899026417910929933871\
             48989101554249244437200503018639",
            "65537",
            1470626929934143021,
            2,
            [0xFFu8; 256],
        )
        .unwrap()
    }

    #[test]
    fn handshake_state_starts_await_req_pq() {
        let state = HandshakeState::new();
        assert!(matches!(state, HandshakeState::AwaitReqPq));
    }

    #[test]
    fn on_req_pq_advances_state_and_carries_nonce() {
        let cfg = test_cfg();
        let req = types::ReqPqMulti { nonce: [9u8; 16] };
        let rnd = [1u8; 16];
        let resp = types::ResPq {
            nonce: req.nonce,
            server_nonce: [0u8; 16],
            pq: vec![],
            server_public_key_fingerprints: vec![],
        };
        let (resp, state) = do_on_req_pq(&cfg, HandshakeState::AwaitReqPq, &req, &rnd, resp).unwrap();
        assert_eq!(resp.nonce, req.nonce);
        assert_eq!(resp.server_nonce, rnd);
        match state {
            HandshakeState::AwaitReqDhParams { nonce, server_nonce } => {
                assert_eq!(nonce, req.nonce);
                assert_eq!(server_nonce, rnd);
            }
            _ => panic!("expected AwaitReqDhParams"),
        }
    }

    #[test]
    fn on_req_pq_rejects_out_of_order() {
        let cfg = test_cfg();
        let req = types::ReqPqMulti { nonce: [9u8; 16] };
        let rnd = [1u8; 16];
        let resp = types::ResPq {
            nonce: req.nonce,
            server_nonce: [0u8; 16],
            pq: vec![],
            server_public_key_fingerprints: vec![],
        };
        let state = HandshakeState::AwaitReqDhParams { nonce: [9u8; 16], server_nonce: [1u8; 16] };
        let err = do_on_req_pq(&cfg, state, &req, &rnd, resp).unwrap_err();
        assert_eq!(err, Error::OutOfOrder);
    }

    #[test]
    fn check_dh_range_rejects_degenerate_values() {
        let p = BigUint::from(23u32);
        let one = BigUint::from(1u32);
        assert!(check_dh_range(&one, &one, &p).is_err());
        let p_minus_1 = &p - &one;
        assert!(check_dh_range(&p_minus_1, &p_minus_1, &p).is_err());
    }
}
