//! Hand-written TL constructors for the handshake and its error paths.
//!
//! There is no schema-driven generator in this crate (see [`crate::tag`]);
//! each type below is written out directly, with its wire layout in field
//! declaration order and its tag pulled from [`crate::tag`].

use crate::deserialize::{Buffer, Deserializable, Error, Result};
use crate::serialize::Serializable;
use crate::{tag, Identifiable};

macro_rules! tl_struct {
    (
        $(#[$meta:meta])*
        $name:ident, $tag:expr => { $( $field:ident : $ty:ty ),* $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq)]
        pub struct $name {
            $( pub $field: $ty, )*
        }

        impl Identifiable for $name {
            const CONSTRUCTOR_ID: u32 = $tag;
        }

        impl Serializable for $name {
            fn serialize(&self, buf: &mut impl Extend<u8>) {
                Self::CONSTRUCTOR_ID.serialize(buf);
                $( self.$field.serialize(buf); )*
            }
        }

        impl Deserializable for $name {
            fn deserialize(buf: Buffer) -> Result<Self> {
                let id = u32::deserialize(buf)?;
                if id != Self::CONSTRUCTOR_ID {
                    return Err(Error::UnexpectedConstructor { id });
                }
                Ok(Self { $( $field: Deserializable::deserialize(buf)?, )* })
            }
        }
    };
}

tl_struct!(
    /// `req_pq_multi#be7e8ef1 nonce:int128 = ResPQ`
    ReqPqMulti, tag::REQ_PQ_MULTI => { nonce: [u8; 16] }
);

tl_struct!(
    /// `resPQ#05162463 nonce:int128 server_nonce:int128 pq:bytes
    /// server_public_key_fingerprints:Vector<long> = ResPQ`
    ResPq, tag::RES_PQ => {
        nonce: [u8; 16],
        server_nonce: [u8; 16],
        pq: Vec<u8>,
        server_public_key_fingerprints: Vec<i64>,
    }
);

tl_struct!(
    /// `p_q_inner_data#83c95aec pq:bytes p:bytes q:bytes nonce:int128
    /// server_nonce:int128 new_nonce:int256 = P_Q_inner_data`
    PQInnerData, tag::P_Q_INNER_DATA => {
        pq: Vec<u8>,
        p: Vec<u8>,
        q: Vec<u8>,
        nonce: [u8; 16],
        server_nonce: [u8; 16],
        new_nonce: [u8; 32],
    }
);

tl_struct!(
    /// `req_DH_params#d712e4be nonce:int128 server_nonce:int128 p:bytes
    /// q:bytes public_key_fingerprint:long encrypted_data:bytes
    /// = Server_DH_Params`
    ReqDhParams, tag::REQ_DH_PARAMS => {
        nonce: [u8; 16],
        server_nonce: [u8; 16],
        p: Vec<u8>,
        q: Vec<u8>,
        public_key_fingerprint: i64,
        encrypted_data: Vec<u8>,
    }
);

tl_struct!(
    /// `server_DH_params_ok#d0e8075c nonce:int128 server_nonce:int128
    /// encrypted_answer:bytes = Server_DH_Params`
    ServerDhParamsOk, tag::SERVER_DH_PARAMS_OK => {
        nonce: [u8; 16],
        server_nonce: [u8; 16],
        encrypted_answer: Vec<u8>,
    }
);

tl_struct!(
    /// `server_DH_params_fail#79cb045d nonce:int128 server_nonce:int128
    /// new_nonce_hash:int128 = Server_DH_Params`
    ServerDhParamsFail, tag::SERVER_DH_PARAMS_FAIL => {
        nonce: [u8; 16],
        server_nonce: [u8; 16],
        new_nonce_hash: [u8; 16],
    }
);

tl_struct!(
    /// `server_DH_inner_data#b5890dba nonce:int128 server_nonce:int128
    /// g:int dh_prime:bytes g_a:bytes server_time:int
    /// = Server_DH_inner_data`
    ServerDhInnerData, tag::SERVER_DH_INNER_DATA => {
        nonce: [u8; 16],
        server_nonce: [u8; 16],
        g: i32,
        dh_prime: Vec<u8>,
        g_a: Vec<u8>,
        server_time: i32,
    }
);

tl_struct!(
    /// `set_client_DH_params#f5045f1f nonce:int128 server_nonce:int128
    /// encrypted_data:bytes = Set_client_DH_params_answer`
    SetClientDhParams, tag::SET_CLIENT_DH_PARAMS => {
        nonce: [u8; 16],
        server_nonce: [u8; 16],
        encrypted_data: Vec<u8>,
    }
);

tl_struct!(
    /// `client_DH_inner_data#6643b654 nonce:int128 server_nonce:int128
    /// retry_id:long g_b:bytes = Client_DH_Inner_Data`
    ClientDhInnerData, tag::CLIENT_DH_INNER_DATA => {
        nonce: [u8; 16],
        server_nonce: [u8; 16],
        retry_id: i64,
        g_b: Vec<u8>,
    }
);

tl_struct!(
    /// `dh_gen_ok#3bcbf734 nonce:int128 server_nonce:int128
    /// new_nonce_hash1:int128 = Set_client_DH_params_answer`
    DhGenOk, tag::DH_GEN_OK => {
        nonce: [u8; 16],
        server_nonce: [u8; 16],
        new_nonce_hash1: [u8; 16],
    }
);

tl_struct!(
    /// `dh_gen_retry#46dc1fb9 nonce:int128 server_nonce:int128
    /// new_nonce_hash2:int128 = Set_client_DH_params_answer`
    DhGenRetry, tag::DH_GEN_RETRY => {
        nonce: [u8; 16],
        server_nonce: [u8; 16],
        new_nonce_hash2: [u8; 16],
    }
);

tl_struct!(
    /// `dh_gen_fail#a69dae02 nonce:int128 server_nonce:int128
    /// new_nonce_hash3:int128 = Set_client_DH_params_answer`
    DhGenFail, tag::DH_GEN_FAIL => {
        nonce: [u8; 16],
        server_nonce: [u8; 16],
        new_nonce_hash3: [u8; 16],
    }
);

tl_struct!(
    /// `bad_server_salt#edab447b bad_msg_id:long bad_msg_seqno:int
    /// error_code:int new_server_salt:long = BadMsgNotification`
    ///
    /// Sent in place of a decrypted response when [`crate`]'s caller
    /// detects the client is using a stale `server_salt`.
    BadServerSalt, tag::BAD_SERVER_SALT => {
        bad_msg_id: i64,
        bad_msg_seqno: i32,
        error_code: i32,
        new_server_salt: i64,
    }
);

tl_struct!(
    /// `rpc_error#2144ca19 error_code:int error_message:string = RpcError`
    RpcError, tag::RPC_ERROR => {
        error_code: i32,
        error_message: String,
    }
);

/// The three possible replies to `req_DH_params`.
#[derive(Clone, Debug, PartialEq)]
pub enum ServerDhParams {
    Ok(ServerDhParamsOk),
    Fail(ServerDhParamsFail),
}

impl Serializable for ServerDhParams {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        match self {
            Self::Ok(v) => v.serialize(buf),
            Self::Fail(v) => v.serialize(buf),
        }
    }
}

impl Deserializable for ServerDhParams {
    fn deserialize(buf: Buffer) -> Result<Self> {
        let id = u32::deserialize(buf)?;
        match id {
            ServerDhParamsOk::CONSTRUCTOR_ID => Ok(Self::Ok(ServerDhParamsOk {
                nonce: Deserializable::deserialize(buf)?,
                server_nonce: Deserializable::deserialize(buf)?,
                encrypted_answer: Deserializable::deserialize(buf)?,
            })),
            ServerDhParamsFail::CONSTRUCTOR_ID => Ok(Self::Fail(ServerDhParamsFail {
                nonce: Deserializable::deserialize(buf)?,
                server_nonce: Deserializable::deserialize(buf)?,
                new_nonce_hash: Deserializable::deserialize(buf)?,
            })),
            id => Err(Error::UnexpectedConstructor { id }),
        }
    }
}

/// The three possible replies to `set_client_DH_params`.
#[derive(Clone, Debug, PartialEq)]
pub enum SetClientDhParamsAnswer {
    Ok(DhGenOk),
    Retry(DhGenRetry),
    Fail(DhGenFail),
}

impl Serializable for SetClientDhParamsAnswer {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        match self {
            Self::Ok(v) => v.serialize(buf),
            Self::Retry(v) => v.serialize(buf),
            Self::Fail(v) => v.serialize(buf),
        }
    }
}

impl Deserializable for SetClientDhParamsAnswer {
    fn deserialize(buf: Buffer) -> Result<Self> {
        let id = u32::deserialize(buf)?;
        match id {
            DhGenOk::CONSTRUCTOR_ID => Ok(Self::Ok(DhGenOk {
                nonce: Deserializable::deserialize(buf)?,
                server_nonce: Deserializable::deserialize(buf)?,
                new_nonce_hash1: Deserializable::deserialize(buf)?,
            })),
            DhGenRetry::CONSTRUCTOR_ID => Ok(Self::Retry(DhGenRetry {
                nonce: Deserializable::deserialize(buf)?,
                server_nonce: Deserializable::deserialize(buf)?,
                new_nonce_hash2: Deserializable::deserialize(buf)?,
            })),
            DhGenFail::CONSTRUCTOR_ID => Ok(Self::Fail(DhGenFail {
                nonce: Deserializable::deserialize(buf)?,
                server_nonce: Deserializable::deserialize(buf)?,
                new_nonce_hash3: Deserializable::deserialize(buf)?,
            })),
            id => Err(Error::UnexpectedConstructor { id }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn req_pq_multi_round_trips() {
        let v = ReqPqMulti { nonce: [7u8; 16] };
        let bytes = v.to_bytes();
        let back = ReqPqMulti::from_bytes(&bytes).unwrap();
        assert_eq!(v, back);
    }

    #[test]
    fn res_pq_round_trips() {
        let v = ResPq {
            nonce: [1u8; 16],
            server_nonce: [2u8; 16],
            pq: vec![1, 2, 3, 4, 5, 6, 7, 8],
            server_public_key_fingerprints: vec![42, -1],
        };
        let bytes = v.to_bytes();
        let back = ResPq::from_bytes(&bytes).unwrap();
        assert_eq!(v, back);
    }

    #[test]
    fn server_dh_params_enum_round_trips_both_variants() {
        let ok = ServerDhParams::Ok(ServerDhParamsOk {
            nonce: [3u8; 16],
            server_nonce: [4u8; 16],
            encrypted_answer: vec![9; 16],
        });
        let bytes = ok.to_bytes();
        let mut cur = crate::deserialize::Cursor::from_slice(&bytes);
        assert_eq!(ServerDhParams::deserialize(&mut cur).unwrap(), ok);

        let fail = ServerDhParams::Fail(ServerDhParamsFail {
            nonce: [5u8; 16],
            server_nonce: [6u8; 16],
            new_nonce_hash: [8u8; 16],
        });
        let bytes = fail.to_bytes();
        let mut cur = crate::deserialize::Cursor::from_slice(&bytes);
        assert_eq!(ServerDhParams::deserialize(&mut cur).unwrap(), fail);
    }

    #[test]
    fn set_client_dh_params_answer_round_trips_all_variants() {
        for v in [
            SetClientDhParamsAnswer::Ok(DhGenOk {
                nonce: [1u8; 16],
                server_nonce: [2u8; 16],
                new_nonce_hash1: [3u8; 16],
            }),
            SetClientDhParamsAnswer::Retry(DhGenRetry {
                nonce: [1u8; 16],
                server_nonce: [2u8; 16],
                new_nonce_hash2: [3u8; 16],
            }),
            SetClientDhParamsAnswer::Fail(DhGenFail {
                nonce: [1u8; 16],
                server_nonce: [2u8; 16],
                new_nonce_hash3: [3u8; 16],
            }),
        ] {
            let bytes = v.to_bytes();
            let mut cur = crate::deserialize::Cursor::from_slice(&bytes);
            assert_eq!(SetClientDhParamsAnswer::deserialize(&mut cur).unwrap(), v);
        }
    }

    #[test]
    fn unexpected_constructor_is_rejected() {
        let mut bytes = ReqPqMulti { nonce: [0u8; 16] }.to_bytes();
        bytes[0] ^= 0xff;
        assert!(ReqPqMulti::from_bytes(&bytes).is_err());
    }
}
