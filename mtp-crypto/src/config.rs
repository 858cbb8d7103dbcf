//! Process-wide, immutable crypto configuration for the handshake server.

use num_bigint::BigUint;

use crate::rsa::PrivateKey;
use crate::sha1;

/// RSA private key plus the DH parameters the handshake negotiates over.
/// Built once at startup from configuration and never mutated afterwards.
pub struct CryptoCfg {
    /// Server's RSA private key, used to decrypt `req_DH_params.encrypted_data`.
    pub rsa_private: PrivateKey,
    /// Low 64 bits of `SHA1(serialized RSA public key)`, sent in `resPQ`
    /// and checked against the client's `req_DH_params.public_key_fingerprint`.
    pub fingerprint: u64,
    /// `pq`, as handed to clients in `resPQ`.
    pub pq: u64,
    /// Smaller prime factor of `pq`.
    pub p: u64,
    /// Larger prime factor of `pq`.
    pub q: u64,
    /// DH generator, a small integer (typically 2-7).
    pub dh_g: u32,
    /// 2048-bit DH prime, big-endian.
    pub dh_prime: [u8; 256],
}

impl CryptoCfg {
    /// Construct from raw configuration values.
    ///
    /// `rsa_n`/`rsa_d` are the RSA private key's modulus and exponent as
    /// decimal strings; `rsa_pub_n`/`rsa_pub_e` are the corresponding public
    /// key components (the public exponent is not secret and is usually a
    /// small fixed value such as `65537`), used only to compute `fingerprint`.
    /// `pq` is factored via [`crate::factorize`].
    pub fn new(
        rsa_n: &str,
        rsa_d: &str,
        rsa_pub_n: &str,
        rsa_pub_e: &str,
        pq: u64,
        dh_g: u32,
        dh_prime: [u8; 256],
    ) -> Option<Self> {
        let rsa_private = PrivateKey::new(rsa_n, rsa_d)?;
        let (p, q) = crate::factorize(pq);
        let fingerprint = compute_fingerprint(rsa_pub_n, rsa_pub_e)?;

        Some(Self {
            rsa_private,
            fingerprint,
            pq,
            p,
            q,
            dh_g,
            dh_prime,
        })
    }
}

/// TL bare-string encoding: 1-byte length prefix (or `0xfe` + 3-byte LE
/// length for `len >= 254`), then the bytes, then zero padding to a
/// multiple of 4.
fn tl_bytes(out: &mut Vec<u8>, data: &[u8]) {
    let len = data.len();
    if len < 254 {
        out.push(len as u8);
    } else {
        out.push(0xfe);
        out.extend_from_slice(&(len as u32).to_le_bytes()[..3]);
    }
    out.extend_from_slice(data);
    while out.len() % 4 != 0 {
        out.push(0);
    }
}

fn compute_fingerprint(n: &str, e: &str) -> Option<u64> {
    let n = BigUint::parse_bytes(n.as_bytes(), 10)?;
    let e = BigUint::parse_bytes(e.as_bytes(), 10)?;

    let mut buf = Vec::with_capacity(300);
    tl_bytes(&mut buf, &n.to_bytes_be());
    tl_bytes(&mut buf, &e.to_bytes_be());

    let digest = sha1!(&buf);
    Some(u64::from_le_bytes(digest[12..20].try_into().unwrap()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_deterministic() {
        let a = compute_fingerprint("65537", "3").unwrap();
        let b = compute_fingerprint("65537", "3").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_distinguishes_keys() {
        let a = compute_fingerprint("65537", "3").unwrap();
        let b = compute_fingerprint("65539", "3").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn tl_bytes_pads_to_four() {
        let mut out = Vec::new();
        tl_bytes(&mut out, &[1, 2, 3]);
        assert_eq!(out.len() % 4, 0);
        assert_eq!(out[0], 3);
    }
}
