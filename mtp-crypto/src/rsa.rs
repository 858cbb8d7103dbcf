//! RSA padding used by the MTP auth key exchange.

use num_bigint::BigUint;

/// An RSA private key (n, d), used server-side to decrypt the client's
/// `encrypted_data` in `req_DH_params`.
pub struct PrivateKey {
    n: BigUint,
    d: BigUint,
}

impl PrivateKey {
    /// Build from decimal `n` and `d` strings.
    pub fn new(n: &str, d: &str) -> Option<Self> {
        Some(Self {
            n: BigUint::parse_bytes(n.as_bytes(), 10)?,
            d: BigUint::parse_bytes(d.as_bytes(), 10)?,
        })
    }

    /// Raw RSA decrypt: treat `ciphertext` (256 bytes) as a big-endian
    /// integer, compute `m = c^d mod n`, and serialise `m` back to a
    /// 256-byte big-endian buffer (zero-padded on the left).
    ///
    /// No OAEP or other padding scheme is applied here — the caller is
    /// responsible for interpreting the resulting plaintext layout
    /// (`SHA1(inner) || inner || random_padding`).
    pub fn decrypt(&self, ciphertext: &[u8]) -> [u8; 256] {
        let c = BigUint::from_bytes_be(ciphertext);
        let m = c.modpow(&self.d, &self.n);
        let mut block = m.to_bytes_be();
        while block.len() < 256 {
            block.insert(0, 0);
        }
        block.truncate(256);
        block.try_into().expect("RSA modulus is 2048 bits")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decrypt_round_trips_against_encrypt() {
        // n = 143 (=11*13), e = 7, d = 103 — e*d mod phi(n) = 1
        let key = PrivateKey::new("143", "103").unwrap();
        let m = BigUint::from(5u32);
        let c = m.modpow(&BigUint::from(7u32), &BigUint::from(143u32));
        let c_bytes = {
            let mut v = c.to_bytes_be();
            while v.len() < 256 {
                v.insert(0, 0);
            }
            v
        };
        let plain = key.decrypt(&c_bytes);
        let recovered = BigUint::from_bytes_be(&plain);
        assert_eq!(recovered, m);
    }
}
