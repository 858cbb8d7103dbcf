//! AES-256 in IGE (Infinite Garble Extension) mode.
//!
//! IGE is not provided by the `aes` crate's block-mode wrappers, so it is
//! implemented directly on top of `Aes256`'s single-block encrypt/decrypt.
//!
//! Encrypting block `P_i`: `C_i = AES_enc(P_i XOR iv1) XOR iv2`, then
//! `iv1 <- C_i`, `iv2 <- P_i`. Decryption runs the same recurrence in reverse.

use aes::Aes256;
use aes::cipher::{BlockEncrypt, BlockDecrypt, KeyInit, generic_array::GenericArray};

const BLOCK: usize = 16;

fn xor16(a: &mut [u8; BLOCK], b: &[u8]) {
    for i in 0..BLOCK { a[i] ^= b[i]; }
}

/// Encrypt `data` in place using AES-256-IGE.
///
/// `key` must be 32 bytes, `iv` must be 32 bytes (`iv1 || iv2`).
/// `data.len()` must be a multiple of 16.
pub fn ige_encrypt(data: &mut [u8], key: &[u8], iv: &[u8]) {
    assert_eq!(data.len() % BLOCK, 0, "AES-IGE input must be block-aligned");
    let cipher = Aes256::new(GenericArray::from_slice(key));

    let mut iv1 = [0u8; BLOCK];
    let mut iv2 = [0u8; BLOCK];
    iv1.copy_from_slice(&iv[..BLOCK]);
    iv2.copy_from_slice(&iv[BLOCK..2 * BLOCK]);

    for chunk in data.chunks_mut(BLOCK) {
        let plain: [u8; BLOCK] = chunk.try_into().unwrap();

        let mut block = plain;
        xor16(&mut block, &iv1);
        let mut ga = GenericArray::clone_from_slice(&block);
        cipher.encrypt_block(&mut ga);
        let mut cipher_block: [u8; BLOCK] = ga.into();
        xor16(&mut cipher_block, &iv2);

        chunk.copy_from_slice(&cipher_block);
        iv1 = cipher_block;
        iv2 = plain;
    }
}

/// Decrypt `data` in place using AES-256-IGE. Symmetric to [`ige_encrypt`].
pub fn ige_decrypt(data: &mut [u8], key: &[u8], iv: &[u8]) {
    assert_eq!(data.len() % BLOCK, 0, "AES-IGE input must be block-aligned");
    let cipher = Aes256::new(GenericArray::from_slice(key));

    let mut iv1 = [0u8; BLOCK];
    let mut iv2 = [0u8; BLOCK];
    iv1.copy_from_slice(&iv[..BLOCK]);
    iv2.copy_from_slice(&iv[BLOCK..2 * BLOCK]);

    for chunk in data.chunks_mut(BLOCK) {
        let cipher_block: [u8; BLOCK] = chunk.try_into().unwrap();

        let mut block = cipher_block;
        xor16(&mut block, &iv2);
        let mut ga = GenericArray::clone_from_slice(&block);
        cipher.decrypt_block(&mut ga);
        let mut plain: [u8; BLOCK] = ga.into();
        xor16(&mut plain, &iv1);

        chunk.copy_from_slice(&plain);
        iv1 = cipher_block;
        iv2 = plain;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_decrypt_round_trip() {
        let key = [0x42u8; 32];
        let iv = [0x24u8; 32];
        let plain = b"0123456789abcdef0123456789abcdef".to_vec(); // 32 bytes
        let mut buf = plain.clone();
        ige_encrypt(&mut buf, &key, &iv);
        assert_ne!(buf, plain);
        ige_decrypt(&mut buf, &key, &iv);
        assert_eq!(buf, plain);
    }

    #[test]
    fn single_block_round_trip() {
        let key = [0x11u8; 32];
        let iv = [0x22u8; 32];
        let plain = [0xAAu8; 16];
        let mut buf = plain;
        ige_encrypt(&mut buf, &key, &iv);
        ige_decrypt(&mut buf, &key, &iv);
        assert_eq!(buf, plain);
    }

    #[test]
    #[should_panic(expected = "block-aligned")]
    fn rejects_non_aligned_input() {
        let key = [0u8; 32];
        let iv = [0u8; 32];
        let mut buf = [0u8; 15];
        ige_encrypt(&mut buf, &key, &iv);
    }
}
