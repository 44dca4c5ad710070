//! The password-derived key schedule.
//!
//! `PwsafeKey` holds the password digest seeded once; `hash` stretches it against a given
//! salt and iteration count to produce the stretched key K*. `seal`/`unseal` wrap and unwrap
//! the 64-byte sealed key block that carries the encryption and MAC keys.

use sha2::{Digest, Sha256};

use crate::crypto::{self, BLOCK_SIZE};
use crate::secret::SecretArray;

/// Minimum iteration count accepted on read (the Password Safe format minimum).
pub const MIN_ITER: u32 = 2048;
/// Default iteration count used for new or rekeyed databases.
pub const DEFAULT_ITER: u32 = 86_000;

/// A password, digested once and ready to be stretched against any salt/iteration count.
#[derive(Clone)]
pub struct PwsafeKey {
    /// SHA-256 state seeded with the password bytes only, not yet salted.
    prepared_password: Sha256,
}

impl PwsafeKey {
    pub fn new(password: &[u8]) -> Self {
        let mut prepared_password = Sha256::new();
        prepared_password.update(password);
        PwsafeKey { prepared_password }
    }

    /// Stretch this password against `salt` and `iter`, yielding the 32-byte stretched key K*.
    pub fn hash(&self, salt: &[u8; 32], iter: u32) -> SecretArray<32> {
        let mut stretched = SecretArray::<32>::zero();

        let mut hasher = self.prepared_password.clone();
        hasher.update(salt);
        let mut digest: [u8; 32] = hasher.finalize().into();

        for _ in 0..iter {
            digest = crypto::sha256_chain(&digest);
        }

        stretched.with_buf_mut(|buf| buf.copy_from_slice(&digest));
        stretched
    }
}

/// Unwrap the 64-byte sealed key block into the encryption key and the MAC key, each
/// Twofish-ECB-decrypted under the stretched key.
pub fn unseal(stretched_key: &[u8], sealed: &[u8; 64]) -> (SecretArray<32>, SecretArray<32>) {
    let mut encryption_key = SecretArray::<32>::zero();
    let mut mac_key = SecretArray::<32>::zero();

    encryption_key.with_buf_mut(|buf| {
        decrypt_halves(stretched_key, &sealed[0..32], buf);
    });
    mac_key.with_buf_mut(|buf| {
        decrypt_halves(stretched_key, &sealed[32..64], buf);
    });

    (encryption_key, mac_key)
}

/// Wrap a fresh encryption key and MAC key into the 64-byte sealed block, Twofish-ECB-
/// encrypted under the stretched key.
pub fn seal(stretched_key: &[u8], encryption_key: &[u8], mac_key: &[u8]) -> [u8; 64] {
    let mut sealed = [0u8; 64];
    encrypt_halves(stretched_key, encryption_key, &mut sealed[0..32]);
    encrypt_halves(stretched_key, mac_key, &mut sealed[32..64]);
    sealed
}

fn decrypt_halves(key: &[u8], input: &[u8], output: &mut [u8]) {
    for (in_block, out_block) in input.chunks_exact(BLOCK_SIZE).zip(output.chunks_exact_mut(BLOCK_SIZE)) {
        let mut block: [u8; BLOCK_SIZE] = in_block.try_into().expect("16-byte chunk");
        crypto::twofish_ecb_decrypt_block(key, &mut block);
        out_block.copy_from_slice(&block);
    }
}

fn encrypt_halves(key: &[u8], input: &[u8], output: &mut [u8]) {
    for (in_block, out_block) in input.chunks_exact(BLOCK_SIZE).zip(output.chunks_exact_mut(BLOCK_SIZE)) {
        let mut block: [u8; BLOCK_SIZE] = in_block.try_into().expect("16-byte chunk");
        crypto::twofish_ecb_encrypt_block(key, &mut block);
        out_block.copy_from_slice(&block);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Seed scenario: iter=2048, fixed salt, password "password".
    #[test]
    fn stretched_key_vector() {
        let salt: [u8; 32] = [
            0xE0, 0x46, 0x91, 0x08, 0x3B, 0xAD, 0x2F, 0xF1, 0xCB, 0x9D, 0x53, 0xD1, 0x16, 0x37,
            0x97, 0x9D, 0x60, 0xEA, 0xC2, 0xA7, 0xAF, 0xFB, 0xC7, 0x91, 0x07, 0xDB, 0xCB, 0xA8,
            0x06, 0xA6, 0xEE, 0xF1,
        ];
        let expected: [u8; 32] = [
            0xF3, 0xC9, 0x8F, 0xC2, 0x8B, 0x3A, 0xBA, 0xBA, 0x85, 0x0E, 0xEE, 0xC8, 0x8B, 0x99,
            0x2D, 0xF7, 0xD7, 0xFB, 0x18, 0x31, 0x1C, 0xAA, 0x9D, 0xB5, 0x15, 0xAE, 0x81, 0xE7,
            0xEA, 0x3E, 0x33, 0xCB,
        ];

        let key = PwsafeKey::new(b"password");
        let stretched = key.hash(&salt, 2048);
        assert_eq!(stretched.to_array(), expected);
    }

    #[test]
    fn seal_unseal_round_trip() {
        let stretched = [5u8; 32];
        let encryption_key = [11u8; 32];
        let mac_key = [22u8; 32];

        let sealed = seal(&stretched, &encryption_key, &mac_key);
        let (unsealed_enc, unsealed_mac) = unseal(&stretched, &sealed);

        assert_eq!(unsealed_enc.to_array(), encryption_key);
        assert_eq!(unsealed_mac.to_array(), mac_key);
    }

    #[test]
    fn different_salts_give_different_keys() {
        let key = PwsafeKey::new(b"password");
        let a = key.hash(&[0u8; 32], 16);
        let b = key.hash(&[1u8; 32], 16);
        assert_ne!(a.to_array(), b.to_array());
    }
}
