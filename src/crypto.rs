//! Cryptographic primitives used by the rest of the crate.
//!
//! A thin wrapper around `sha2`, `hmac`, `twofish` and `cbc` so the key schedule and the
//! container framing never construct a cipher type directly. Keyed operations take plain
//! byte slices; callers are responsible for keeping the key material itself in a
//! [`crate::secret::SecretArray`] and exposing it only for the duration of the call.

use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use cbc::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use cbc::cipher::generic_array::GenericArray;
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use twofish::Twofish;

use crate::error::{Error, Result};

pub const BLOCK_SIZE: usize = 16;

type TwofishCbcEnc = cbc::Encryptor<Twofish>;
type TwofishCbcDec = cbc::Decryptor<Twofish>;
type HmacSha256 = Hmac<Sha256>;

/// SHA-256 of `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// One step of the key-stretching loop: SHA-256 of the previous digest.
pub fn sha256_chain(prev: &[u8; 32]) -> [u8; 32] {
    sha256(prev)
}

/// HMAC-SHA-256 of `data` under `key`.
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

/// Constant-time HMAC-SHA-256 verification.
pub fn hmac_sha256_verify(key: &[u8], data: &[u8], tag: &[u8; 32]) -> bool {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.verify_slice(tag).is_ok()
}

/// Twofish-ECB-decrypt a single 16-byte block in place, keyed by `key` (any length Twofish
/// accepts, here always 32 bytes: the stretched key).
pub fn twofish_ecb_decrypt_block(key: &[u8], block: &mut [u8; BLOCK_SIZE]) {
    let cipher = Twofish::new_from_slice(key).expect("Twofish key length");
    cipher.decrypt_block(GenericArray::from_mut_slice(block));
}

/// Twofish-ECB-encrypt a single 16-byte block in place.
pub fn twofish_ecb_encrypt_block(key: &[u8], block: &mut [u8; BLOCK_SIZE]) {
    let cipher = Twofish::new_from_slice(key).expect("Twofish key length");
    cipher.encrypt_block(GenericArray::from_mut_slice(block));
}

/// Decrypt `data` in place under Twofish-CBC(`key`, `iv`).
///
/// `data.len()` must be a multiple of 16; the TLV stream is always block-aligned by
/// construction, so no padding is stripped (`block-padding`'s `ZeroPadding` behaves as a
/// no-op transformation here).
pub fn twofish_cbc_decrypt(key: &[u8], iv: &[u8; BLOCK_SIZE], data: &mut [u8]) -> Result<()> {
    if data.len() % BLOCK_SIZE != 0 {
        return Err(Error::UnalignedCiphertext { len: data.len() });
    }
    let cipher = TwofishCbcDec::new_from_slices(key, iv)
        .map_err(|_| Error::MalformedField { reason: "invalid CBC key/IV length" })?;
    cipher
        .decrypt_padded_mut::<block_padding::ZeroPadding>(data)
        .map_err(|_| Error::MalformedField { reason: "CBC padding rejected" })?;
    Ok(())
}

/// Encrypt `data` in place under Twofish-CBC(`key`, `iv`). `data.len()` must already be a
/// multiple of 16, since the TLV encoder always block-aligns fields; the buffer is not grown.
pub fn twofish_cbc_encrypt(key: &[u8], iv: &[u8; BLOCK_SIZE], data: &mut [u8]) -> Result<()> {
    let len = data.len();
    if len % BLOCK_SIZE != 0 {
        return Err(Error::UnalignedCiphertext { len });
    }
    let cipher = TwofishCbcEnc::new_from_slices(key, iv)
        .map_err(|_| Error::MalformedField { reason: "invalid CBC key/IV length" })?;
    cipher
        .encrypt_padded_mut::<block_padding::ZeroPadding>(data, len)
        .map_err(|_| Error::MalformedField { reason: "CBC encryption failed" })?;
    Ok(())
}

/// Draw `N` cryptographically random bytes. Fails with [`Error::RngFailure`] if the OS RNG
/// cannot be read, rather than panicking.
pub fn random_bytes<const N: usize>() -> Result<[u8; N]> {
    let mut out = [0u8; N];
    OsRng
        .try_fill_bytes(&mut out)
        .map_err(|_| Error::RngFailure)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vector() {
        let digest = sha256(b"abc");
        let expected = [
            0xba, 0x78, 0x16, 0xbf, 0x8f, 0x01, 0xcf, 0xea, 0x41, 0x41, 0x40, 0xde, 0x5d, 0xae,
            0x22, 0x23, 0xb0, 0x03, 0x61, 0xa3, 0x96, 0x17, 0x7a, 0x9c, 0xb4, 0x10, 0xff, 0x61,
            0xf2, 0x00, 0x15, 0xad,
        ];
        assert_eq!(digest, expected);
    }

    #[test]
    fn ecb_round_trip() {
        let key = [7u8; 32];
        let mut block = *b"0123456789abcdef";
        let original = block;
        twofish_ecb_encrypt_block(&key, &mut block);
        assert_ne!(block, original);
        twofish_ecb_decrypt_block(&key, &mut block);
        assert_eq!(block, original);
    }

    #[test]
    fn cbc_round_trip() {
        let key = [3u8; 32];
        let iv = [9u8; 16];
        let mut data = b"0123456789abcdefFEDCBA9876543210".to_vec();
        let original = data.clone();
        twofish_cbc_encrypt(&key, &iv, &mut data).unwrap();
        assert_ne!(data, original);
        twofish_cbc_decrypt(&key, &iv, &mut data).unwrap();
        assert_eq!(data, original);
    }

    #[test]
    fn hmac_verify_detects_tamper() {
        let key = [1u8; 32];
        let tag = hmac_sha256(&key, b"hello");
        assert!(hmac_sha256_verify(&key, b"hello", &tag));
        assert!(!hmac_sha256_verify(&key, b"hellp", &tag));
    }

    #[test]
    fn unaligned_ciphertext_rejected() {
        let key = [1u8; 32];
        let iv = [1u8; 16];
        let mut data = vec![0u8; 17];
        assert!(matches!(
            twofish_cbc_decrypt(&key, &iv, &mut data),
            Err(Error::UnalignedCiphertext { len: 17 })
        ));
    }
}
