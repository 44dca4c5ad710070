//! The container reader: prologue parsing, password verification, sealed-key unwrap, CBC
//! decryption, and body decode into a header plus records.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::crypto::{self, BLOCK_SIZE};
use crate::error::{Error, Result};
use crate::header::Header;
use crate::key::{self, PwsafeKey};
use crate::record::Record;
use crate::secret::SecretArray;

const MAGIC: &[u8; 4] = b"PWS3";
const EOF_SENTINEL: &[u8; 16] = b"PWS3-EOFPWS3-EOF";
const PROLOGUE_LEN: usize = 152;
const HMAC_LEN: usize = 32;

const SALT_RANGE: std::ops::Range<usize> = 4..36;
const ITER_RANGE: std::ops::Range<usize> = 36..40;
const VERIFIER_RANGE: std::ops::Range<usize> = 40..72;
const SEALED_RANGE: std::ops::Range<usize> = 72..136;
const IV_RANGE: std::ops::Range<usize> = 136..152;

/// Everything recovered from a decrypted, authenticated database stream.
pub struct Decoded {
    pub header: Header,
    pub records: Vec<Record>,
    pub salt: [u8; 32],
    pub iter: u32,
    pub key: PwsafeKey,
    pub stretched_key: SecretArray<32>,
    pub encryption_key: SecretArray<32>,
    pub mac_key: SecretArray<32>,
}

/// Parse, authenticate, and decrypt a Password Safe V3 byte stream.
pub fn decode(data: &[u8], password: &[u8]) -> Result<Decoded> {
    if data.len() < PROLOGUE_LEN + BLOCK_SIZE + HMAC_LEN {
        return Err(Error::TooShort {
            needed: PROLOGUE_LEN + BLOCK_SIZE + HMAC_LEN,
            available: data.len(),
        });
    }
    if &data[0..4] != MAGIC {
        return Err(Error::FormatMagic);
    }

    let mut salt = [0u8; 32];
    salt.copy_from_slice(&data[SALT_RANGE]);
    let iter = u32::from_le_bytes(data[ITER_RANGE].try_into().unwrap());
    let verifier: [u8; 32] = data[VERIFIER_RANGE].try_into().unwrap();
    let sealed: [u8; 64] = data[SEALED_RANGE].try_into().unwrap();
    let iv: [u8; 16] = data[IV_RANGE].try_into().unwrap();

    let key = PwsafeKey::new(password);
    let stretched_key = key.hash(&salt, iter);
    if crypto::sha256(&stretched_key.to_array()) != verifier {
        return Err(Error::WrongPassword);
    }

    let (encryption_key, mac_key) = key::unseal(&stretched_key.to_array(), &sealed);

    let body_start = PROLOGUE_LEN;
    let eof_offset = find_eof_sentinel(&data[body_start..])?;
    let ciphertext_end = body_start + eof_offset;
    let hmac_start = ciphertext_end + BLOCK_SIZE;
    if data.len() < hmac_start + HMAC_LEN {
        return Err(Error::TooShort {
            needed: hmac_start + HMAC_LEN,
            available: data.len(),
        });
    }
    let stored_tag: [u8; 32] = data[hmac_start..hmac_start + HMAC_LEN].try_into().unwrap();

    let mut plaintext = data[body_start..ciphertext_end].to_vec();
    crypto::twofish_cbc_decrypt(&encryption_key.to_array(), &iv, &mut plaintext)?;

    let mut hmac = Hmac::<Sha256>::new_from_slice(&mac_key.to_array())
        .map_err(|_| Error::MalformedField { reason: "invalid MAC key length" })?;

    let (header, consumed) = Header::decode(&plaintext, &mut hmac)?;
    let mut offset = consumed;
    let mut records = Vec::new();
    while offset < plaintext.len() {
        let (record, record_len) = Record::decode(&plaintext[offset..], &mut hmac)?;
        offset += record_len;
        records.push(record);
    }

    if !verify(hmac, &stored_tag) {
        return Err(Error::MacMismatch);
    }

    Ok(Decoded {
        header,
        records,
        salt,
        iter,
        key,
        stretched_key,
        encryption_key,
        mac_key,
    })
}

fn verify(hmac: Hmac<Sha256>, tag: &[u8; 32]) -> bool {
    hmac.verify_slice(tag).is_ok()
}

/// Scan 16-byte blocks for the literal EOF sentinel, returning its offset relative to `body`.
fn find_eof_sentinel(body: &[u8]) -> Result<usize> {
    let mut offset = 0;
    while offset + BLOCK_SIZE <= body.len() {
        if &body[offset..offset + BLOCK_SIZE] == EOF_SENTINEL {
            return Ok(offset);
        }
        offset += BLOCK_SIZE;
    }
    Err(Error::Truncated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer;

    #[test]
    fn rejects_bad_magic() {
        let data = vec![0u8; 300];
        assert!(matches!(decode(&data, b"x"), Err(Error::FormatMagic)));
    }

    #[test]
    fn rejects_short_stream() {
        let data = b"PWS3".to_vec();
        assert!(matches!(decode(&data, b"x"), Err(Error::TooShort { .. })));
    }

    #[test]
    fn round_trip_through_writer() {
        let header = Header::default();
        let records = vec![];
        let key = PwsafeKey::new(b"hunter2");
        let bytes = writer::encode(&header, &records, &key, key::MIN_ITER).unwrap();
        let decoded = decode(&bytes, b"hunter2").unwrap();
        assert_eq!(decoded.header.version, header.version);
        assert!(decoded.records.is_empty());
    }

    #[test]
    fn wrong_password_is_rejected() {
        let header = Header::default();
        let key = PwsafeKey::new(b"hunter2");
        let bytes = writer::encode(&header, &[], &key, key::MIN_ITER).unwrap();
        assert!(matches!(decode(&bytes, b"wrong"), Err(Error::WrongPassword)));
    }

    #[test]
    fn tampered_ciphertext_fails_mac() {
        let header = Header::default();
        let key = PwsafeKey::new(b"hunter2");
        let mut bytes = writer::encode(&header, &[], &key, key::MIN_ITER).unwrap();
        let flip_at = PROLOGUE_LEN + 2;
        bytes[flip_at] ^= 0xff;
        assert!(matches!(decode(&bytes, b"hunter2"), Err(Error::MacMismatch) | Err(Error::MalformedField { .. })));
    }
}
