//! The container writer: fresh salt/IV/keys, sealed-key wrap, CBC encryption, and the
//! EOF-sentinel-plus-HMAC epilogue.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::crypto::{self, BLOCK_SIZE};
use crate::error::Result;
use crate::header::Header;
use crate::key::{self, PwsafeKey};
use crate::record::Record;

const MAGIC: &[u8; 4] = b"PWS3";
const EOF_SENTINEL: &[u8; 16] = b"PWS3-EOFPWS3-EOF";

/// Marshal a header and its records into a complete Password Safe V3 byte stream, drawing a
/// fresh salt, CBC IV, encryption key, and MAC key. `key` is rehashed against the fresh salt;
/// it is never re-derived from a raw password here.
pub fn encode(header: &Header, records: &[Record], key: &PwsafeKey, iter: u32) -> Result<Vec<u8>> {
    for record in records {
        record.validate()?;
    }

    let salt = crypto::random_bytes::<32>()?;
    let iv = crypto::random_bytes::<BLOCK_SIZE>()?;
    let encryption_key = crypto::random_bytes::<32>()?;
    let mac_key = crypto::random_bytes::<32>()?;

    let stretched_key = key.hash(&salt, iter);
    let verifier = crypto::sha256(&stretched_key.to_array());
    let sealed = key::seal(&stretched_key.to_array(), &encryption_key, &mac_key);

    let mut hmac = Hmac::<Sha256>::new_from_slice(&mac_key)
        .expect("HMAC accepts keys of any length");

    let mut plaintext = header.encode(&mut hmac)?;
    for record in records {
        plaintext.extend_from_slice(&record.encode(&mut hmac)?);
    }

    crypto::twofish_cbc_encrypt(&encryption_key, &iv, &mut plaintext)?;
    let tag: [u8; 32] = hmac.finalize().into_bytes().into();

    let mut out = Vec::with_capacity(152 + plaintext.len() + 16 + 32);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&salt);
    out.extend_from_slice(&iter.to_le_bytes());
    out.extend_from_slice(&verifier);
    out.extend_from_slice(&sealed);
    out.extend_from_slice(&iv);
    out.extend_from_slice(&plaintext);
    out.extend_from_slice(EOF_SENTINEL);
    out.extend_from_slice(&tag);

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader;

    #[test]
    fn encodes_well_formed_prologue() {
        let header = Header::default();
        let key = PwsafeKey::new(b"hunter2");
        let bytes = encode(&header, &[], &key, key::MIN_ITER).unwrap();
        assert_eq!(&bytes[0..4], MAGIC);
        assert!(bytes.len() > 152 + 16 + 32);
    }

    #[test]
    fn rejects_record_missing_password() {
        let header = Header::default();
        let mut record = Record::default();
        record.title = "no password".to_string();
        let key = PwsafeKey::new(b"hunter2");
        let err = encode(&header, std::slice::from_ref(&record), &key, key::MIN_ITER).unwrap_err();
        assert!(matches!(err, crate::error::Error::InvalidRecord { .. }));
    }

    #[test]
    fn round_trips_with_records() {
        let header = Header::default();
        let mut record = Record::default();
        record.uuid = [9u8; 16];
        record.title = "Example".to_string();
        record.password = "s3cret".to_string();
        let key = PwsafeKey::new(b"hunter2");
        let bytes = encode(&header, std::slice::from_ref(&record), &key, key::MIN_ITER).unwrap();

        let decoded = reader::decode(&bytes, b"hunter2").unwrap();
        assert_eq!(decoded.records.len(), 1);
        assert_eq!(decoded.records[0], record);
    }
}
