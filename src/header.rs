//! The database header: one fixed-format-version marker plus a bag of optional metadata
//! fields, terminated by the END sentinel.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{Error, Result};
use crate::field::PwsafeHeaderField;
use crate::timestamp::Timestamp;
use crate::tlv::{FieldCursor, FieldWriter};

/// On-disk format version written by this crate: `{0x10, 0x03}`.
pub const VERSION: (u8, u8) = (0x10, 0x03);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub version: (u8, u8),
    pub uuid: [u8; 16],
    pub name: String,
    pub description: String,
    pub preferences: String,
    pub tree_display_status: String,
    pub filters: String,
    pub recently_used_entries: String,
    pub named_password_policy: String,
    pub last_save: Timestamp,
    pub last_save_by: String,
    pub last_save_user: String,
    pub last_save_host: String,
    pub empty_groups: Vec<String>,
}

impl Default for Header {
    fn default() -> Self {
        Header {
            version: VERSION,
            uuid: [0u8; 16],
            name: String::new(),
            description: String::new(),
            preferences: String::new(),
            tree_display_status: String::new(),
            filters: String::new(),
            recently_used_entries: String::new(),
            named_password_policy: String::new(),
            last_save: Timestamp::ZERO,
            last_save_by: String::new(),
            last_save_user: String::new(),
            last_save_host: String::new(),
            empty_groups: Vec::new(),
        }
    }
}

impl Header {
    /// Decode a header from the start of a decrypted TLV stream, stopping at the END
    /// sentinel. Returns the header and the number of bytes consumed.
    pub fn decode(data: &[u8], hmac: &mut Hmac<Sha256>) -> Result<(Header, usize)> {
        let mut header = Header::default();
        let mut cursor = FieldCursor::new(data);
        let mut saw_version = false;

        loop {
            let (tag, payload) = match cursor.next(hmac)? {
                Some(pair) => pair,
                None => return Err(Error::Truncated),
            };
            let field = PwsafeHeaderField::new(tag, payload)?;
            use PwsafeHeaderField::*;
            match field {
                Version(hi, lo) => {
                    header.version = (hi, lo);
                    saw_version = true;
                }
                Uuid(bytes) => header.uuid = bytes,
                NonDefaultPreferences(s) => header.preferences = s,
                TreeDisplayStatus(s) => header.tree_display_status = s,
                LastSave(ts) => header.last_save = ts,
                LastSaveBy(s) => header.last_save_by = s,
                LastSaveUser(s) => header.last_save_user = s,
                LastSaveHost(s) => header.last_save_host = s,
                DbName(s) => header.name = s,
                DbDescription(s) => header.description = s,
                Filters(s) => header.filters = s,
                RecentlyUsedEntries(s) => header.recently_used_entries = s,
                NamedPasswordPolicy(s) => header.named_password_policy = s,
                EmptyGroup(s) => header.empty_groups.push(s),
                EndOfHeader => break,
            }
        }

        let _ = saw_version; // version marker is accepted permissively
        Ok((header, cursor.position()))
    }

    /// Marshal this header as a TLV field stream, version field first, END sentinel last.
    pub fn encode(&self, hmac: &mut Hmac<Sha256>) -> Result<Vec<u8>> {
        let mut writer = FieldWriter::new();
        let (tag, payload) = PwsafeHeaderField::Version(self.version.0, self.version.1).encode();
        writer.write_field(hmac, tag, &payload)?;

        write_if_nonzero(&mut writer, hmac, PwsafeHeaderField::Uuid(self.uuid), self.uuid != [0u8; 16])?;
        write_if_str(&mut writer, hmac, PwsafeHeaderField::NonDefaultPreferences(self.preferences.clone()), &self.preferences)?;
        write_if_str(&mut writer, hmac, PwsafeHeaderField::TreeDisplayStatus(self.tree_display_status.clone()), &self.tree_display_status)?;
        if !self.last_save.is_zero() {
            let (tag, payload) = PwsafeHeaderField::LastSave(self.last_save).encode();
            writer.write_field(hmac, tag, &payload)?;
        }
        write_if_str(&mut writer, hmac, PwsafeHeaderField::LastSaveBy(self.last_save_by.clone()), &self.last_save_by)?;
        write_if_str(&mut writer, hmac, PwsafeHeaderField::LastSaveUser(self.last_save_user.clone()), &self.last_save_user)?;
        write_if_str(&mut writer, hmac, PwsafeHeaderField::LastSaveHost(self.last_save_host.clone()), &self.last_save_host)?;
        write_if_str(&mut writer, hmac, PwsafeHeaderField::DbName(self.name.clone()), &self.name)?;
        write_if_str(&mut writer, hmac, PwsafeHeaderField::DbDescription(self.description.clone()), &self.description)?;
        write_if_str(&mut writer, hmac, PwsafeHeaderField::Filters(self.filters.clone()), &self.filters)?;
        write_if_str(&mut writer, hmac, PwsafeHeaderField::RecentlyUsedEntries(self.recently_used_entries.clone()), &self.recently_used_entries)?;
        write_if_str(&mut writer, hmac, PwsafeHeaderField::NamedPasswordPolicy(self.named_password_policy.clone()), &self.named_password_policy)?;
        for group in &self.empty_groups {
            let (tag, payload) = PwsafeHeaderField::EmptyGroup(group.clone()).encode();
            writer.write_field(hmac, tag, &payload)?;
        }

        writer.write_end()?;
        Ok(writer.into_bytes())
    }
}

fn write_if_nonzero(writer: &mut FieldWriter, hmac: &mut Hmac<Sha256>, field: PwsafeHeaderField, condition: bool) -> Result<()> {
    if condition {
        let (tag, payload) = field.encode();
        writer.write_field(hmac, tag, &payload)?;
    }
    Ok(())
}

fn write_if_str(writer: &mut FieldWriter, hmac: &mut Hmac<Sha256>, field: PwsafeHeaderField, value: &str) -> Result<()> {
    if !value.is_empty() {
        let (tag, payload) = field.encode();
        writer.write_field(hmac, tag, &payload)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_hmac() -> Hmac<Sha256> {
        Hmac::<Sha256>::new_from_slice(b"key").unwrap()
    }

    #[test]
    fn round_trip_minimal_header() {
        let header = Header::default();
        let mut hmac_write = new_hmac();
        let bytes = header.encode(&mut hmac_write).unwrap();

        let mut hmac_read = new_hmac();
        let (decoded, _) = Header::decode(&bytes, &mut hmac_read).unwrap();
        assert_eq!(decoded.version, VERSION);
        assert_eq!(decoded.empty_groups.len(), 0);
    }

    #[test]
    fn round_trip_with_name_and_groups() {
        let mut header = Header::default();
        header.name = "My Safe".to_string();
        header.empty_groups = vec!["a".to_string(), "b".to_string()];

        let mut hmac_write = new_hmac();
        let bytes = header.encode(&mut hmac_write).unwrap();

        let mut hmac_read = new_hmac();
        let (decoded, _) = Header::decode(&bytes, &mut hmac_read).unwrap();
        assert_eq!(decoded.name, "My Safe");
        assert_eq!(decoded.empty_groups, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn unknown_header_field_is_rejected() {
        let mut writer = FieldWriter::new();
        let mut hmac = new_hmac();
        writer.write_field(&mut hmac, 0x05, b"surprise").unwrap();
        writer.write_end().unwrap();
        let bytes = writer.into_bytes();

        let mut hmac2 = new_hmac();
        assert!(matches!(Header::decode(&bytes, &mut hmac2), Err(Error::UnknownField { tag: 0x05, .. })));
    }

    #[test]
    fn missing_end_sentinel_is_truncated() {
        let mut writer = FieldWriter::new();
        let mut hmac = new_hmac();
        let (tag, payload) = PwsafeHeaderField::Version(0x10, 0x03).encode();
        writer.write_field(&mut hmac, tag, &payload).unwrap();
        let bytes = writer.into_bytes();

        let mut hmac2 = new_hmac();
        assert!(matches!(Header::decode(&bytes, &mut hmac2), Err(Error::Truncated)));
    }
}
