//! A single credential record: the same TLV discipline as the header, with mandatory
//! fields enforced on write.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{Error, Result};
use crate::field::PwsafeRecordField;
use crate::timestamp::Timestamp;
use crate::tlv::{FieldCursor, FieldWriter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub uuid: [u8; 16],
    pub group: String,
    pub title: String,
    pub username: String,
    pub password: String,
    pub notes: String,
    pub url: String,
    pub email: String,
    pub autotype: String,
    pub run_command: String,
    pub password_history: String,
    pub password_policy: String,
    pub password_policy_name: String,
    pub create_time: Timestamp,
    pub password_mod_time: Timestamp,
    pub access_time: Timestamp,
    pub mod_time: Timestamp,
    pub password_expiry: Timestamp,
    pub password_expiry_interval: [u8; 4],
    pub double_click_action: [u8; 2],
    pub shift_double_click_action: [u8; 2],
    pub protected_entry: u8,
}

impl Default for Record {
    fn default() -> Self {
        Record {
            uuid: [0u8; 16],
            group: String::new(),
            title: String::new(),
            username: String::new(),
            password: String::new(),
            notes: String::new(),
            url: String::new(),
            email: String::new(),
            autotype: String::new(),
            run_command: String::new(),
            password_history: String::new(),
            password_policy: String::new(),
            password_policy_name: String::new(),
            create_time: Timestamp::ZERO,
            password_mod_time: Timestamp::ZERO,
            access_time: Timestamp::ZERO,
            mod_time: Timestamp::ZERO,
            password_expiry: Timestamp::ZERO,
            password_expiry_interval: [0u8; 4],
            double_click_action: [0u8; 2],
            shift_double_click_action: [0u8; 2],
            protected_entry: 0,
        }
    }
}

impl Record {
    /// Decode one record starting at the current position of `data`, stopping at its END
    /// sentinel. Returns the record and the number of bytes consumed. `data` is empty only
    /// when there are no more records to read; callers check that before calling.
    pub fn decode(data: &[u8], hmac: &mut Hmac<Sha256>) -> Result<(Record, usize)> {
        let mut record = Record::default();
        let mut cursor = FieldCursor::new(data);

        loop {
            let (tag, payload) = match cursor.next(hmac)? {
                Some(pair) => pair,
                None => return Err(Error::Truncated),
            };
            let field = PwsafeRecordField::new(tag, payload)?;
            use PwsafeRecordField::*;
            match field {
                Uuid(bytes) => record.uuid = bytes,
                Group(s) => record.group = s,
                Title(s) => record.title = s,
                Username(s) => record.username = s,
                Notes(s) => record.notes = s,
                Password(s) => record.password = s,
                CreateTime(ts) => record.create_time = ts,
                PasswordModTime(ts) => record.password_mod_time = ts,
                AccessTime(ts) => record.access_time = ts,
                PasswordExpiry(ts) => record.password_expiry = ts,
                ModTime(ts) => record.mod_time = ts,
                Url(s) => record.url = s,
                Autotype(s) => record.autotype = s,
                PasswordHistory(s) => record.password_history = s,
                PasswordPolicy(s) => record.password_policy = s,
                PasswordExpiryInterval(bytes) => record.password_expiry_interval = bytes,
                RunCommand(s) => record.run_command = s,
                DoubleClickAction(bytes) => record.double_click_action = bytes,
                Email(s) => record.email = s,
                ProtectedEntry(b) => record.protected_entry = b,
                ShiftDoubleClickAction(bytes) => record.shift_double_click_action = bytes,
                PasswordPolicyName(s) => record.password_policy_name = s,
                EndOfRecord => break,
            }
        }

        Ok((record, cursor.position()))
    }

    /// Marshal this record as a TLV field stream. Every field equal to its zero value is
    /// omitted except UUID, Title, and Password, which are required; callers
    /// validate non-emptiness before save (see [`Record::validate`]).
    pub fn encode(&self, hmac: &mut Hmac<Sha256>) -> Result<Vec<u8>> {
        let mut writer = FieldWriter::new();

        emit(&mut writer, hmac, PwsafeRecordField::Uuid(self.uuid))?;
        emit(&mut writer, hmac, PwsafeRecordField::Title(self.title.clone()))?;
        emit(&mut writer, hmac, PwsafeRecordField::Password(self.password.clone()))?;

        emit_str(&mut writer, hmac, PwsafeRecordField::Group(self.group.clone()), &self.group)?;
        emit_str(&mut writer, hmac, PwsafeRecordField::Username(self.username.clone()), &self.username)?;
        emit_str(&mut writer, hmac, PwsafeRecordField::Notes(self.notes.clone()), &self.notes)?;
        emit_str(&mut writer, hmac, PwsafeRecordField::Url(self.url.clone()), &self.url)?;
        emit_str(&mut writer, hmac, PwsafeRecordField::Email(self.email.clone()), &self.email)?;
        emit_str(&mut writer, hmac, PwsafeRecordField::Autotype(self.autotype.clone()), &self.autotype)?;
        emit_str(&mut writer, hmac, PwsafeRecordField::RunCommand(self.run_command.clone()), &self.run_command)?;
        emit_str(&mut writer, hmac, PwsafeRecordField::PasswordHistory(self.password_history.clone()), &self.password_history)?;
        emit_str(&mut writer, hmac, PwsafeRecordField::PasswordPolicy(self.password_policy.clone()), &self.password_policy)?;
        emit_str(&mut writer, hmac, PwsafeRecordField::PasswordPolicyName(self.password_policy_name.clone()), &self.password_policy_name)?;

        emit_ts(&mut writer, hmac, PwsafeRecordField::CreateTime(self.create_time), self.create_time)?;
        emit_ts(&mut writer, hmac, PwsafeRecordField::PasswordModTime(self.password_mod_time), self.password_mod_time)?;
        emit_ts(&mut writer, hmac, PwsafeRecordField::AccessTime(self.access_time), self.access_time)?;
        emit_ts(&mut writer, hmac, PwsafeRecordField::PasswordExpiry(self.password_expiry), self.password_expiry)?;
        emit_ts(&mut writer, hmac, PwsafeRecordField::ModTime(self.mod_time), self.mod_time)?;

        if self.password_expiry_interval != [0u8; 4] {
            emit(&mut writer, hmac, PwsafeRecordField::PasswordExpiryInterval(self.password_expiry_interval))?;
        }
        if self.double_click_action != [0u8; 2] {
            emit(&mut writer, hmac, PwsafeRecordField::DoubleClickAction(self.double_click_action))?;
        }
        if self.shift_double_click_action != [0u8; 2] {
            emit(&mut writer, hmac, PwsafeRecordField::ShiftDoubleClickAction(self.shift_double_click_action))?;
        }
        if self.protected_entry != 0 {
            emit(&mut writer, hmac, PwsafeRecordField::ProtectedEntry(self.protected_entry))?;
        }

        writer.write_end()?;
        Ok(writer.into_bytes())
    }

    /// Reject records missing the fields mandatory on disk.
    pub fn validate(&self) -> Result<()> {
        if self.title.is_empty() {
            return Err(Error::InvalidRecord { title: self.title.clone(), reason: "title is empty" });
        }
        if self.password.is_empty() {
            return Err(Error::InvalidRecord { title: self.title.clone(), reason: "password is empty" });
        }
        Ok(())
    }
}

fn emit(writer: &mut FieldWriter, hmac: &mut Hmac<Sha256>, field: PwsafeRecordField) -> Result<()> {
    let (tag, payload) = field.encode();
    writer.write_field(hmac, tag, &payload)
}

fn emit_str(writer: &mut FieldWriter, hmac: &mut Hmac<Sha256>, field: PwsafeRecordField, value: &str) -> Result<()> {
    if !value.is_empty() {
        emit(writer, hmac, field)?;
    }
    Ok(())
}

fn emit_ts(writer: &mut FieldWriter, hmac: &mut Hmac<Sha256>, field: PwsafeRecordField, value: Timestamp) -> Result<()> {
    if !value.is_zero() {
        emit(writer, hmac, field)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_hmac() -> Hmac<Sha256> {
        Hmac::<Sha256>::new_from_slice(b"key").unwrap()
    }

    fn sample() -> Record {
        let mut record = Record::default();
        record.uuid = [7u8; 16];
        record.title = "Example".to_string();
        record.password = "hunter2".to_string();
        record.username = "alice".to_string();
        record
    }

    #[test]
    fn round_trip_minimal_record() {
        let record = sample();
        let mut hmac_write = new_hmac();
        let bytes = record.encode(&mut hmac_write).unwrap();

        let mut hmac_read = new_hmac();
        let (decoded, _) = Record::decode(&bytes, &mut hmac_read).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn zero_value_fields_are_omitted() {
        let record = sample();
        let mut hmac = new_hmac();
        let bytes = record.encode(&mut hmac).unwrap();

        let mut cursor = FieldCursor::new(&bytes);
        let mut hmac2 = new_hmac();
        let mut tags = Vec::new();
        while let Some((tag, _)) = cursor.next(&mut hmac2).unwrap() {
            tags.push(tag);
        }
        assert!(!tags.contains(&0x05)); // notes, never set
        assert!(!tags.contains(&0x0d)); // url, never set
    }

    #[test]
    fn empty_title_and_password_rejected_at_validate() {
        let record = Record::default();
        assert!(matches!(record.validate(), Err(Error::InvalidRecord { .. })));
    }

    #[test]
    fn unknown_record_field_is_rejected() {
        let mut writer = FieldWriter::new();
        let mut hmac = new_hmac();
        writer.write_field(&mut hmac, 0x16, b"own symbol").unwrap();
        writer.write_end().unwrap();
        let bytes = writer.into_bytes();

        let mut hmac2 = new_hmac();
        assert!(matches!(Record::decode(&bytes, &mut hmac2), Err(Error::UnknownField { tag: 0x16, .. })));
    }
}
