//! Typed header and record fields, replacing runtime reflection over struct tags
//! with a static match on the type tag: one variant per documented field, an explicit error
//! for everything else.

use crate::error::{Error, FieldContext};
use crate::timestamp::Timestamp;

fn fixed<const N: usize>(context: FieldContext, data: &[u8]) -> Result<[u8; N], Error> {
    data.try_into().map_err(|_| Error::MalformedField {
        reason: match context {
            FieldContext::Header => "header field has the wrong fixed length",
            FieldContext::Record => "record field has the wrong fixed length",
        },
    })
}

fn string(data: &[u8]) -> String {
    String::from_utf8_lossy(data).into_owned()
}

fn timestamp(context: FieldContext, data: &[u8]) -> Result<Timestamp, Error> {
    Ok(Timestamp::from_le_bytes(fixed::<4>(context, data)?))
}

/// A single decoded header field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PwsafeHeaderField {
    Version(u8, u8),
    Uuid([u8; 16]),
    NonDefaultPreferences(String),
    TreeDisplayStatus(String),
    LastSave(Timestamp),
    LastSaveBy(String),
    LastSaveUser(String),
    LastSaveHost(String),
    DbName(String),
    DbDescription(String),
    Filters(String),
    RecentlyUsedEntries(String),
    NamedPasswordPolicy(String),
    EmptyGroup(String),
    EndOfHeader,
}

impl PwsafeHeaderField {
    pub fn new(tag: u8, data: &[u8]) -> Result<Self, Error> {
        use PwsafeHeaderField::*;
        let ctx = FieldContext::Header;
        Ok(match tag {
            0x00 => {
                let bytes = fixed::<2>(ctx, data)?;
                Version(bytes[0], bytes[1])
            }
            0x01 => Uuid(fixed::<16>(ctx, data)?),
            0x02 => NonDefaultPreferences(string(data)),
            0x03 => TreeDisplayStatus(string(data)),
            0x04 => LastSave(timestamp(ctx, data)?),
            0x06 => LastSaveBy(string(data)),
            0x07 => LastSaveUser(string(data)),
            0x08 => LastSaveHost(string(data)),
            0x09 => DbName(string(data)),
            0x0a => DbDescription(string(data)),
            0x0b => Filters(string(data)),
            0x0f => RecentlyUsedEntries(string(data)),
            0x10 => NamedPasswordPolicy(string(data)),
            0x11 => EmptyGroup(string(data)),
            0xff => EndOfHeader,
            other => return Err(Error::UnknownField { tag: other, context: ctx }),
        })
    }

    /// The wire tag and payload bytes for this field, for re-encoding.
    pub fn encode(&self) -> (u8, Vec<u8>) {
        use PwsafeHeaderField::*;
        match self {
            Version(hi, lo) => (0x00, vec![*hi, *lo]),
            Uuid(bytes) => (0x01, bytes.to_vec()),
            NonDefaultPreferences(s) => (0x02, s.as_bytes().to_vec()),
            TreeDisplayStatus(s) => (0x03, s.as_bytes().to_vec()),
            LastSave(ts) => (0x04, ts.to_le_bytes().to_vec()),
            LastSaveBy(s) => (0x06, s.as_bytes().to_vec()),
            LastSaveUser(s) => (0x07, s.as_bytes().to_vec()),
            LastSaveHost(s) => (0x08, s.as_bytes().to_vec()),
            DbName(s) => (0x09, s.as_bytes().to_vec()),
            DbDescription(s) => (0x0a, s.as_bytes().to_vec()),
            Filters(s) => (0x0b, s.as_bytes().to_vec()),
            RecentlyUsedEntries(s) => (0x0f, s.as_bytes().to_vec()),
            NamedPasswordPolicy(s) => (0x10, s.as_bytes().to_vec()),
            EmptyGroup(s) => (0x11, s.as_bytes().to_vec()),
            EndOfHeader => (0xff, Vec::new()),
        }
    }
}

/// A single decoded record field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PwsafeRecordField {
    Uuid([u8; 16]),
    Group(String),
    Title(String),
    Username(String),
    Notes(String),
    Password(String),
    CreateTime(Timestamp),
    PasswordModTime(Timestamp),
    AccessTime(Timestamp),
    PasswordExpiry(Timestamp),
    ModTime(Timestamp),
    Url(String),
    Autotype(String),
    PasswordHistory(String),
    PasswordPolicy(String),
    PasswordExpiryInterval([u8; 4]),
    RunCommand(String),
    DoubleClickAction([u8; 2]),
    Email(String),
    ProtectedEntry(u8),
    ShiftDoubleClickAction([u8; 2]),
    PasswordPolicyName(String),
    EndOfRecord,
}

impl PwsafeRecordField {
    pub fn new(tag: u8, data: &[u8]) -> Result<Self, Error> {
        use PwsafeRecordField::*;
        let ctx = FieldContext::Record;
        Ok(match tag {
            0x01 => Uuid(fixed::<16>(ctx, data)?),
            0x02 => Group(string(data)),
            0x03 => Title(string(data)),
            0x04 => Username(string(data)),
            0x05 => Notes(string(data)),
            0x06 => Password(string(data)),
            0x07 => CreateTime(timestamp(ctx, data)?),
            0x08 => PasswordModTime(timestamp(ctx, data)?),
            0x09 => AccessTime(timestamp(ctx, data)?),
            0x0a => PasswordExpiry(timestamp(ctx, data)?),
            0x0c => ModTime(timestamp(ctx, data)?),
            0x0d => Url(string(data)),
            0x0e => Autotype(string(data)),
            0x0f => PasswordHistory(string(data)),
            0x10 => PasswordPolicy(string(data)),
            0x11 => PasswordExpiryInterval(fixed::<4>(ctx, data)?),
            0x12 => RunCommand(string(data)),
            0x13 => DoubleClickAction(fixed::<2>(ctx, data)?),
            0x14 => Email(string(data)),
            0x15 => ProtectedEntry(fixed::<1>(ctx, data)?[0]),
            0x17 => ShiftDoubleClickAction(fixed::<2>(ctx, data)?),
            0x18 => PasswordPolicyName(string(data)),
            0xff => EndOfRecord,
            other => return Err(Error::UnknownField { tag: other, context: ctx }),
        })
    }

    pub fn encode(&self) -> (u8, Vec<u8>) {
        use PwsafeRecordField::*;
        match self {
            Uuid(bytes) => (0x01, bytes.to_vec()),
            Group(s) => (0x02, s.as_bytes().to_vec()),
            Title(s) => (0x03, s.as_bytes().to_vec()),
            Username(s) => (0x04, s.as_bytes().to_vec()),
            Notes(s) => (0x05, s.as_bytes().to_vec()),
            Password(s) => (0x06, s.as_bytes().to_vec()),
            CreateTime(ts) => (0x07, ts.to_le_bytes().to_vec()),
            PasswordModTime(ts) => (0x08, ts.to_le_bytes().to_vec()),
            AccessTime(ts) => (0x09, ts.to_le_bytes().to_vec()),
            PasswordExpiry(ts) => (0x0a, ts.to_le_bytes().to_vec()),
            ModTime(ts) => (0x0c, ts.to_le_bytes().to_vec()),
            Url(s) => (0x0d, s.as_bytes().to_vec()),
            Autotype(s) => (0x0e, s.as_bytes().to_vec()),
            PasswordHistory(s) => (0x0f, s.as_bytes().to_vec()),
            PasswordPolicy(s) => (0x10, s.as_bytes().to_vec()),
            PasswordExpiryInterval(bytes) => (0x11, bytes.to_vec()),
            RunCommand(s) => (0x12, s.as_bytes().to_vec()),
            DoubleClickAction(bytes) => (0x13, bytes.to_vec()),
            Email(s) => (0x14, s.as_bytes().to_vec()),
            ProtectedEntry(b) => (0x15, vec![*b]),
            ShiftDoubleClickAction(bytes) => (0x17, bytes.to_vec()),
            PasswordPolicyName(s) => (0x18, s.as_bytes().to_vec()),
            EndOfRecord => (0xff, Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_version_round_trips() {
        let field = PwsafeHeaderField::Version(0x10, 0x03);
        let (tag, payload) = field.encode();
        assert_eq!(tag, 0x00);
        assert_eq!(PwsafeHeaderField::new(tag, &payload).unwrap(), field);
    }

    #[test]
    fn header_rejects_unknown_tag() {
        assert!(matches!(
            PwsafeHeaderField::new(0x05, b""),
            Err(Error::UnknownField { tag: 0x05, context: FieldContext::Header })
        ));
    }

    #[test]
    fn record_rejects_own_symbol_tag() {
        // 0x16 exists in some historical implementations but is not part of this codec's
        // documented alphabet.
        assert!(matches!(
            PwsafeRecordField::new(0x16, b""),
            Err(Error::UnknownField { tag: 0x16, context: FieldContext::Record })
        ));
    }

    #[test]
    fn record_title_round_trips() {
        let field = PwsafeRecordField::Title("hello".to_string());
        let (tag, payload) = field.encode();
        assert_eq!(tag, 0x03);
        assert_eq!(PwsafeRecordField::new(tag, &payload).unwrap(), field);
    }

    #[test]
    fn fixed_width_field_rejects_wrong_length() {
        assert!(matches!(
            PwsafeRecordField::new(0x01, &[0u8; 15]),
            Err(Error::MalformedField { .. })
        ));
    }

    #[test]
    fn protected_entry_is_one_byte() {
        let field = PwsafeRecordField::ProtectedEntry(1);
        let (tag, payload) = field.encode();
        assert_eq!(payload, vec![1]);
        assert_eq!(PwsafeRecordField::new(tag, &payload).unwrap(), field);
    }
}
