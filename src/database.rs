//! The in-memory record store and its lifecycle operations, plus the file adapter that
//! reads/writes whole files and atomically replaces them on save via a temp file and rename.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::header::Header;
use crate::key::{self, PwsafeKey};
use crate::reader;
use crate::record::Record;
use crate::secret::SecretArray;
use crate::timestamp::Timestamp;
use crate::writer;

/// A fully decrypted Password Safe V3 database: header metadata plus a title-keyed record
/// store. Secret material (the stretched key and the password-seeded [`PwsafeKey`]) lives
/// only as long as this value does.
pub struct Database {
    header: Header,
    records: BTreeMap<String, Record>,
    salt: [u8; 32],
    iter: u32,
    key: PwsafeKey,
    stretched_key: SecretArray<32>,
    origin_path: Option<PathBuf>,
    latest_mod: Timestamp,
}

impl Database {
    /// Create a fresh, empty database with a new UUID and the default iteration count.
    pub fn new(password: &[u8]) -> Result<Database> {
        let salt = crate::crypto::random_bytes::<32>()?;
        let iter = key::DEFAULT_ITER;
        let key = PwsafeKey::new(password);
        let stretched_key = key.hash(&salt, iter);

        let mut header = Header::default();
        header.uuid = uuid::Uuid::new_v4().into_bytes();

        Ok(Database {
            header,
            records: BTreeMap::new(),
            salt,
            iter,
            key,
            stretched_key,
            origin_path: None,
            latest_mod: Timestamp::ZERO,
        })
    }

    /// Decrypt and authenticate `bytes` under `password`.
    pub fn open(bytes: &[u8], password: &[u8]) -> Result<Database> {
        let decoded = reader::decode(bytes, password)?;
        info!(records = decoded.records.len(), "opened database");

        let mut records = BTreeMap::new();
        for record in decoded.records {
            records.insert(record.title.clone(), record);
        }

        Ok(Database {
            header: decoded.header,
            records,
            salt: decoded.salt,
            iter: decoded.iter,
            key: decoded.key,
            stretched_key: decoded.stretched_key,
            origin_path: None,
            latest_mod: Timestamp::ZERO,
        })
    }

    /// Read a whole file and decrypt it, remembering the path for subsequent `save_file`
    /// calls.
    pub fn open_file(path: impl AsRef<Path>, password: &[u8]) -> Result<Database> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let mut db = Database::open(&bytes, password)?;
        db.origin_path = Some(path.to_path_buf());
        Ok(db)
    }

    /// Marshal and encrypt the current contents under a freshly drawn salt/IV/keys.
    pub fn save(&mut self, writer_sink: &mut impl Write) -> Result<()> {
        self.header.last_save = Timestamp::now();
        let records: Vec<Record> = self.records.values().cloned().collect();
        let bytes = writer::encode(&self.header, &records, &self.key, self.iter)?;
        writer_sink.write_all(&bytes)?;
        info!(records = records.len(), "saved database");
        Ok(())
    }

    /// Write to `path` (or the remembered origin path) via a temp file in the same directory,
    /// fsynced and renamed over the destination.
    pub fn save_file(&mut self, path: Option<&Path>) -> Result<()> {
        let target = match path.map(Path::to_path_buf).or_else(|| self.origin_path.clone()) {
            Some(target) => target,
            None => {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "no destination path remembered for save_file",
                )))
            }
        };

        self.header.last_save = Timestamp::now();
        let records: Vec<Record> = self.records.values().cloned().collect();
        let bytes = writer::encode(&self.header, &records, &self.key, self.iter)?;

        let dir = target.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&target).map_err(|e| Error::Io(e.error))?;

        self.origin_path = Some(target);
        info!(records = records.len(), "saved database to file");
        Ok(())
    }

    /// Rekey under a new password: fresh salt, recomputed stretched key, mod-timestamp bumped.
    pub fn set_password(&mut self, password: &[u8]) -> Result<()> {
        let salt = crate::crypto::random_bytes::<32>()?;
        let key = PwsafeKey::new(password);
        let stretched_key = key.hash(&salt, self.iter);

        self.salt = salt;
        self.key = key;
        self.stretched_key = stretched_key;
        self.bump_mod_time();
        Ok(())
    }

    /// Insert or update a record by title, reconciling `create_time`/`mod_time` and
    /// generating a UUID if unset.
    pub fn set_record(&mut self, mut record: Record) {
        let now = Timestamp::now();
        if record.uuid == [0u8; 16] {
            record.uuid = uuid::Uuid::new_v4().into_bytes();
        }

        match self.records.get(&record.title) {
            Some(existing) => {
                if existing.create_time.is_zero() {
                    record.create_time = now;
                } else {
                    record.create_time = existing.create_time;
                }
            }
            None => {
                if record.create_time.is_zero() {
                    record.create_time = now;
                }
            }
        }
        record.mod_time = now;

        self.records.insert(record.title.clone(), record);
        self.bump_mod_time();
    }

    /// Remove a record by title. Bumps the mod-timestamp even if no record existed.
    pub fn delete_record(&mut self, title: &str) {
        let removed = self.records.remove(title).is_some();
        if !removed {
            warn!(title, "delete_record: no such record");
        }
        self.bump_mod_time();
    }

    pub fn get_record(&self, title: &str) -> Option<&Record> {
        self.records.get(title)
    }

    /// Titles in ascending lexicographic order.
    pub fn list(&self) -> Vec<&str> {
        self.records.keys().map(String::as_str).collect()
    }

    /// Distinct groups, ascending, deduplicated.
    pub fn groups(&self) -> Vec<&str> {
        let mut groups: Vec<&str> = self
            .records
            .values()
            .map(|r| r.group.as_str())
            .collect();
        groups.sort_unstable();
        groups.dedup();
        groups
    }

    /// Titles belonging to `group`, ascending.
    pub fn list_by_group(&self, group: &str) -> Vec<&str> {
        self.records
            .values()
            .filter(|r| r.group == group)
            .map(|r| r.title.as_str())
            .collect()
    }

    /// `true` iff a mutation has happened since the last save.
    pub fn needs_save(&self) -> bool {
        self.latest_mod > self.header.last_save
    }

    /// The header name if set, else the final path component of the remembered origin path,
    /// else the empty string.
    pub fn get_name(&self) -> String {
        if !self.header.name.is_empty() {
            return self.header.name.clone();
        }
        self.origin_path
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Structural equality plus a human-readable reason on mismatch.
    pub fn equal(&self, other: &Database) -> (bool, Option<String>) {
        if self.header.name != other.header.name {
            return (false, Some("header name differs".to_string()));
        }
        if self.records.len() != other.records.len() {
            return (false, Some("record count differs".to_string()));
        }
        for (title, record) in &self.records {
            match other.records.get(title) {
                Some(other_record) if other_record == record => {}
                Some(_) => return (false, Some(format!("record {title:?} differs"))),
                None => return (false, Some(format!("record {title:?} missing"))),
            }
        }
        (true, None)
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Mutable access to the header, for callers setting name, description, preferences, or
    /// other metadata fields directly.
    pub fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    /// Set the database's display name, bumping the mod-timestamp.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.header.name = name.into();
        self.bump_mod_time();
    }

    pub fn iter(&self) -> u32 {
        self.iter
    }

    fn bump_mod_time(&mut self) {
        self.latest_mod = Timestamp::now();
    }
}
