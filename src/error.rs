//! The core's error taxonomy.
//!
//! One concrete enum, not a boxed report: every failure mode is a value a caller can match on.

use std::fmt;
use std::io;

/// Where an unknown or malformed field was encountered, for error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldContext {
    Header,
    Record,
}

impl fmt::Display for FieldContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldContext::Header => write!(f, "header"),
            FieldContext::Record => write!(f, "record"),
        }
    }
}

/// A Password Safe V3 codec error.
#[derive(Debug)]
pub enum Error {
    /// The first four bytes are not `"PWS3"`.
    FormatMagic,
    /// The stream ends before the fixed-size prologue, or before the EOF sentinel and MAC.
    TooShort { needed: usize, available: usize },
    /// SHA-256 of the stretched key does not match the stored verifier.
    WrongPassword,
    /// The ciphertext ends without an EOF sentinel block.
    Truncated,
    /// The ciphertext length is not a multiple of the cipher block size.
    UnalignedCiphertext { len: usize },
    /// A header or record field carries a type tag outside the documented alphabet.
    UnknownField { tag: u8, context: FieldContext },
    /// A field's declared length runs past the remaining buffer, or a fixed-width field has
    /// the wrong length.
    MalformedField { reason: &'static str },
    /// The recomputed HMAC does not match the trailing 32 bytes.
    MacMismatch,
    /// A record submitted for encryption is missing its title or its password.
    InvalidRecord { title: String, reason: &'static str },
    /// A cryptographic random draw failed.
    RngFailure,
    /// The underlying reader or writer failed.
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::FormatMagic => write!(f, "not a Password Safe V3 file (bad magic)"),
            Error::TooShort { needed, available } => write!(
                f,
                "stream too short: needed at least {needed} bytes, found {available}"
            ),
            Error::WrongPassword => write!(f, "wrong password"),
            Error::Truncated => write!(f, "ciphertext ended without an EOF sentinel"),
            Error::UnalignedCiphertext { len } => {
                write!(f, "ciphertext length {len} is not a multiple of 16")
            }
            Error::UnknownField { tag, context } => {
                write!(f, "unknown {context} field type 0x{tag:02x}")
            }
            Error::MalformedField { reason } => write!(f, "malformed field: {reason}"),
            Error::MacMismatch => write!(f, "HMAC verification failed"),
            Error::InvalidRecord { title, reason } => {
                write!(f, "record {title:?} rejected: {reason}")
            }
            Error::RngFailure => write!(f, "failed to draw cryptographic randomness"),
            Error::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

/// A specialized `Result` for this crate.
pub type Result<T> = std::result::Result<T, Error>;
