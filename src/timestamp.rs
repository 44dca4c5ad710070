//! Timestamp fields are 4-byte little-endian Unix seconds on the wire.

use std::time::{SystemTime, UNIX_EPOCH};

/// A Unix-seconds timestamp. The zero value (`Timestamp(0)`) means "unset" and is omitted
/// from marshalled records and headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Timestamp(pub u32);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0);

    pub fn now() -> Timestamp {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock is after the Unix epoch")
            .as_secs();
        Timestamp(secs as u32)
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn to_le_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    pub fn from_le_bytes(bytes: [u8; 4]) -> Timestamp {
        Timestamp(u32::from_le_bytes(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_omitted() {
        assert!(Timestamp::ZERO.is_zero());
        assert!(!Timestamp::now().is_zero());
    }

    #[test]
    fn wire_round_trip() {
        let ts = Timestamp(1_700_000_000);
        assert_eq!(Timestamp::from_le_bytes(ts.to_le_bytes()), ts);
    }
}
