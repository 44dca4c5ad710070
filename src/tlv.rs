//! The length-type-value field codec shared by headers and records.
//!
//! A field is a 4-byte little-endian length, a 1-byte type tag, the payload, and random
//! padding out to the next 16-byte boundary. [`FieldCursor`] walks a decrypted TLV stream
//! yielding raw `(tag, payload)` pairs; [`FieldWriter`] is the inverse, also accumulating the
//! HMAC over every payload as it is written.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::crypto::{self, BLOCK_SIZE};
use crate::error::{Error, Result};

const HEADER_LEN: usize = 5; // 4-byte length + 1-byte type

fn aligned_len(unpadded: usize) -> usize {
    let remainder = unpadded % BLOCK_SIZE;
    if remainder == 0 {
        unpadded
    } else {
        unpadded + (BLOCK_SIZE - remainder)
    }
}

/// Reads raw `(tag, payload)` pairs out of a decrypted TLV stream.
pub struct FieldCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> FieldCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        FieldCursor { data, pos: 0 }
    }

    /// `true` once every byte of the stream has been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Bytes consumed from the underlying stream so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Read the next field, feeding its payload into `hmac` unless it is the END sentinel
    /// (length 0, type 0xFF), which is not part of the authenticated bytes.
    pub fn next(&mut self, hmac: &mut Hmac<Sha256>) -> Result<Option<(u8, &'a [u8])>> {
        if self.is_empty() {
            return Ok(None);
        }

        let remaining = self.data.len() - self.pos;
        if remaining < HEADER_LEN {
            return Err(Error::MalformedField {
                reason: "field header runs past end of stream",
            });
        }

        let header = &self.data[self.pos..self.pos + HEADER_LEN];
        let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let tag = header[4];

        let payload_start = self.pos + HEADER_LEN;
        let payload_end = payload_start
            .checked_add(length)
            .ok_or(Error::MalformedField { reason: "field length overflow" })?;
        if payload_end > self.data.len() {
            return Err(Error::MalformedField {
                reason: "field length exceeds remaining buffer",
            });
        }

        let payload = &self.data[payload_start..payload_end];
        let consumed = aligned_len(HEADER_LEN + length);
        let next_pos = self.pos + consumed;
        if next_pos > self.data.len() {
            return Err(Error::MalformedField {
                reason: "field padding runs past end of stream",
            });
        }

        if !(tag == 0xff && length == 0) {
            hmac.update(payload);
        }

        self.pos = next_pos;
        Ok(Some((tag, payload)))
    }
}

/// Accumulates a plaintext TLV stream and the running HMAC over its payloads.
pub struct FieldWriter {
    buffer: Vec<u8>,
}

impl FieldWriter {
    pub fn new() -> Self {
        FieldWriter { buffer: Vec::new() }
    }

    /// Append one field: header, payload, then random padding to the next block boundary.
    /// Updates `hmac` over the payload bytes only.
    pub fn write_field(&mut self, hmac: &mut Hmac<Sha256>, tag: u8, payload: &[u8]) -> Result<()> {
        self.buffer
            .extend_from_slice(&(payload.len() as u32).to_le_bytes());
        self.buffer.push(tag);
        self.buffer.extend_from_slice(payload);
        hmac.update(payload);

        let unpadded = HEADER_LEN + payload.len();
        let total = aligned_len(unpadded);
        let pad_len = total - unpadded;
        if pad_len > 0 {
            let padding = random_padding(pad_len)?;
            self.buffer.extend_from_slice(&padding);
        }
        Ok(())
    }

    /// Append the END sentinel field (length 0, type 0xFF); not authenticated.
    pub fn write_end(&mut self) -> Result<()> {
        self.buffer.extend_from_slice(&0u32.to_le_bytes());
        self.buffer.push(0xff);
        let padding = random_padding(aligned_len(HEADER_LEN) - HEADER_LEN)?;
        self.buffer.extend_from_slice(&padding);
        Ok(())
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }
}

impl Default for FieldWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn random_padding(len: usize) -> Result<Vec<u8>> {
    let mut out = vec![0u8; len];
    // Fill in 32-byte chunks using the crypto module's RNG helper; len is always < 16 in
    // practice (one field's worth of alignment slack) so a single draw suffices, but loop to
    // stay correct if ever called with more.
    let mut filled = 0;
    while filled < len {
        let chunk = crypto::random_bytes::<32>()?;
        let take = (len - filled).min(32);
        out[filled..filled + take].copy_from_slice(&chunk[..take]);
        filled += take;
    }
    Ok(out)
}
