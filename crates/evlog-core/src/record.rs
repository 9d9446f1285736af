//! Record Wire Format
//!
//! This module defines `EventRecord` - the unit of data in evlog - and the
//! codec that finds record boundaries inside a circular byte array.
//!
//! ## Wire Layout
//!
//! Every record is a fixed 16-byte header followed by an opaque payload.
//! All fields are little-endian, fixed-width, with no implicit padding:
//!
//! ```text
//! ┌────────────────┬──────────┬────────────┬──────────┬────────────┬──────────┐
//! │ payload_length │ kind     │ seq        │ subject  │ timestamp  │ payload  │
//! │ (2 bytes)      │ (2 bytes)│ (2, signed)│ (2 bytes)│ (8 bytes)  │ (N bytes)│
//! └────────────────┴──────────┴────────────┴──────────┴────────────┴──────────┘
//! ```
//!
//! - **kind**: record type / syscall id / device id
//! - **seq**: positive = call entry, negative = the matching return
//! - **subject**: producer/owner identifier
//! - **timestamp**: milliseconds, stamped by the submit path unless suppressed
//!
//! Entry length = `HEADER_LEN + payload_length`. A record is never split
//! across reads, and never exceeds the capacity of the channel it is
//! written to.
//!
//! ## Wrap-Aware Length Decode
//!
//! The store addresses records at `offset & (CAP - 1)` inside a circular
//! array, so the 2-byte `payload_length` field of a record can straddle the
//! physical end of the array: one byte at `CAP - 1`, the next at `0`.
//! [`entry_len_at`] reassembles the value in that case. Getting this wrong
//! corrupts every boundary computed after the first wrap, so it is covered
//! by dedicated tests.

use bytes::{Buf, BufMut, Bytes};

/// Fixed header size in bytes: length (2) + kind (2) + seq (2) +
/// subject (2) + timestamp (8).
pub const HEADER_LEN: usize = 16;

/// A single structured event record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    /// Record type / syscall id / device id
    pub kind: u16,

    /// Positive for a call entry, negative for the matching return
    pub seq: i16,

    /// Producer/owner identifier
    pub subject: u16,

    /// Milliseconds; stamped on submit unless suppressed
    pub timestamp: u64,

    /// Opaque record body
    pub payload: Bytes,
}

impl EventRecord {
    pub fn new(kind: u16, seq: i16, subject: u16, payload: Bytes) -> Self {
        Self {
            kind,
            seq,
            subject,
            timestamp: 0,
            payload,
        }
    }

    /// Total on-wire size of this record
    pub fn entry_len(&self) -> usize {
        HEADER_LEN + self.payload.len()
    }

    /// Encode the fixed header. The payload follows it verbatim on the wire.
    pub fn encode_header(&self) -> [u8; HEADER_LEN] {
        let mut header = [0u8; HEADER_LEN];
        header[0..2].copy_from_slice(&(self.payload.len() as u16).to_le_bytes());
        header[2..4].copy_from_slice(&self.kind.to_le_bytes());
        header[4..6].copy_from_slice(&self.seq.to_le_bytes());
        header[6..8].copy_from_slice(&self.subject.to_le_bytes());
        header[8..16].copy_from_slice(&self.timestamp.to_le_bytes());
        header
    }

    /// Encode the whole record (header + payload) into `buf`.
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_slice(&self.encode_header());
        buf.put_slice(&self.payload);
    }

    /// Decode one record from a contiguous byte run, as produced by a drain.
    ///
    /// Returns `None` when `buf` is exhausted or holds less than one whole
    /// record. Drained output is always an integral number of records, so a
    /// `None` on a non-empty buffer means the input did not come from a
    /// drain.
    pub fn decode(buf: &mut impl Buf) -> Option<Self> {
        if buf.remaining() < HEADER_LEN {
            return None;
        }
        let payload_len = buf.get_u16_le() as usize;
        let kind = buf.get_u16_le();
        let seq = buf.get_i16_le();
        let subject = buf.get_u16_le();
        let timestamp = buf.get_u64_le();
        if buf.remaining() < payload_len {
            return None;
        }
        let payload = buf.copy_to_bytes(payload_len);
        Some(Self {
            kind,
            seq,
            subject,
            timestamp,
            payload,
        })
    }

    /// Decode every record in a contiguous byte run.
    pub fn decode_all(mut bytes: &[u8]) -> Vec<Self> {
        let mut records = Vec::new();
        while let Some(record) = Self::decode(&mut bytes) {
            records.push(record);
        }
        records
    }
}

/// Decode the total entry length of the record starting at `pos` inside the
/// circular array `ring`.
///
/// `pos` must be the physical offset of a record boundary. When the 2-byte
/// length field straddles the physical end of the array, the value is
/// assembled from one byte at the tail and one byte at offset 0.
pub fn entry_len_at(ring: &[u8], pos: usize) -> usize {
    let payload_len = match ring.len() - pos {
        1 => u16::from_le_bytes([ring[pos], ring[0]]),
        _ => u16::from_le_bytes([ring[pos], ring[pos + 1]]),
    };
    HEADER_LEN + payload_len as usize
}

/// Advance from the record boundary at unbounded offset `start` until at
/// least `min_skip` bytes of whole records have been skipped.
///
/// Returns the unbounded offset immediately after the last skipped record,
/// i.e. the next surviving record boundary. Never stops mid-record. This is
/// the eviction primitive: the store calls it with the overflow distance and
/// moves its read offset to the result.
///
/// `ring.len()` must be a power of two, and the records being skipped must
/// still be intact in `ring` (callers evict before overwriting).
pub fn advance_to_boundary(ring: &[u8], start: u64, min_skip: u64) -> u64 {
    let mask = (ring.len() - 1) as u64;
    let mut off = start;
    let mut skipped = 0u64;

    while skipped < min_skip {
        let len = entry_len_at(ring, (off & mask) as usize) as u64;
        off += len;
        skipped += len;
    }

    off
}
