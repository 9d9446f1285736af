//! Circular Byte Store
//!
//! This module implements `RingStore` - the fixed-capacity circular buffer
//! that every channel owns. It is the component with the real invariants:
//!
//! - a record is never split across a read,
//! - `read_off` always addresses the first byte of a complete record,
//! - `write_off - read_off <= CAP` after every write.
//!
//! ## How It Works
//!
//! The store keeps a power-of-two byte array plus two unbounded counters.
//! Counters only ever grow; the physical address of an offset is
//! `offset & (CAP - 1)`:
//!
//! ```text
//!                CAP = 16
//!      0   1   2   3   4   5   6   7   8   9  10  11  12  13  14  15
//!    ┌───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┐
//!    │ d │ d │   │   │   │ R2 header │ R2 payload... │ R3 header │ d │
//!    └───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┘
//!          ▲                   ▲
//!          write_off & mask    read_off & mask
//! ```
//!
//! A record whose bytes do not fit contiguously before the physical end of
//! the array is written in two copies, the second continuing at offset 0.
//! The length decode on the read side is wrap-aware for the same reason
//! (see `evlog_core::record::entry_len_at`).
//!
//! ## Eviction
//!
//! When a write would leave more than `CAP` unread bytes, the oldest whole
//! records are discarded first: the read offset is advanced along record
//! boundaries until the new entry fits. Eviction runs *before* the new
//! bytes are copied in - the boundary scan decodes lengths from bytes the
//! incoming record is about to overwrite - and it starts from the old read
//! offset, never from the write offset. Historical revisions of this
//! algorithm got both points wrong.
//!
//! ## What This Module Does Not Do
//!
//! No locking (the channel wraps the store in a mutex), no blocking reads
//! (an empty store returns zero bytes immediately), no durability.

use std::io::Write;

use bytes::Bytes;
use evlog_core::record::{advance_to_boundary, entry_len_at};
use evlog_core::{Error, EventRecord, Result, HEADER_LEN};
use tracing::trace;

/// Fixed-capacity circular record store
#[derive(Debug)]
pub struct RingStore {
    buf: Box<[u8]>,

    /// Unbounded write counter; physical position is `write_off & mask`
    write_off: u64,

    /// Unbounded read counter; always addresses a record boundary
    read_off: u64,
}

impl RingStore {
    /// Create a store with the given capacity in bytes.
    ///
    /// The capacity must be a non-zero power of two so offsets can be
    /// masked instead of divided.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 || !capacity.is_power_of_two() {
            return Err(Error::InvalidCapacity(capacity));
        }
        Ok(Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            write_off: 0,
            read_off: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Unread bytes currently held
    pub fn len(&self) -> usize {
        (self.write_off - self.read_off) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.write_off == self.read_off
    }

    fn mask(&self) -> u64 {
        (self.buf.len() - 1) as u64
    }

    /// Append one record, evicting the oldest whole records if needed.
    ///
    /// Rejects records larger than the whole store (`RecordTooLarge`)
    /// before touching any state. Never fails for any other reason and
    /// never blocks: a full store loses its oldest data, not the new
    /// record.
    pub fn write(&mut self, record: &EventRecord) -> Result<()> {
        let entry_len = record.entry_len();
        if entry_len > self.buf.len() {
            return Err(Error::RecordTooLarge {
                entry_len,
                capacity: self.buf.len(),
            });
        }

        // Evict before copying: the boundary scan must read the old
        // records' headers, which the incoming bytes may overwrite.
        let new_write = self.write_off + entry_len as u64;
        if new_write - self.read_off > self.buf.len() as u64 {
            let overflow = new_write - self.read_off - self.buf.len() as u64;
            let boundary = advance_to_boundary(&self.buf, self.read_off, overflow);
            trace!(
                evicted = boundary - self.read_off,
                needed = overflow,
                "evicting oldest records"
            );
            self.read_off = boundary;
        }

        self.copy_in(self.write_off, &record.encode_header());
        self.copy_in(self.write_off + HEADER_LEN as u64, &record.payload);
        self.write_off = new_write;

        debug_assert!(self.write_off - self.read_off <= self.buf.len() as u64);
        Ok(())
    }

    /// Drain up to `max_bytes` into `dst`, whole records only.
    ///
    /// Returns the number of bytes copied: the largest record-aligned range
    /// that fits within `max_bytes`. Zero when the store is empty or when
    /// even the first record exceeds `max_bytes` - callers that must make
    /// progress supply a destination at least as large as the largest
    /// possible record. Never blocks waiting for data.
    ///
    /// If the copy to `dst` fails the offsets are left unchanged and
    /// `Fault` is returned, so the same read can be retried.
    pub fn read_into<W: Write>(&mut self, dst: &mut W, max_bytes: usize) -> Result<usize> {
        let mut total = 0usize;
        while self.read_off + total as u64 != self.write_off {
            let pos = ((self.read_off + total as u64) & self.mask()) as usize;
            let entry_len = entry_len_at(&self.buf, pos);
            if total + entry_len > max_bytes {
                break;
            }
            total += entry_len;
        }
        if total == 0 {
            return Ok(0);
        }

        let pos = (self.read_off & self.mask()) as usize;
        let tail = self.buf.len() - pos;
        let copied = if total <= tail {
            dst.write_all(&self.buf[pos..pos + total])
        } else {
            dst.write_all(&self.buf[pos..])
                .and_then(|_| dst.write_all(&self.buf[..total - tail]))
        };
        copied.map_err(Error::Fault)?;

        self.read_off += total as u64;
        Ok(total)
    }

    /// Infallible drain for in-memory consumers.
    pub fn read_bytes(&mut self, max_bytes: usize) -> Bytes {
        let mut out = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.read_into(&mut out, max_bytes);
        Bytes::from(out)
    }

    /// Copy `src` into the array at unbounded offset `off`, splitting in
    /// two when the copy crosses the physical end.
    fn copy_in(&mut self, off: u64, src: &[u8]) {
        let pos = (off & self.mask()) as usize;
        let tail = self.buf.len() - pos;
        if src.len() <= tail {
            self.buf[pos..pos + src.len()].copy_from_slice(src);
        } else {
            let (head, rest) = src.split_at(tail);
            self.buf[pos..].copy_from_slice(head);
            self.buf[..rest.len()].copy_from_slice(rest);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(kind: u16, payload: Vec<u8>) -> EventRecord {
        EventRecord::new(kind, 1, 0, Bytes::from(payload))
    }

    fn drain_all(store: &mut RingStore) -> Vec<EventRecord> {
        let bytes = store.read_bytes(usize::MAX);
        EventRecord::decode_all(&bytes)
    }

    #[test]
    fn test_rejects_non_power_of_two_capacity() {
        assert!(matches!(RingStore::new(0), Err(Error::InvalidCapacity(0))));
        assert!(matches!(
            RingStore::new(100),
            Err(Error::InvalidCapacity(100))
        ));
        assert!(RingStore::new(128).is_ok());
    }

    #[test]
    fn test_rejects_oversized_record() {
        let mut store = RingStore::new(32).unwrap();
        let too_big = record(1, vec![0u8; 32]); // entry 48 > 32
        assert!(matches!(
            store.write(&too_big),
            Err(Error::RecordTooLarge {
                entry_len: 48,
                capacity: 32
            })
        ));
        // Nothing was mutated.
        assert!(store.is_empty());
    }

    #[test]
    fn test_empty_read_returns_zero() {
        let mut store = RingStore::new(64).unwrap();
        let mut out = Vec::new();
        assert_eq!(store.read_into(&mut out, 1024).unwrap(), 0);
        assert!(out.is_empty());
    }

    #[test]
    fn test_write_then_read_roundtrip() {
        let mut store = RingStore::new(256).unwrap();
        let records: Vec<_> = (0..4u16).map(|i| record(i, vec![i as u8; 5])).collect();
        for r in &records {
            store.write(r).unwrap();
        }

        assert_eq!(drain_all(&mut store), records);
        assert!(store.is_empty());
    }

    #[test]
    fn test_read_stops_at_record_boundary() {
        let mut store = RingStore::new(256).unwrap();
        for i in 0..4u16 {
            store.write(&record(i, vec![0u8; 4])).unwrap(); // entry 20 each
        }

        // 45 bytes fits two whole records (40), never two and a fraction.
        let bytes = store.read_bytes(45);
        assert_eq!(bytes.len(), 40);
        let records = EventRecord::decode_all(&bytes);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].kind, 0);
        assert_eq!(records[1].kind, 1);

        // The remaining two records are intact.
        assert_eq!(drain_all(&mut store).len(), 2);
    }

    #[test]
    fn test_first_record_larger_than_max_returns_zero() {
        let mut store = RingStore::new(256).unwrap();
        store.write(&record(1, vec![0u8; 30])).unwrap(); // entry 46
        assert_eq!(store.read_bytes(45).len(), 0);
        assert_eq!(store.len(), 46); // nothing consumed
    }

    #[test]
    fn test_eviction_drops_exactly_oldest_records() {
        // CAP 64, entries of 18 bytes (payload 2). Three fit (54); the
        // fourth write (72 > 64) must evict exactly the first record.
        let mut store = RingStore::new(64).unwrap();
        for i in 0..3u16 {
            store.write(&record(i, vec![i as u8; 2])).unwrap();
        }
        assert_eq!(store.len(), 54);

        store.write(&record(3, vec![3u8; 2])).unwrap();
        assert_eq!(store.len(), 54); // 72 - 18 evicted

        let survivors = drain_all(&mut store);
        assert_eq!(
            survivors.iter().map(|r| r.kind).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        for r in &survivors {
            assert_eq!(r.payload.len(), 2);
        }
    }

    #[test]
    fn test_eviction_never_over_evicts() {
        let mut store = RingStore::new(64).unwrap();
        // One big record (entry 48) then one small (entry 16): 64 exactly.
        store.write(&record(0, vec![0u8; 32])).unwrap();
        store.write(&record(1, vec![])).unwrap();
        assert_eq!(store.len(), 64);

        // A 16-byte entry overflows by 16; only the 48-byte record goes.
        store.write(&record(2, vec![])).unwrap();
        let survivors = drain_all(&mut store);
        assert_eq!(
            survivors.iter().map(|r| r.kind).collect::<Vec<_>>(),
            vec![1, 2]
        );
    }

    #[test]
    fn test_single_record_filling_whole_store() {
        let mut store = RingStore::new(64).unwrap();
        let full = record(7, vec![9u8; 64 - HEADER_LEN]);
        store.write(&full).unwrap();
        assert_eq!(store.len(), 64);

        // Writing it again evicts the first copy entirely.
        store.write(&full).unwrap();
        assert_eq!(store.len(), 64);
        assert_eq!(drain_all(&mut store), vec![full]);
    }

    #[test]
    fn test_wraparound_matches_unbounded_reference() {
        // Feed enough variable-sized records through a small store to wrap
        // many times, draining every few writes. The drained stream must
        // equal the reference stream of everything written (no eviction
        // happens because we drain often enough).
        let mut store = RingStore::new(128).unwrap();
        let mut reference = Vec::new();
        let mut drained = Vec::new();

        for i in 0..200u16 {
            let payload = vec![i as u8; (i % 23) as usize];
            let r = record(i, payload);
            let mut encoded = Vec::new();
            r.encode(&mut encoded);
            reference.extend_from_slice(&encoded);
            store.write(&r).unwrap();

            if i % 3 == 2 {
                drained.extend_from_slice(&store.read_bytes(128));
            }
        }
        drained.extend_from_slice(&store.read_bytes(128));

        assert_eq!(drained, reference);
    }

    #[test]
    fn test_length_field_straddling_wrap() {
        // Place a record header at physical offset 63 of a 64-byte store so
        // its 2-byte length field is split across the physical end, then
        // exercise the straddled decode on the read path.
        let mut store = RingStore::new(64).unwrap();

        store.write(&record(0, vec![0u8; 47])).unwrap(); // entry 63; next boundary at 63
        store.write(&record(1, vec![1, 2])).unwrap(); // entry 18; header starts at 63

        // The second write overflowed (63 + 18 > 64) and evicted record 0.
        assert_eq!(store.len(), 18);

        let survivors = drain_all(&mut store);
        assert_eq!(survivors.len(), 1);
        assert_eq!(survivors[0].kind, 1);
        assert_eq!(survivors[0].payload, Bytes::from_static(&[1, 2]));
    }

    #[test]
    fn test_eviction_scans_across_straddled_header() {
        // Same setup, but instead of draining, force the eviction scan
        // itself to decode the straddled header at physical offset 63.
        let mut store = RingStore::new(64).unwrap();
        store.write(&record(0, vec![0u8; 47])).unwrap();
        store.write(&record(1, vec![1, 2])).unwrap();
        // State: record 1 (entry 18) at unbounded offset 63, phys 63.

        // Entry 64 overflows by 18; the scan starts at offset 63 and must
        // read record 1's length across the wrap to evict exactly it.
        let full = record(2, vec![9u8; 48]);
        store.write(&full).unwrap();

        assert_eq!(store.len(), 64);
        assert_eq!(drain_all(&mut store), vec![full]);
    }

    #[test]
    fn test_fault_leaves_offsets_unchanged() {
        struct FailingWriter;
        impl Write for FailingWriter {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("destination inaccessible"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mut store = RingStore::new(64).unwrap();
        store.write(&record(5, vec![1, 2, 3])).unwrap();
        let before = store.len();

        let err = store.read_into(&mut FailingWriter, 64).unwrap_err();
        assert!(matches!(err, Error::Fault(_)));
        assert_eq!(store.len(), before);

        // Retry with a working destination succeeds.
        let records = drain_all(&mut store);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, 5);
    }
}
