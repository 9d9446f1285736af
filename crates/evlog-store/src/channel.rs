//! Channel - One Isolated Log Stream
//!
//! A channel owns one `RingStore` behind a content mutex plus an
//! exclusive-open flag. Channels are created once at startup, never resized
//! or destroyed, and share nothing with each other: no cross-channel
//! ordering or eviction relationship exists.
//!
//! ## Locking Discipline
//!
//! The content mutex is the only serialization point. Two writes on the
//! same channel are serialized through it, and a write in progress blocks a
//! concurrent read and vice versa. The guard is scoped, so the lock is
//! released on every exit path including panic - a failing producer never
//! leaves the channel wedged.
//!
//! `write_unsynchronized` skips the mutex. It is sound only when the caller
//! externally guarantees that no other writer for this channel can be
//! concurrently active; the submit path gates it behind a token whose
//! constructor is `unsafe` (see `registry::UnsyncToken`).
//!
//! ## Exclusive Reader
//!
//! At most one open `ReaderHandle` exists per channel at a time. `open` is
//! a non-blocking compare-and-swap on the open flag: a second open fails
//! with `Busy` immediately, with no queueing. Dropping the handle releases
//! the channel for the next reader. The reader limit does not bound
//! concurrent writers.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use evlog_core::{Error, EventRecord, Result};
use parking_lot::Mutex;
use tracing::debug;

use crate::ring::RingStore;

/// Access mode requested when opening a channel.
///
/// Channels are drained read-only; writes go through the submit path.
/// Requesting `ReadWrite` is refused with `ReadOnly`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    ReadWrite,
}

/// One isolated log stream
pub struct Channel {
    selector: u16,
    name: String,
    description: String,

    /// Content lock: guards offsets and buffer content together
    store: Mutex<RingStore>,

    /// Exclusive-open flag: set while a `ReaderHandle` exists
    reader_open: AtomicBool,
}

impl Channel {
    pub(crate) fn new(
        selector: u16,
        name: String,
        description: String,
        capacity: usize,
    ) -> Result<Self> {
        Ok(Self {
            selector,
            name,
            description,
            store: Mutex::new(RingStore::new(capacity)?),
            reader_open: AtomicBool::new(false),
        })
    }

    pub fn selector(&self) -> u16 {
        self.selector
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn capacity(&self) -> usize {
        self.store.lock().capacity()
    }

    /// Append one record under the content lock.
    pub fn write_locked(&self, record: &EventRecord) -> Result<()> {
        self.store.lock().write(record)
    }

    /// Append one record without taking the content lock.
    ///
    /// # Safety
    ///
    /// The caller must guarantee that no other write or read on this
    /// channel is concurrently active - for example, a single
    /// always-serialized execution path that is this channel's only
    /// producer and holds off its reader. Misuse is a data race.
    pub(crate) unsafe fn write_unsynchronized(&self, record: &EventRecord) -> Result<()> {
        debug_assert!(
            !self.store.is_locked(),
            "unsynchronized write raced a locked writer on channel {}",
            self.selector
        );
        (*self.store.data_ptr()).write(record)
    }

    /// Acquire the exclusive reader handle, fail-fast.
    pub fn open(self: &Arc<Self>) -> Result<ReaderHandle> {
        if self
            .reader_open
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return Err(Error::Busy(self.selector));
        }
        debug!(selector = self.selector, channel = %self.name, "reader opened");
        Ok(ReaderHandle {
            channel: Arc::clone(self),
        })
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("selector", &self.selector)
            .field("name", &self.name)
            .field("reader_open", &self.reader_open.load(Ordering::Relaxed))
            .finish()
    }
}

/// The single reader handle of a channel.
///
/// Dropping the handle releases the channel for the next `open`.
pub struct ReaderHandle {
    channel: Arc<Channel>,
}

impl ReaderHandle {
    /// Drain up to `max_bytes` into `dst`, whole records only.
    ///
    /// Returns 0 immediately when the channel is empty - reads never block
    /// waiting for data; poll or compose notification externally. On a
    /// destination failure the channel offsets are unchanged and the read
    /// can be retried.
    pub fn read_into<W: Write>(&self, dst: &mut W, max_bytes: usize) -> Result<usize> {
        self.channel.store.lock().read_into(dst, max_bytes)
    }

    /// Drain up to `max_bytes` into freshly allocated bytes.
    pub fn read_bytes(&self, max_bytes: usize) -> Bytes {
        self.channel.store.lock().read_bytes(max_bytes)
    }

    /// Drain up to `max_bytes` and decode the result.
    pub fn read_records(&self, max_bytes: usize) -> Vec<EventRecord> {
        EventRecord::decode_all(&self.read_bytes(max_bytes))
    }

    pub fn selector(&self) -> u16 {
        self.channel.selector
    }

    /// Release the channel explicitly. Equivalent to dropping the handle.
    pub fn release(self) {}
}

impl Drop for ReaderHandle {
    fn drop(&mut self) {
        self.channel.reader_open.store(false, Ordering::Release);
        debug!(
            selector = self.channel.selector,
            channel = %self.channel.name,
            "reader released"
        );
    }
}
