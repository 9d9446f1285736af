//! Channel Registry and Dispatch
//!
//! The registry is the immutable selector → channel mapping plus the two
//! entrypoints the outside world uses: `submit` for producers and `open`
//! for the per-channel exclusive reader.
//!
//! ## Dispatch Rules
//!
//! - Lookups are O(1) and total for configured selectors.
//! - On the read path an unknown selector is reported as `NotFound`.
//! - On the producer path an unknown selector is a silent no-op: a
//!   producer is never failed or blocked for logging reasons. The only
//!   error `submit` surfaces is the local oversized-record precondition,
//!   which is rejected before any channel state is touched.
//!
//! ## Submit Modes
//!
//! `SubmitMode::Locked` takes the channel content lock around the write;
//! use it whenever independent execution contexts may submit concurrently.
//! `SubmitMode::Unsynchronized` skips the lock for callers that cannot
//! block, such as a single always-serialized execution path. The unsafety
//! lives in `UnsyncToken::new`: constructing the token asserts that no
//! concurrent submit for the channel can exist, which the core cannot
//! verify. A debug-mode assertion catches misuse.
//!
//! ## Usage
//!
//! ```ignore
//! let registry = Arc::new(Registry::new(config)?);
//!
//! // Producer side
//! let record = EventRecord::new(OPEN_SYSCALL, 1, pid, payload);
//! registry.submit(1, record, SubmitOptions::default())?;
//!
//! // Reader side
//! let handle = registry.open(1, AccessMode::Read)?;
//! let records = handle.read_records(64 * 1024);
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use evlog_core::{Error, EventRecord, Result};
use serde::Serialize;
use tracing::{debug, info, trace};

use crate::channel::{AccessMode, Channel, ReaderHandle};
use crate::config::RegistryConfig;

/// Proof token for the unsynchronized submit path.
///
/// Holding one asserts the caller's guarantee of external serialization;
/// only its constructor is unsafe, so `submit` itself stays safe to call.
#[derive(Debug, Clone, Copy)]
pub struct UnsyncToken(());

impl UnsyncToken {
    /// # Safety
    ///
    /// The caller must guarantee that for every channel this token is used
    /// with, no other submit (locked or not) and no read can run
    /// concurrently with submits carrying the token.
    pub unsafe fn new() -> Self {
        Self(())
    }
}

/// Locking mode for `submit`
#[derive(Debug, Clone, Copy)]
pub enum SubmitMode {
    /// Acquire the channel content lock around the write
    Locked,

    /// Skip the lock; valid only under caller-guaranteed serialization
    Unsynchronized(UnsyncToken),
}

/// Options for one `submit` call
#[derive(Debug, Clone, Copy)]
pub struct SubmitOptions {
    pub mode: SubmitMode,

    /// Stamp the record timestamp with the current time (default).
    /// Disable for records that carry their own.
    pub stamp_timestamp: bool,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            mode: SubmitMode::Locked,
            stamp_timestamp: true,
        }
    }
}

/// Metadata for one configured channel, for the enumeration interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelInfo {
    pub selector: u16,
    pub name: String,
    pub description: String,
    pub capacity: usize,
}

/// Immutable selector → channel mapping, built once at startup
pub struct Registry {
    channels: HashMap<u16, Arc<Channel>>,
}

impl Registry {
    /// Build the channel set from configuration.
    ///
    /// Fails on a zero or non-power-of-two capacity and on duplicate
    /// selectors; succeeds into a registry that never changes again.
    pub fn new(config: RegistryConfig) -> Result<Self> {
        let mut channels = HashMap::with_capacity(config.channels.len());
        for cfg in config.channels {
            let channel = Channel::new(
                cfg.selector,
                cfg.name.clone(),
                cfg.description,
                cfg.capacity,
            )?;
            if channels.insert(cfg.selector, Arc::new(channel)).is_some() {
                return Err(Error::DuplicateSelector(cfg.selector));
            }
            info!(
                selector = cfg.selector,
                name = %cfg.name,
                capacity = cfg.capacity,
                "created channel"
            );
        }
        Ok(Self { channels })
    }

    /// Resolve a selector to its channel.
    pub fn lookup(&self, selector: u16) -> Option<&Arc<Channel>> {
        self.channels.get(&selector)
    }

    /// Submit one record to the channel addressed by `selector`.
    ///
    /// Fire-and-forget: an unknown selector drops the record silently, and
    /// nothing is ever retried or queued. The only surfaced failure is an
    /// oversized record, rejected before any channel state changes. Under
    /// `Locked` mode the call may wait for the channel content lock; the
    /// lock is always released on every exit path.
    pub fn submit(&self, selector: u16, mut record: EventRecord, opts: SubmitOptions) -> Result<()> {
        let Some(channel) = self.channels.get(&selector) else {
            trace!(selector, "submit to unknown selector dropped");
            return Ok(());
        };

        if opts.stamp_timestamp {
            record.timestamp = now_millis();
        }

        match opts.mode {
            SubmitMode::Locked => channel.write_locked(&record),
            // Soundness was asserted when the caller built its UnsyncToken.
            SubmitMode::Unsynchronized(_) => unsafe { channel.write_unsynchronized(&record) },
        }
    }

    /// Open the exclusive reader for a channel, fail-fast.
    ///
    /// Handles are read-only; `AccessMode::ReadWrite` is refused with
    /// `ReadOnly`. A channel that already has an open reader answers
    /// `Busy` immediately, with no queueing.
    pub fn open(&self, selector: u16, mode: AccessMode) -> Result<ReaderHandle> {
        let channel = self.channels.get(&selector).ok_or_else(|| {
            debug!(selector, "open on unknown selector");
            Error::NotFound(selector)
        })?;
        if mode != AccessMode::Read {
            return Err(Error::ReadOnly);
        }
        channel.open()
    }

    /// Enumerate configured channels, sorted by selector.
    ///
    /// Pure metadata for description listings; has no bearing on buffer
    /// state.
    pub fn channels(&self) -> Vec<ChannelInfo> {
        let mut infos: Vec<_> = self
            .channels
            .values()
            .map(|ch| ChannelInfo {
                selector: ch.selector(),
                name: ch.name().to_string(),
                description: ch.description().to_string(),
                capacity: ch.capacity(),
            })
            .collect();
        infos.sort_by_key(|info| info.selector);
        infos
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut selectors: Vec<_> = self.channels.keys().collect();
        selectors.sort();
        f.debug_struct("Registry")
            .field("selectors", &selectors)
            .finish()
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
