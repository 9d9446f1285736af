//! Error Types for evlog
//!
//! All errors are local to the operation that raised them; nothing is
//! retried internally.
//!
//! ## Error Categories
//!
//! ### Dispatch Errors
//! - `NotFound`: selector does not map to a configured channel
//! - `Busy`: channel already has an open reader (fail-fast, no queueing)
//! - `ReadOnly`: write-style access requested through a reader handle
//!
//! ### Store Errors
//! - `RecordTooLarge`: entry would exceed the channel capacity; rejected
//!   before any channel state is mutated
//! - `Fault`: the final copy to the caller-supplied destination failed; the
//!   channel's offsets are left unchanged so the read can be retried
//!
//! ### Configuration Errors
//! - `InvalidCapacity`: channel capacity is zero or not a power of two
//! - `DuplicateSelector`: two configured channels share one selector
//!
//! All functions return `Result<T>`, aliased to `Result<T, Error>`, so `?`
//! propagation works throughout.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("channel {0} not found")]
    NotFound(u16),

    #[error("channel {0} already has an open reader")]
    Busy(u16),

    #[error("reader handles are read-only")]
    ReadOnly,

    #[error("copy to destination failed: {0}")]
    Fault(#[source] std::io::Error),

    #[error("record entry of {entry_len} bytes exceeds channel capacity {capacity}")]
    RecordTooLarge { entry_len: usize, capacity: usize },

    #[error("channel capacity {0} is not a non-zero power of two")]
    InvalidCapacity(usize),

    #[error("duplicate channel selector {0}")]
    DuplicateSelector(u16),
}

pub type Result<T> = std::result::Result<T, Error>;
