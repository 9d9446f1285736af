//! Registry Configuration
//!
//! Declares the fixed set of channels a process logs into. The set is
//! established once at startup and immutable thereafter; channels are never
//! added, resized, or removed while the process runs.
//!
//! ## Usage
//!
//! ```ignore
//! use evlog_store::{ChannelConfig, Registry, RegistryConfig};
//!
//! let config = RegistryConfig {
//!     channels: vec![
//!         ChannelConfig {
//!             selector: 1,
//!             name: "syscalls".to_string(),
//!             description: "intercepted syscall entry/return events".to_string(),
//!             capacity: 1 << 16,
//!         },
//!         ChannelConfig {
//!             selector: 2,
//!             name: "power".to_string(),
//!             ..Default::default()
//!         },
//!     ],
//! };
//!
//! let registry = Registry::new(config)?;
//! ```
//!
//! Configs deserialize from JSON/TOML with per-field defaults, so a
//! minimal entry only needs `selector` and `name`.

use serde::{Deserialize, Serialize};

/// Configuration for one channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Selector producers and readers address this channel by
    pub selector: u16,

    /// Short channel name
    pub name: String,

    /// Human-readable description, surfaced by the enumeration interface
    #[serde(default)]
    pub description: String,

    /// Buffer capacity in bytes; must be a non-zero power of two
    /// (default: 64 KiB)
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            selector: 0,
            name: String::new(),
            description: String::new(),
            capacity: default_capacity(),
        }
    }
}

/// The full channel set for one process
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub channels: Vec<ChannelConfig>,
}

fn default_capacity() -> usize {
    64 * 1024 // 64 KiB
}
