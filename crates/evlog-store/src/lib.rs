pub mod channel;
pub mod config;
pub mod registry;
pub mod ring;

pub use channel::{AccessMode, Channel, ReaderHandle};
pub use config::{ChannelConfig, RegistryConfig};
pub use registry::{ChannelInfo, Registry, SubmitMode, SubmitOptions, UnsyncToken};
pub use ring::RingStore;
