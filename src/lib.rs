//! # overlay-comms-core
//!
//! The core of a pluggable communications layer for an anonymity/resilience overlay
//! network: a Channel → Link → Connection state machine, duty-cycle send scheduling,
//! fault injection, and three concrete transports (direct TCP, an HTTP bulletin board,
//! and a degenerate bootstrap-file sender) driven through a host SDK facade.

pub mod channel;
pub mod channel_properties;
pub mod cli;
pub mod comms_core;
pub mod config;
pub mod connection;
pub mod enc_pkg;
pub mod error;
pub mod filesystem_host;
pub mod host;
pub mod ids;
pub mod link;
pub mod link_address;
pub mod link_properties;
pub mod logging;
pub mod port_allocator;
pub mod storage_encryption;

pub use comms_core::CommsCore;
pub use config::InitConfig;
pub use error::{CoreError, CoreResult};

/// The current version of the comms core.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
