//! # Runtime Adapters
//!
//! Concrete implementations the container plugs into the subsystem ports.

pub mod metered;
pub mod plugins;
pub mod storage;

pub use metered::{MeteredMappings, MeteredOutbound, MeteredSync};
pub use plugins::{BackendEntry, BackendSource, PluginError, PluginManifest};
