//! Ports layer for the Mapping Synchronizer.
//!
//! - Inbound (Driving) ports: `MappingSyncApi`

pub mod inbound;

pub use inbound::*;
