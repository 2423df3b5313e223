//! Ports layer for the Dispatch Router subsystem.
//!
//! - Inbound (Driving) ports: the record query API used by the HTTP layer
//! - Outbound (Driven) ports: providers handed over by plugin loaders

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
