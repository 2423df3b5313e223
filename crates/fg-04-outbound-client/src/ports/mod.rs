//! Ports layer for the Outbound Request Engine.
//!
//! - Inbound (Driving) ports: `OutboundApi`
//! - Outbound (Driven) ports: transport, key source, peer registry

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
