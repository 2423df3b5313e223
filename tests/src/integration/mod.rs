//! # Integration Tests
//!
//! Whole gateways assembled through `GatewayContainer` and driven over
//! their HTTP routers. Partner gateways are reached through
//! `RouterTransport`, so no socket is opened.

pub mod federation;
pub mod flows;
pub mod support;
