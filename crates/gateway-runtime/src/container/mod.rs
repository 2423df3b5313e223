//! # Gateway Container
//!
//! Configuration and the wired subsystem instances.
//!
//! - Storage, registry and plugins are chosen from configuration
//! - Subsystems see each other only through their ports

pub mod config;
pub mod services;

pub use config::{
    load_config, load_config_from, ConfigError, GatewayConfig, TESTING_OPERATOR_TOKEN,
};
pub use services::{ContainerError, GatewayContainer};
