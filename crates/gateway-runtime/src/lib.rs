//! # Federation Gateway Runtime Library
//!
//! Wiring, configuration and the HTTP surface of the gateway. The binary in
//! `main.rs` is a thin shell around this library so the integration tests
//! can build the same container.
//!
//! ## Architectural Patterns
//!
//! - **Hexagonal Architecture**: subsystems expose ports, the runtime plugs adapters in
//! - **Decorators for metrics**: subsystem crates never touch Prometheus
//! - **Single container**: every long-lived service is built once in `GatewayContainer`
//!
//! ## Module Structure
//!
//! ```text
//! gateway-runtime/
//! ├── adapters/
//! │   ├── metered.rs     # Prometheus decorators
//! │   ├── plugins.rs     # Backend manifest loader
//! │   └── storage/       # RocksDB repositories (feature `rocksdb`)
//! ├── api/
//! │   ├── inbound.rs     # /rest record API
//! │   ├── forward.rs     # /forward partner calls
//! │   ├── admin.rs       # /admin operator endpoints
//! │   └── operator.rs    # Operator token / loopback guard
//! └── container/
//!     ├── config.rs      # GatewayConfig + environment
//!     └── services.rs    # GatewayContainer
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod api;
pub mod container;

// Re-exports
pub use api::{metrics_router, operator_router, router, AppState};
pub use container::{
    load_config, ConfigError, ContainerError, GatewayConfig, GatewayContainer,
    TESTING_OPERATOR_TOKEN,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::const_is_empty)]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
