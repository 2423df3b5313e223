//! # FG-05 Identifier Mapping Synchronizer
//!
//! Periodic, idempotent job that learns which organizational unit owns each
//! record id, so the dispatch reconciler can route a get straight to the
//! owning backend.
//!
//! **Subsystem ID:** 05
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Run Guarantees
//!
//! | Guarantee | Description |
//! |-----------|-------------|
//! | Idempotent | Already-mapped ids cause no fetch and no write |
//! | Bounded | At most `batch_size` ids per fetch call |
//! | Append Only | Mappings are never deleted or re-resolved |
//! | Single Flight | Runs never overlap |
//!
//! ## Module Structure
//!
//! ```text
//! fg-05-mapping-sync/
//! ├── domain/          # SyncConfig, SyncReport, SyncError
//! ├── ports/           # MappingSyncApi
//! ├── service.rs       # MappingSynchronizer
//! └── scheduler.rs     # SyncScheduler (interval, single-flight, shutdown)
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod domain;
pub mod ports;
pub mod scheduler;
pub mod service;

// Re-exports
pub use domain::{SyncConfig, SyncError, SyncReport};
pub use ports::MappingSyncApi;
pub use scheduler::{SyncScheduler, SYNC_PLUGIN_NAME};
pub use service::MappingSynchronizer;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
