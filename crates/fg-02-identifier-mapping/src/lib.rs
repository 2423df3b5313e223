//! # FG-02 Identifier Mapping Store
//!
//! Cross-reference from an externally known record id to the organizational
//! unit that owns it, so requests for that id route to exactly one backend.
//!
//! **Subsystem ID:** 02
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Domain Invariants
//!
//! | ID | Invariant | Description |
//! |----|-----------|-------------|
//! | 1 | Immutable Rows | A mapping is never updated or deleted |
//! | 2 | Unique Key | At most one row per `(institution, external id)` |
//! | 3 | Loser Reads Back | A rejected duplicate insert returns the stored row |
//! | 4 | Reported Conflicts | A different unit for a mapped id is recorded, never applied |
//!
//! ## Module Structure
//!
//! ```text
//! fg-02-identifier-mapping/
//! ├── domain/          # IdentifierMapping, MappingKey, MappingConflict, errors
//! ├── ports/           # MappingApi, MappingRepository
//! └── service.rs       # MappingService
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod domain;
pub mod ports;
pub mod service;

// Re-exports
pub use domain::{IdentifierMapping, MappingConflict, MappingError, MappingKey, RegisterOutcome};
pub use ports::{InMemoryMappingRepository, InsertOutcome, MappingApi, MappingRepository};
pub use service::MappingService;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
