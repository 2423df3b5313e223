//! # Production Storage Adapters
//!
//! Durable repositories for the communication log and the identifier
//! mapping store.
//!
//! ## Usage
//!
//! Enable the `rocksdb` feature to use these adapters:
//!
//! ```toml
//! gateway-runtime = { path = "...", features = ["rocksdb"] }
//! ```
//!
//! Without it, the in-memory repositories of each subsystem are used and
//! state is lost on restart.

#[cfg(feature = "rocksdb")]
pub mod rocksdb_adapter;

#[cfg(feature = "rocksdb")]
pub use rocksdb_adapter::{
    RocksDbConfig, RocksDbLogRepository, RocksDbMappingRepository, RocksDbStore, StorageError,
    CF_COMMUNICATION_LOGS, CF_MAPPINGS, CF_METADATA, COLUMN_FAMILIES,
};

// Re-export in-memory adapters
pub use fg_01_communication_log::InMemoryLogRepository;
pub use fg_02_identifier_mapping::InMemoryMappingRepository;
