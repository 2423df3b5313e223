//! # Adapters
//!
//! Concrete backend variants.

pub mod in_memory;
pub mod remote;

pub use in_memory::{CallRecord, InMemoryBackend};
pub use remote::RemoteBackend;
