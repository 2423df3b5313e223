//! # Ports Layer

pub mod inbound;
pub mod outbound;

pub use inbound::MappingApi;
pub use outbound::{InMemoryMappingRepository, InsertOutcome, MappingRepository};
