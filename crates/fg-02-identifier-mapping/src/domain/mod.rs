//! # Domain Layer

pub mod entities;
pub mod errors;

pub use entities::{IdentifierMapping, MappingConflict, MappingKey, RegisterOutcome};
pub use errors::MappingError;
