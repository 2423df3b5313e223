//! # Mapping Errors

use thiserror::Error;

/// Errors raised by the identifier mapping subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    /// Institution or external id is empty.
    #[error("Invalid mapping key: {0}")]
    InvalidKey(String),

    /// Persistence layer failure.
    #[error("Storage error: {0}")]
    Storage(String),
}
