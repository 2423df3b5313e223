//! # Communication Log Errors

use super::entities::LogId;
use thiserror::Error;

/// Errors raised by the communication log subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LogError {
    /// No entry with this id.
    #[error("Communication log not found: {0}")]
    NotFound(LogId),

    /// The parent given at creation does not exist.
    #[error("Parent communication log not found: {0}")]
    ParentNotFound(LogId),

    /// The entry already has an end time.
    #[error("Communication log {0} is already completed")]
    AlreadyCompleted(LogId),

    /// Page size outside `1..=MAX_PAGE_SIZE`.
    #[error("Invalid page limit {limit}: must be between 1 and {max}")]
    InvalidPageLimit {
        /// Requested limit.
        limit: usize,
        /// Largest accepted limit.
        max: usize,
    },

    /// Persistence layer failure.
    #[error("Storage error: {0}")]
    Storage(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            LogError::AlreadyCompleted(LogId(7)).to_string(),
            "Communication log 7 is already completed"
        );
        assert_eq!(
            LogError::InvalidPageLimit { limit: 0, max: 50 }.to_string(),
            "Invalid page limit 0: must be between 1 and 50"
        );
    }
}
