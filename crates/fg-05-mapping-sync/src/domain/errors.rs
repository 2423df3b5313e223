//! # Synchronizer Errors

use fg_02_identifier_mapping::MappingError;
use thiserror::Error;

/// Errors that abort a synchronization run.
///
/// A failing backend does not abort the run; it is counted in the report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// Batch size of zero.
    #[error("Invalid batch size: {0}")]
    InvalidBatchSize(usize),

    /// Another run has not finished yet.
    #[error("A synchronization run is already in progress")]
    AlreadyRunning,

    /// The mapping store failed.
    #[error("Mapping store failure: {0}")]
    Mapping(#[from] MappingError),
}
