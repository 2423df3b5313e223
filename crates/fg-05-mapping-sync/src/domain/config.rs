//! # Synchronizer Configuration

use super::errors::SyncError;
use serde::{Deserialize, Serialize};
use shared_types::Capability;
use std::time::Duration;

/// Default number of ids per fetch call.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Default time between runs.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(300);

/// What a run covers and how hard it hits backends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Capabilities whose records carry an owning unit.
    pub capabilities: Vec<Capability>,
    /// Maximum ids per fetch call.
    pub batch_size: usize,
    /// Time between scheduled runs.
    pub interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            capabilities: vec![
                Capability::Agreements,
                Capability::OutgoingMobilities,
                Capability::Courses,
            ],
            batch_size: DEFAULT_BATCH_SIZE,
            interval: DEFAULT_INTERVAL,
        }
    }
}

impl SyncConfig {
    /// Reject settings a run cannot work with.
    ///
    /// ## Errors
    ///
    /// - `InvalidBatchSize`: `batch_size` is zero
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.batch_size == 0 {
            return Err(SyncError::InvalidBatchSize(self.batch_size));
        }
        Ok(())
    }
}
