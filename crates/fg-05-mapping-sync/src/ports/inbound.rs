//! # Inbound Ports (Driving Ports)

use crate::domain::{SyncError, SyncReport};
use async_trait::async_trait;

/// Primary API of the synchronizer.
#[async_trait]
pub trait MappingSyncApi: Send + Sync {
    /// Walk every backend once and store newly discovered owners.
    ///
    /// Idempotent: with nothing new to discover, a run issues no fetch calls
    /// and stores nothing.
    async fn run_once(&self) -> Result<SyncReport, SyncError>;
}
