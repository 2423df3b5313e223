//! # Inbound Ports (Driving Ports)
//!
//! The API other subsystems use to record and inspect exchanges.

use crate::domain::{CommunicationDetail, CommunicationLog, LogError, LogFilter, LogId, LogOutcome};
use chrono::{DateTime, Utc};

/// Proof that an entry was begun. Consumed by `complete`, so one handle
/// completes its entry at most once.
#[derive(Debug, PartialEq, Eq)]
pub struct LogHandle {
    id: LogId,
    start_time: DateTime<Utc>,
}

impl LogHandle {
    pub(crate) fn new(id: LogId, start_time: DateTime<Utc>) -> Self {
        Self { id, start_time }
    }

    /// Id of the entry this handle completes.
    pub fn id(&self) -> LogId {
        self.id
    }

    /// Start time recorded at `begin`.
    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }
}

/// Primary API for the Communication Log subsystem.
pub trait CommunicationLogApi: Send + Sync {
    /// Create an in-progress entry. When `parent` is given the new entry is
    /// immediately part of the parent's children.
    ///
    /// ## Errors
    ///
    /// - `ParentNotFound`: `parent` does not exist
    fn begin(
        &self,
        observations: &str,
        parent: Option<LogId>,
        detail: CommunicationDetail,
    ) -> Result<LogHandle, LogError>;

    /// Set the end time and outcome of an entry.
    ///
    /// ## Errors
    ///
    /// - `AlreadyCompleted`: the entry already has an end time
    fn complete(&self, handle: LogHandle, outcome: LogOutcome)
        -> Result<CommunicationLog, LogError>;

    /// Fetch one entry.
    fn find_by_id(&self, id: LogId) -> Result<Option<CommunicationLog>, LogError>;

    /// Children of `id` ordered by start time. Recomputed on every call.
    fn sorted_children(&self, id: LogId) -> Result<Vec<CommunicationLog>, LogError>;

    /// Page of entries matching `filter`, newest first.
    ///
    /// ## Errors
    ///
    /// - `InvalidPageLimit`: `limit` outside `1..=MAX_PAGE_SIZE`
    fn find_by_filter(
        &self,
        filter: &LogFilter,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<CommunicationLog>, LogError>;

    /// Number of entries matching `filter`.
    fn count_by_filter(&self, filter: &LogFilter) -> Result<usize, LogError>;
}
