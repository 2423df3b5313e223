//! # Communication Log Service
//!
//! Application service implementing `CommunicationLogApi` on top of a
//! `LogRepository` and a `Clock`.

use crate::domain::{
    truncate_observations, CommunicationDetail, CommunicationLog, LogError, LogFilter, LogId,
    LogOutcome, MAX_PAGE_SIZE,
};
use crate::ports::{Clock, CommunicationLogApi, LogHandle, LogRepository, SystemClock};
use std::sync::Arc;
use tracing::{debug, warn};

/// Communication log service.
pub struct CommunicationLogService {
    repository: Arc<dyn LogRepository>,
    clock: Arc<dyn Clock>,
}

impl CommunicationLogService {
    /// Create a service with an explicit clock.
    pub fn new(repository: Arc<dyn LogRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    /// Create a service on system time.
    pub fn with_system_clock(repository: Arc<dyn LogRepository>) -> Self {
        Self::new(repository, Arc::new(SystemClock))
    }

    /// Append an entry that is already finished: `begin` and `complete` in
    /// one call.
    pub fn record(
        &self,
        observations: &str,
        parent: Option<LogId>,
        detail: CommunicationDetail,
        outcome: LogOutcome,
    ) -> Result<CommunicationLog, LogError> {
        let handle = self.begin(observations, parent, detail)?;
        self.complete(handle, outcome)
    }
}

impl CommunicationLogApi for CommunicationLogService {
    fn begin(
        &self,
        observations: &str,
        parent: Option<LogId>,
        detail: CommunicationDetail,
    ) -> Result<LogHandle, LogError> {
        if let Some(parent_id) = parent {
            if self.repository.get(parent_id)?.is_none() {
                return Err(LogError::ParentNotFound(parent_id));
            }
        }

        let id = self.repository.next_id()?;
        let start_time = self.clock.now();
        self.repository.insert(CommunicationLog {
            id,
            start_time,
            end_time: None,
            observations: truncate_observations(observations),
            exception_trace: None,
            parent_id: parent,
            detail,
        })?;

        debug!(log_id = %id, parent = ?parent.map(|p| p.0), "[fg-01] Communication started");
        Ok(LogHandle::new(id, start_time))
    }

    fn complete(
        &self,
        handle: LogHandle,
        outcome: LogOutcome,
    ) -> Result<CommunicationLog, LogError> {
        let id = handle.id();
        let mut log = self.repository.get(id)?.ok_or(LogError::NotFound(id))?;
        if log.end_time.is_some() {
            warn!(log_id = %id, "[fg-01] Ignoring second completion");
            return Err(LogError::AlreadyCompleted(id));
        }

        // A clock stepping backwards must not break end >= start.
        let now = self.clock.now();
        log.end_time = Some(if now < log.start_time { log.start_time } else { now });

        if let Some(observations) = outcome.observations {
            log.observations = truncate_observations(&observations);
        }
        if let Some(trace) = outcome.exception_trace {
            log.exception_trace = Some(truncate_observations(&trace));
        }
        if let Some(detail) = outcome.detail {
            log.detail = detail;
        }

        self.repository.update(log.clone())?;
        debug!(
            log_id = %id,
            failed = log.exception_trace.is_some(),
            "[fg-01] Communication completed"
        );
        Ok(log)
    }

    fn find_by_id(&self, id: LogId) -> Result<Option<CommunicationLog>, LogError> {
        self.repository.get(id)
    }

    fn sorted_children(&self, id: LogId) -> Result<Vec<CommunicationLog>, LogError> {
        let mut children = self.repository.children_of(id)?;
        children.sort_by(|a, b| a.start_time.cmp(&b.start_time).then(a.id.cmp(&b.id)));
        Ok(children)
    }

    fn find_by_filter(
        &self,
        filter: &LogFilter,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<CommunicationLog>, LogError> {
        if limit == 0 || limit > MAX_PAGE_SIZE {
            return Err(LogError::InvalidPageLimit {
                limit,
                max: MAX_PAGE_SIZE,
            });
        }

        let mut matching: Vec<CommunicationLog> = self
            .repository
            .scan()?
            .into_iter()
            .filter(|log| filter.matches(log))
            .collect();
        matching.sort_by(|a, b| b.start_time.cmp(&a.start_time).then(b.id.cmp(&a.id)));

        Ok(matching.into_iter().skip(offset).take(limit).collect())
    }

    fn count_by_filter(&self, filter: &LogFilter) -> Result<usize, LogError> {
        Ok(self
            .repository
            .scan()?
            .iter()
            .filter(|log| filter.matches(log))
            .count())
    }
}
