//! # Outbound Ports (Driven Ports)
//!
//! Storage and time dependencies of the communication log.

use crate::domain::{CommunicationLog, LogError, LogId};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

/// Persistence for log entries and the parent/child index.
///
/// `insert` must add the entry and register it under its parent in one
/// atomic step, so readers never see a child without its index entry.
pub trait LogRepository: Send + Sync {
    /// Reserve the next surrogate id.
    fn next_id(&self) -> Result<LogId, LogError>;

    /// Store a new entry and index it under its parent.
    fn insert(&self, log: CommunicationLog) -> Result<(), LogError>;

    /// Overwrite an existing entry.
    fn update(&self, log: CommunicationLog) -> Result<(), LogError>;

    /// Fetch one entry.
    fn get(&self, id: LogId) -> Result<Option<CommunicationLog>, LogError>;

    /// Direct children of `id`, in no particular order.
    fn children_of(&self, id: LogId) -> Result<Vec<CommunicationLog>, LogError>;

    /// Every stored entry, in id order.
    fn scan(&self) -> Result<Vec<CommunicationLog>, LogError>;
}

/// Time source abstraction (for testing).
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Default clock using system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    /// Start at a fixed instant.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    /// Jump to an instant (may go backwards).
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.write() = instant;
    }

    /// Move forward by a duration.
    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.write();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}

#[derive(Default)]
struct InMemoryLogState {
    logs: BTreeMap<LogId, CommunicationLog>,
    children: HashMap<LogId, Vec<LogId>>,
}

/// In-memory repository. Used in tests and when durable storage is off.
#[derive(Default)]
pub struct InMemoryLogRepository {
    state: RwLock<InMemoryLogState>,
    next_id: AtomicU64,
}

impl InMemoryLogRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.state.read().logs.len()
    }

    /// Whether nothing was stored yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LogRepository for InMemoryLogRepository {
    fn next_id(&self) -> Result<LogId, LogError> {
        Ok(LogId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1))
    }

    fn insert(&self, log: CommunicationLog) -> Result<(), LogError> {
        let mut state = self.state.write();
        if let Some(parent) = log.parent_id {
            state.children.entry(parent).or_default().push(log.id);
        }
        state.logs.insert(log.id, log);
        Ok(())
    }

    fn update(&self, log: CommunicationLog) -> Result<(), LogError> {
        let mut state = self.state.write();
        match state.logs.get_mut(&log.id) {
            Some(slot) => {
                *slot = log;
                Ok(())
            }
            None => Err(LogError::NotFound(log.id)),
        }
    }

    fn get(&self, id: LogId) -> Result<Option<CommunicationLog>, LogError> {
        Ok(self.state.read().logs.get(&id).cloned())
    }

    fn children_of(&self, id: LogId) -> Result<Vec<CommunicationLog>, LogError> {
        let state = self.state.read();
        Ok(state
            .children
            .get(&id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|child| state.logs.get(child).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    fn scan(&self) -> Result<Vec<CommunicationLog>, LogError> {
        Ok(self.state.read().logs.values().cloned().collect())
    }
}
