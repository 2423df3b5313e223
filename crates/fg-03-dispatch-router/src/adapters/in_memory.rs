//! # In-Memory Backend
//!
//! Dataset held in process memory. Used for bundled fixtures and as the
//! test double of the reconciler: every call is recorded so tests can
//! assert exactly which backends were asked for what.

use crate::domain::{BackendDescriptor, DispatchError};
use parking_lot::RwLock;
use shared_types::{BackendStats, Capability, InstitutionId, Record};
use std::collections::HashMap;
use std::sync::Arc;

/// Calls received by an `InMemoryBackend` since the last reset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallRecord {
    /// Number of `list_ids` calls.
    pub list_calls: usize,
    /// Id batches passed to `fetch`, in call order.
    pub fetch_calls: Vec<Vec<String>>,
    /// Number of `stats` calls.
    pub stats_calls: usize,
}

impl CallRecord {
    /// Total calls of any kind.
    pub fn total(&self) -> usize {
        self.list_calls + self.fetch_calls.len() + self.stats_calls
    }
}

#[derive(Default)]
struct State {
    records: HashMap<Capability, Vec<Record>>,
    stats: HashMap<Capability, BackendStats>,
    failure: Option<String>,
    calls: CallRecord,
}

/// Backend answering from memory. Clones share state.
#[derive(Clone)]
pub struct InMemoryBackend {
    descriptor: BackendDescriptor,
    state: Arc<RwLock<State>>,
}

impl InMemoryBackend {
    /// Empty backend.
    pub fn new(descriptor: BackendDescriptor) -> Self {
        Self {
            descriptor,
            state: Arc::new(RwLock::new(State::default())),
        }
    }

    /// Seed records for a capability, replacing any held before.
    pub fn with_records(self, capability: Capability, records: Vec<Record>) -> Self {
        self.state.write().records.insert(capability, records);
        self
    }

    /// Seed the counters reported by `stats`.
    pub fn with_stats(self, capability: Capability, stats: BackendStats) -> Self {
        self.state.write().stats.insert(capability, stats);
        self
    }

    /// Add or replace one record.
    pub fn insert_record(&self, capability: Capability, record: Record) {
        let mut state = self.state.write();
        let records = state.records.entry(capability).or_default();
        match records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
    }

    /// Make every subsequent call fail with `message`, or clear with `None`.
    pub fn set_failure(&self, message: Option<&str>) {
        self.state.write().failure = message.map(str::to_string);
    }

    /// Calls received so far.
    pub fn calls(&self) -> CallRecord {
        self.state.read().calls.clone()
    }

    /// Forget recorded calls.
    pub fn reset_calls(&self) {
        self.state.write().calls = CallRecord::default();
    }

    /// Declared facts.
    pub fn descriptor(&self) -> &BackendDescriptor {
        &self.descriptor
    }

    fn check_failure(&self, state: &State, operation: &'static str) -> Result<(), DispatchError> {
        match &state.failure {
            Some(message) => Err(DispatchError::backend(&self.descriptor.id, operation, message)),
            None => Ok(()),
        }
    }

    fn serves(&self, institution: &InstitutionId) -> bool {
        &self.descriptor.institution == institution
    }

    /// Ids of every record held for `capability`.
    pub fn list_ids(
        &self,
        institution: &InstitutionId,
        capability: Capability,
    ) -> Result<Vec<String>, DispatchError> {
        let mut state = self.state.write();
        state.calls.list_calls += 1;
        self.check_failure(&state, "list_ids")?;
        if !self.serves(institution) {
            return Ok(Vec::new());
        }
        Ok(state
            .records
            .get(&capability)
            .map(|records| records.iter().map(|r| r.id.clone()).collect())
            .unwrap_or_default())
    }

    /// Held records among `ids`, in the order requested.
    pub fn fetch(
        &self,
        institution: &InstitutionId,
        capability: Capability,
        ids: &[String],
    ) -> Result<Vec<Record>, DispatchError> {
        let mut state = self.state.write();
        state.calls.fetch_calls.push(ids.to_vec());
        self.check_failure(&state, "fetch")?;
        if !self.serves(institution) {
            return Ok(Vec::new());
        }
        let Some(records) = state.records.get(&capability) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .iter()
            .filter_map(|id| records.iter().find(|r| &r.id == id).cloned())
            .collect())
    }

    /// Seeded counters, or `fetchable` derived from the record count.
    pub fn stats(
        &self,
        institution: &InstitutionId,
        capability: Capability,
    ) -> Result<BackendStats, DispatchError> {
        let mut state = self.state.write();
        state.calls.stats_calls += 1;
        self.check_failure(&state, "stats")?;
        if !self.serves(institution) {
            return Ok(BackendStats::new());
        }
        if let Some(stats) = state.stats.get(&capability) {
            return Ok(stats.clone());
        }
        let held = state.records.get(&capability).map(Vec::len).unwrap_or(0) as u64;
        Ok(capability
            .stat_fields()
            .iter()
            .map(|field| {
                let value = (*field == "fetchable").then_some(held);
                (field.to_string(), value)
            })
            .collect())
    }
}
