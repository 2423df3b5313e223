//! # Run Report

use serde::{Deserialize, Serialize};
use std::fmt;

/// Counts gathered during one synchronization run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Institutions visited.
    pub institutions: usize,
    /// Ids reported by backends, duplicates within a backend counted once.
    pub ids_listed: usize,
    /// Fetch calls issued.
    pub fetch_calls: usize,
    /// Mappings stored by this run.
    pub created: usize,
    /// Ids found under a different unit than the stored one.
    pub conflicts: usize,
    /// Fetched records that name no owning unit.
    pub without_owner: usize,
    /// Fetched records dropped because they were not asked for or the
    /// mapping store refused their key.
    pub rejected: usize,
    /// Backend calls that failed.
    pub backend_failures: usize,
}

impl SyncReport {
    /// Whether the run changed nothing and called no backend for records.
    pub fn is_quiet(&self) -> bool {
        self.fetch_calls == 0 && self.created == 0
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "institutions={} listed={} fetch_calls={} created={} conflicts={} without_owner={} rejected={} backend_failures={}",
            self.institutions,
            self.ids_listed,
            self.fetch_calls,
            self.created,
            self.conflicts,
            self.without_owner,
            self.rejected,
            self.backend_failures
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let report = SyncReport {
            institutions: 2,
            ids_listed: 5,
            fetch_calls: 1,
            created: 4,
            ..Default::default()
        };
        assert_eq!(
            report.to_string(),
            "institutions=2 listed=5 fetch_calls=1 created=4 conflicts=0 without_owner=0 rejected=0 backend_failures=0"
        );
        assert!(!report.is_quiet());
        assert!(SyncReport::default().is_quiet());
    }
}
