//! # Log Filters
//!
//! Predicates used by operators to query the log.

use super::entities::{CommunicationLog, LogKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared_types::InstitutionId;

/// Largest page accepted by `find_by_filter`.
pub const MAX_PAGE_SIZE: usize = 50;

/// Predicate over communication logs.
///
/// Serialized as `{"type": "AND", "value": [...]}`; variants without data
/// omit `value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogFilter {
    /// Matches every entry.
    All,
    /// Matches when every inner filter matches. Empty matches everything.
    And(Vec<LogFilter>),
    /// Completed at or before the instant. In-progress entries never match.
    EndedAtOrBefore(DateTime<Utc>),
    /// Outbound exchanges toward the institution.
    TargetInstitution(InstitutionId),
    /// Entries of the given kind.
    Kind(LogKind),
    /// Entries without an end time.
    InProgress,
}

impl LogFilter {
    /// Evaluate the filter against one entry.
    pub fn matches(&self, log: &CommunicationLog) -> bool {
        match self {
            LogFilter::All => true,
            LogFilter::And(filters) => filters.iter().all(|f| f.matches(log)),
            LogFilter::EndedAtOrBefore(instant) => {
                log.end_time.map(|end| end <= *instant).unwrap_or(false)
            }
            LogFilter::TargetInstitution(institution) => {
                log.target_institution() == Some(institution)
            }
            LogFilter::Kind(kind) => log.detail.kind() == *kind,
            LogFilter::InProgress => log.is_in_progress(),
        }
    }
}
