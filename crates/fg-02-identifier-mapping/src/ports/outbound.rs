//! # Outbound Ports (Driven Ports)
//!
//! Storage for mapping rows and recorded conflicts.

use crate::domain::{IdentifierMapping, MappingConflict, MappingError, MappingKey};
use parking_lot::RwLock;
use shared_types::InstitutionId;
use std::collections::BTreeMap;

/// Result of a unique insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The row was stored.
    Inserted,
    /// A row with the same key already exists; it is returned unchanged.
    Duplicate(IdentifierMapping),
}

/// Append-only mapping table with a unique `(institution, external id)` key.
///
/// Implementations must make `insert_unique` atomic with respect to other
/// writers: of two concurrent inserts for one key, exactly one returns
/// `Inserted`.
pub trait MappingRepository: Send + Sync {
    /// Look up one row.
    fn get(&self, key: &MappingKey) -> Result<Option<IdentifierMapping>, MappingError>;

    /// Insert unless the key exists.
    fn insert_unique(&self, mapping: IdentifierMapping) -> Result<InsertOutcome, MappingError>;

    /// Every row of an institution, ordered by external id.
    fn list_by_institution(
        &self,
        institution: &InstitutionId,
    ) -> Result<Vec<IdentifierMapping>, MappingError>;

    /// Persist a conflict for operator review.
    fn record_conflict(&self, conflict: MappingConflict) -> Result<(), MappingError>;

    /// Recorded conflicts, oldest first.
    fn conflicts(&self) -> Result<Vec<MappingConflict>, MappingError>;
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

/// In-memory mapping table.
#[derive(Default)]
pub struct InMemoryMappingRepository {
    rows: RwLock<BTreeMap<MappingKey, IdentifierMapping>>,
    conflicts: RwLock<Vec<MappingConflict>>,
}

impl InMemoryMappingRepository {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows.
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MappingRepository for InMemoryMappingRepository {
    fn get(&self, key: &MappingKey) -> Result<Option<IdentifierMapping>, MappingError> {
        Ok(self.rows.read().get(key).cloned())
    }

    fn insert_unique(&self, mapping: IdentifierMapping) -> Result<InsertOutcome, MappingError> {
        let mut rows = self.rows.write();
        if let Some(existing) = rows.get(&mapping.key) {
            return Ok(InsertOutcome::Duplicate(existing.clone()));
        }
        rows.insert(mapping.key.clone(), mapping);
        Ok(InsertOutcome::Inserted)
    }

    fn list_by_institution(
        &self,
        institution: &InstitutionId,
    ) -> Result<Vec<IdentifierMapping>, MappingError> {
        Ok(self
            .rows
            .read()
            .values()
            .filter(|m| &m.key.institution_id == institution)
            .cloned()
            .collect())
    }

    fn record_conflict(&self, conflict: MappingConflict) -> Result<(), MappingError> {
        self.conflicts.write().push(conflict);
        Ok(())
    }

    fn conflicts(&self) -> Result<Vec<MappingConflict>, MappingError> {
        Ok(self.conflicts.read().clone())
    }
}
