//! # Mapping Entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared_types::{InstitutionId, OunitId};
use std::fmt;

/// Natural key of a mapping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MappingKey {
    /// Institution the id belongs to.
    pub institution_id: InstitutionId,
    /// Id as known to partners.
    pub external_id: String,
}

impl MappingKey {
    /// Build a key.
    pub fn new(institution_id: InstitutionId, external_id: impl Into<String>) -> Self {
        Self {
            institution_id,
            external_id: external_id.into(),
        }
    }
}

impl fmt::Display for MappingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.institution_id, self.external_id)
    }
}

/// Immutable row `(institution, external id) -> organizational unit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierMapping {
    /// Row key.
    pub key: MappingKey,
    /// Unit that owns the record.
    pub ounit_id: OunitId,
}

impl IdentifierMapping {
    /// Build a row.
    pub fn new(
        institution_id: InstitutionId,
        external_id: impl Into<String>,
        ounit_id: OunitId,
    ) -> Self {
        Self {
            key: MappingKey::new(institution_id, external_id),
            ounit_id,
        }
    }
}

/// A mapped id was rediscovered under a different unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingConflict {
    /// Affected key.
    pub key: MappingKey,
    /// Unit currently stored (kept).
    pub existing_ounit_id: OunitId,
    /// Unit reported by the latest discovery (not applied).
    pub discovered_ounit_id: OunitId,
    /// When the conflict was detected.
    pub detected_at: DateTime<Utc>,
}

impl fmt::Display for MappingConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mapping {} is owned by {} but was rediscovered under {}",
            self.key, self.existing_ounit_id, self.discovered_ounit_id
        )
    }
}

/// Result of registering a discovered mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// A new row was stored.
    Created(IdentifierMapping),
    /// The same row already existed (including a lost insert race).
    AlreadyPresent(IdentifierMapping),
    /// A different unit is already stored. Nothing was changed.
    Conflict(MappingConflict),
}

impl RegisterOutcome {
    /// The row stored after the call.
    pub fn stored_ounit(&self) -> &OunitId {
        match self {
            RegisterOutcome::Created(m) | RegisterOutcome::AlreadyPresent(m) => &m.ounit_id,
            RegisterOutcome::Conflict(c) => &c.existing_ounit_id,
        }
    }
}
