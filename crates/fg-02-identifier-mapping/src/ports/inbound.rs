//! # Inbound Ports (Driving Ports)
//!
//! Consumed by the dispatch reconciler (lookups) and the synchronizer
//! (registrations).

use crate::domain::{MappingConflict, MappingError, RegisterOutcome};
use shared_types::{InstitutionId, OunitId};

/// Primary API for the Identifier Mapping subsystem.
pub trait MappingApi: Send + Sync {
    /// Unit owning `external_id`, if a mapping exists.
    fn get_mapping(
        &self,
        institution: &InstitutionId,
        external_id: &str,
    ) -> Result<Option<OunitId>, MappingError>;

    /// Store a newly discovered mapping.
    ///
    /// Never overwrites. A different unit for an existing key yields
    /// `RegisterOutcome::Conflict` and is recorded for review.
    fn register_mapping(
        &self,
        institution: &InstitutionId,
        external_id: &str,
        ounit: &OunitId,
    ) -> Result<RegisterOutcome, MappingError>;

    /// Conflicts recorded so far, oldest first.
    fn conflicts(&self) -> Result<Vec<MappingConflict>, MappingError>;
}
