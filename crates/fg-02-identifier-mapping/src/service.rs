//! # Mapping Service
//!
//! Implements `MappingApi`: lookups, never-overwrite registration and
//! conflict reporting.

use crate::domain::{IdentifierMapping, MappingConflict, MappingError, MappingKey, RegisterOutcome};
use crate::ports::{InsertOutcome, MappingApi, MappingRepository};
use chrono::Utc;
use shared_types::{InstitutionId, OunitId};
use std::sync::Arc;
use tracing::{debug, warn};

/// Identifier mapping service.
pub struct MappingService {
    repository: Arc<dyn MappingRepository>,
}

impl MappingService {
    /// Create a service over a repository.
    pub fn new(repository: Arc<dyn MappingRepository>) -> Self {
        Self { repository }
    }

    /// Every row of an institution.
    pub fn mappings_for(
        &self,
        institution: &InstitutionId,
    ) -> Result<Vec<IdentifierMapping>, MappingError> {
        self.repository.list_by_institution(institution)
    }

    fn validate_key(institution: &InstitutionId, external_id: &str) -> Result<(), MappingError> {
        if institution.as_str().is_empty() {
            return Err(MappingError::InvalidKey("empty institution id".to_string()));
        }
        if external_id.is_empty() {
            return Err(MappingError::InvalidKey("empty external id".to_string()));
        }
        Ok(())
    }

    fn report_conflict(
        &self,
        existing: IdentifierMapping,
        discovered: &OunitId,
    ) -> Result<RegisterOutcome, MappingError> {
        let conflict = MappingConflict {
            key: existing.key,
            existing_ounit_id: existing.ounit_id,
            discovered_ounit_id: discovered.clone(),
            detected_at: Utc::now(),
        };
        warn!(
            institution = %conflict.key.institution_id,
            external_id = %conflict.key.external_id,
            existing = %conflict.existing_ounit_id,
            discovered = %conflict.discovered_ounit_id,
            "[fg-02] Mapping conflict detected, keeping existing unit"
        );
        self.repository.record_conflict(conflict.clone())?;
        Ok(RegisterOutcome::Conflict(conflict))
    }
}

impl MappingApi for MappingService {
    fn get_mapping(
        &self,
        institution: &InstitutionId,
        external_id: &str,
    ) -> Result<Option<OunitId>, MappingError> {
        let key = MappingKey::new(institution.clone(), external_id);
        Ok(self.repository.get(&key)?.map(|m| m.ounit_id))
    }

    fn register_mapping(
        &self,
        institution: &InstitutionId,
        external_id: &str,
        ounit: &OunitId,
    ) -> Result<RegisterOutcome, MappingError> {
        Self::validate_key(institution, external_id)?;

        let mapping = IdentifierMapping::new(institution.clone(), external_id, ounit.clone());
        match self.repository.insert_unique(mapping.clone())? {
            InsertOutcome::Inserted => {
                debug!(
                    institution = %institution,
                    external_id,
                    ounit = %ounit,
                    "[fg-02] Mapping registered"
                );
                Ok(RegisterOutcome::Created(mapping))
            }
            InsertOutcome::Duplicate(existing) if &existing.ounit_id == ounit => {
                Ok(RegisterOutcome::AlreadyPresent(existing))
            }
            InsertOutcome::Duplicate(existing) => self.report_conflict(existing, ounit),
        }
    }

    fn conflicts(&self) -> Result<Vec<MappingConflict>, MappingError> {
        self.repository.conflicts()
    }
}
