//! # Dispatch Errors

use super::descriptor::BackendId;
use fg_02_identifier_mapping::MappingError;
use shared_types::{Capability, InstitutionId, OunitId, ValidationError};
use thiserror::Error;

/// Errors raised while building the registry or reconciling answers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The inbound request is malformed or addresses nothing we serve.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A backend call failed. Fails the whole reconciliation.
    #[error("Backend {backend} failed during {operation}: {message}")]
    Backend {
        /// Failing backend.
        backend: BackendId,
        /// Operation that failed (`list_ids`, `fetch`, `stats`).
        operation: &'static str,
        /// Backend-reported detail.
        message: String,
    },

    /// The mapping store could not be read.
    #[error("Mapping lookup failed: {0}")]
    Mapping(#[from] MappingError),

    /// Two backends were registered under one id.
    #[error("Duplicate backend id: {0}")]
    DuplicateBackend(BackendId),

    /// More than one backend is designated primary for a target.
    #[error("Multiple primary backends for {institution}/{capability}")]
    MultiplePrimaries {
        /// Institution.
        institution: InstitutionId,
        /// Capability.
        capability: Capability,
    },

    /// Two backends claim one organizational unit for a capability.
    #[error("Organizational unit {ounit} of {institution} is claimed by {first} and {second} for {capability}")]
    OverlappingUnit {
        /// Institution.
        institution: InstitutionId,
        /// Capability.
        capability: Capability,
        /// Contested unit.
        ounit: OunitId,
        /// Backend registered first.
        first: BackendId,
        /// Backend registered second.
        second: BackendId,
    },

    /// A remote backend's base URL is unusable.
    #[error("Invalid backend URL: {0}")]
    InvalidBackendUrl(String),
}

impl DispatchError {
    /// Build a backend failure.
    pub fn backend(backend: &BackendId, operation: &'static str, message: impl ToString) -> Self {
        DispatchError::Backend {
            backend: backend.clone(),
            operation,
            message: message.to_string(),
        }
    }
}
