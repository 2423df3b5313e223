//! # Error Types
//!
//! Errors shared across subsystems. Subsystem-specific errors live in each
//! crate's `domain/errors.rs`.

use crate::entities::{Capability, InstitutionId};
use crate::envelope::ErrorResponse;
use thiserror::Error;

/// Malformed or unauthorized inbound request.
///
/// Always answered with HTTP 400 and never recorded as a communication
/// failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// No backend is registered for the institution.
    #[error("Unknown HEI ID: {0}")]
    UnknownInstitution(InstitutionId),

    /// The institution exists but no backend serves the capability.
    #[error("No backend serves capability {capability} for {institution}")]
    CapabilityNotServed {
        /// Addressed institution.
        institution: InstitutionId,
        /// Requested capability.
        capability: Capability,
    },

    /// A required parameter is absent.
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    /// More ids were requested than the endpoint accepts.
    #[error("Maximum number of valid ids exceeded: {requested} > {max}")]
    TooManyIds {
        /// Ids in the request.
        requested: usize,
        /// Endpoint limit.
        max: usize,
    },
}

impl ValidationError {
    /// Wire document: developer detail, neutral user message.
    pub fn to_error_response(&self) -> ErrorResponse {
        ErrorResponse::developer(self.to_string())
    }
}
