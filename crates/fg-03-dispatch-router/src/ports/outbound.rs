//! # Outbound Ports (Driven Ports)
//!
//! The contract a plugin implementation fulfils.

use async_trait::async_trait;
use shared_types::{BackendStats, Capability, InstitutionId, Record};
use thiserror::Error;

/// Failure reported by a provider, carried verbatim into `DispatchError`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ProviderError(pub String);

impl ProviderError {
    /// Wrap a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Data source supplied by a plugin loader.
#[async_trait]
pub trait RecordProvider: Send + Sync {
    /// Every external id held for `institution`.
    async fn list_ids(
        &self,
        institution: &InstitutionId,
        capability: Capability,
    ) -> Result<Vec<String>, ProviderError>;

    /// Records for the ids the provider knows.
    async fn fetch(
        &self,
        institution: &InstitutionId,
        capability: Capability,
        ids: &[String],
    ) -> Result<Vec<Record>, ProviderError>;

    /// Counters for `institution`.
    async fn stats(
        &self,
        institution: &InstitutionId,
        capability: Capability,
    ) -> Result<BackendStats, ProviderError>;
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

/// Provider whose every call fails with the same message.
#[derive(Debug, Clone)]
pub struct FailingProvider {
    message: String,
}

impl FailingProvider {
    /// Fail every call with `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl RecordProvider for FailingProvider {
    async fn list_ids(
        &self,
        _institution: &InstitutionId,
        _capability: Capability,
    ) -> Result<Vec<String>, ProviderError> {
        Err(ProviderError::new(self.message.clone()))
    }

    async fn fetch(
        &self,
        _institution: &InstitutionId,
        _capability: Capability,
        _ids: &[String],
    ) -> Result<Vec<Record>, ProviderError> {
        Err(ProviderError::new(self.message.clone()))
    }

    async fn stats(
        &self,
        _institution: &InstitutionId,
        _capability: Capability,
    ) -> Result<BackendStats, ProviderError> {
        Err(ProviderError::new(self.message.clone()))
    }
}
