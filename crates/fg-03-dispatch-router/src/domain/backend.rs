//! # Backend Handles
//!
//! A backend is a tagged union over the concrete variants the gateway knows
//! how to talk to. Every variant answers the same three operations, so the
//! router and the reconciler treat them interchangeably.

use super::descriptor::{BackendDescriptor, BackendId};
use super::errors::DispatchError;
use crate::adapters::{InMemoryBackend, RemoteBackend};
use crate::ports::RecordProvider;
use shared_types::{BackendStats, Capability, InstitutionId, Record};
use std::fmt;
use std::sync::Arc;

/// A loaded backend.
#[derive(Clone)]
pub enum Backend {
    /// Dataset held in process memory.
    InMemory(InMemoryBackend),
    /// Plugin process reached over JSON/HTTP.
    Remote(RemoteBackend),
    /// Provider handed over by the plugin loader.
    External {
        /// Declared facts.
        descriptor: BackendDescriptor,
        /// Implementation.
        provider: Arc<dyn RecordProvider>,
    },
}

impl Backend {
    /// Wrap a provider supplied by a plugin loader.
    pub fn external(descriptor: BackendDescriptor, provider: Arc<dyn RecordProvider>) -> Self {
        Backend::External {
            descriptor,
            provider,
        }
    }

    /// Declared facts of the backend.
    pub fn descriptor(&self) -> &BackendDescriptor {
        match self {
            Backend::InMemory(b) => b.descriptor(),
            Backend::Remote(b) => b.descriptor(),
            Backend::External { descriptor, .. } => descriptor,
        }
    }

    /// Backend id.
    pub fn id(&self) -> &BackendId {
        &self.descriptor().id
    }

    /// Every external id the backend holds for `institution`.
    pub async fn list_ids(
        &self,
        institution: &InstitutionId,
        capability: Capability,
    ) -> Result<Vec<String>, DispatchError> {
        match self {
            Backend::InMemory(b) => b.list_ids(institution, capability),
            Backend::Remote(b) => b.list_ids(institution, capability).await,
            Backend::External { descriptor, provider } => provider
                .list_ids(institution, capability)
                .await
                .map_err(|e| DispatchError::backend(&descriptor.id, "list_ids", e)),
        }
    }

    /// Records for the ids the backend knows. Unknown ids are omitted.
    pub async fn fetch(
        &self,
        institution: &InstitutionId,
        capability: Capability,
        ids: &[String],
    ) -> Result<Vec<Record>, DispatchError> {
        match self {
            Backend::InMemory(b) => b.fetch(institution, capability, ids),
            Backend::Remote(b) => b.fetch(institution, capability, ids).await,
            Backend::External { descriptor, provider } => provider
                .fetch(institution, capability, ids)
                .await
                .map_err(|e| DispatchError::backend(&descriptor.id, "fetch", e)),
        }
    }

    /// Counters for `institution`. Unreported fields may be `None`.
    pub async fn stats(
        &self,
        institution: &InstitutionId,
        capability: Capability,
    ) -> Result<BackendStats, DispatchError> {
        match self {
            Backend::InMemory(b) => b.stats(institution, capability),
            Backend::Remote(b) => b.stats(institution, capability).await,
            Backend::External { descriptor, provider } => provider
                .stats(institution, capability)
                .await
                .map_err(|e| DispatchError::backend(&descriptor.id, "stats", e)),
        }
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let variant = match self {
            Backend::InMemory(_) => "InMemory",
            Backend::Remote(_) => "Remote",
            Backend::External { .. } => "External",
        };
        f.debug_struct("Backend")
            .field("variant", &variant)
            .field("id", self.id())
            .finish()
    }
}
