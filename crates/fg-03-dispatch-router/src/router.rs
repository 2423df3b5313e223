//! # Dispatch Router
//!
//! Holds the current `BackendRegistry` behind a lock so plugin reloads can
//! swap it atomically. Readers take a snapshot and never observe a
//! half-built registry.

use crate::domain::{Backend, BackendRegistry};
use parking_lot::RwLock;
use shared_types::{Capability, InstitutionId, OunitId};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Backend resolution over a hot-swappable registry.
#[derive(Debug)]
pub struct DispatchRouter {
    registry: RwLock<Arc<BackendRegistry>>,
}

impl DispatchRouter {
    /// Router serving `registry`.
    pub fn new(registry: BackendRegistry) -> Self {
        Self {
            registry: RwLock::new(Arc::new(registry)),
        }
    }

    /// Router without backends.
    pub fn empty() -> Self {
        Self::new(BackendRegistry::empty())
    }

    /// Replace the registry. In-flight requests keep their snapshot.
    pub fn reload(&self, registry: BackendRegistry) {
        let registrations = registry.registration_count();
        *self.registry.write() = Arc::new(registry);
        info!(registrations, "[fg-03] Backend registry reloaded");
    }

    /// Current registry.
    pub fn snapshot(&self) -> Arc<BackendRegistry> {
        Arc::clone(&self.registry.read())
    }

    /// Whether any backend serves the target.
    pub fn has_backend(&self, institution: &InstitutionId, capability: Capability) -> bool {
        self.snapshot().has_backend(institution, capability)
    }

    /// Every backend serving the target, in registration order.
    pub fn all_backends(
        &self,
        institution: &InstitutionId,
        capability: Capability,
    ) -> Vec<Arc<Backend>> {
        self.snapshot().all_backends(institution, capability)
    }

    /// The whole federation for `capability`.
    pub fn all_backends_grouped_by_institution(
        &self,
        capability: Capability,
    ) -> BTreeMap<InstitutionId, Vec<Arc<Backend>>> {
        self.snapshot().all_backends_grouped_by_institution(capability)
    }

    /// Designated primary, else the first registered backend.
    pub fn primary_backend(
        &self,
        institution: &InstitutionId,
        capability: Capability,
    ) -> Option<Arc<Backend>> {
        self.snapshot().primary_backend(institution, capability)
    }

    /// The backend authoritative for `ounit`.
    pub fn backend_for_unit(
        &self,
        institution: &InstitutionId,
        ounit: &OunitId,
        capability: Capability,
    ) -> Option<Arc<Backend>> {
        self.snapshot().backend_for_unit(institution, ounit, capability)
    }
}
