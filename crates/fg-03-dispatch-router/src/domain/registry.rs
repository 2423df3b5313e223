//! # Backend Registry
//!
//! Immutable index from `(institution, capability)` to the ordered list of
//! backends serving it. Built once per plugin (re)load and replaced
//! wholesale; never mutated while serving traffic.

use super::backend::Backend;
use super::descriptor::BackendId;
use super::errors::DispatchError;
use shared_types::{Capability, InstitutionId, OunitId};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

type Target = (InstitutionId, Capability);

/// Loaded backends, indexed for resolution.
#[derive(Debug, Default)]
pub struct BackendRegistry {
    by_target: HashMap<Target, Vec<Arc<Backend>>>,
    primaries: HashMap<Target, usize>,
    institutions: BTreeSet<InstitutionId>,
}

impl BackendRegistry {
    /// Registry without backends.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Start building a registry.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Whether any backend serves the target.
    pub fn has_backend(&self, institution: &InstitutionId, capability: Capability) -> bool {
        self.by_target
            .get(&(institution.clone(), capability))
            .map(|list| !list.is_empty())
            .unwrap_or(false)
    }

    /// Whether any backend, for any capability, serves the institution.
    pub fn knows_institution(&self, institution: &InstitutionId) -> bool {
        self.institutions.contains(institution)
    }

    /// Backends serving the target, in registration order.
    pub fn all_backends(
        &self,
        institution: &InstitutionId,
        capability: Capability,
    ) -> Vec<Arc<Backend>> {
        self.by_target
            .get(&(institution.clone(), capability))
            .cloned()
            .unwrap_or_default()
    }

    /// Every institution served for `capability`, with its backends.
    pub fn all_backends_grouped_by_institution(
        &self,
        capability: Capability,
    ) -> BTreeMap<InstitutionId, Vec<Arc<Backend>>> {
        self.by_target
            .iter()
            .filter(|((_, cap), list)| *cap == capability && !list.is_empty())
            .map(|((institution, _), list)| (institution.clone(), list.clone()))
            .collect()
    }

    /// Designated primary, else the first registered backend.
    pub fn primary_backend(
        &self,
        institution: &InstitutionId,
        capability: Capability,
    ) -> Option<Arc<Backend>> {
        let target = (institution.clone(), capability);
        let list = self.by_target.get(&target)?;
        let index = self.primaries.get(&target).copied().unwrap_or(0);
        list.get(index).cloned()
    }

    /// The single backend authoritative for `ounit`.
    pub fn backend_for_unit(
        &self,
        institution: &InstitutionId,
        ounit: &OunitId,
        capability: Capability,
    ) -> Option<Arc<Backend>> {
        self.by_target
            .get(&(institution.clone(), capability))?
            .iter()
            .find(|b| b.descriptor().covers(ounit))
            .cloned()
    }

    /// Primary first, then the remaining backends in registration order.
    pub fn backends_primary_first(
        &self,
        institution: &InstitutionId,
        capability: Capability,
    ) -> Vec<Arc<Backend>> {
        let mut list = self.all_backends(institution, capability);
        let index = self
            .primaries
            .get(&(institution.clone(), capability))
            .copied()
            .unwrap_or(0);
        if index < list.len() {
            let primary = list.remove(index);
            list.insert(0, primary);
        }
        list
    }

    /// Total number of (backend, capability) registrations.
    pub fn registration_count(&self) -> usize {
        self.by_target.values().map(Vec::len).sum()
    }
}

/// Collects backends and validates them into a `BackendRegistry`.
#[derive(Default)]
pub struct RegistryBuilder {
    backends: Vec<Backend>,
}

impl RegistryBuilder {
    /// Add a backend. Registration order is preserved.
    pub fn register(mut self, backend: Backend) -> Self {
        self.backends.push(backend);
        self
    }

    /// Validate and index.
    ///
    /// ## Errors
    ///
    /// - `DuplicateBackend`: two backends share an id
    /// - `MultiplePrimaries`: two designated primaries for one target
    /// - `OverlappingUnit`: two backends claim one unit for one target
    pub fn build(self) -> Result<BackendRegistry, DispatchError> {
        let mut registry = BackendRegistry::empty();
        let mut seen: HashSet<BackendId> = HashSet::new();
        let mut unit_owner: HashMap<(Target, OunitId), BackendId> = HashMap::new();

        for backend in self.backends {
            let descriptor = backend.descriptor().clone();
            if !seen.insert(descriptor.id.clone()) {
                return Err(DispatchError::DuplicateBackend(descriptor.id));
            }

            let backend = Arc::new(backend);
            registry.institutions.insert(descriptor.institution.clone());

            for capability in &descriptor.capabilities {
                let target = (descriptor.institution.clone(), *capability);

                for ounit in &descriptor.ounits {
                    let key = (target.clone(), ounit.clone());
                    if let Some(first) = unit_owner.get(&key) {
                        return Err(DispatchError::OverlappingUnit {
                            institution: descriptor.institution.clone(),
                            capability: *capability,
                            ounit: ounit.clone(),
                            first: first.clone(),
                            second: descriptor.id.clone(),
                        });
                    }
                    unit_owner.insert(key, descriptor.id.clone());
                }

                let list = registry.by_target.entry(target.clone()).or_default();
                if descriptor.primary {
                    if registry.primaries.contains_key(&target) {
                        return Err(DispatchError::MultiplePrimaries {
                            institution: descriptor.institution.clone(),
                            capability: *capability,
                        });
                    }
                    registry.primaries.insert(target, list.len());
                }
                list.push(Arc::clone(&backend));
            }
        }

        Ok(registry)
    }
}
