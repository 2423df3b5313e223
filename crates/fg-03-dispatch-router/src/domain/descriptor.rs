//! # Backend Descriptors
//!
//! What a backend declares about itself when loaded: which institution it
//! serves, which capabilities, and which organizational units it owns.

use serde::{Deserialize, Serialize};
use shared_types::{Capability, InstitutionId, OunitId};
use std::collections::BTreeSet;
use std::fmt;

/// Identifier of a loaded backend (plugin).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendId(String);

impl BackendId {
    /// Create from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BackendId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Static facts about a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendDescriptor {
    /// Unique backend id.
    pub id: BackendId,
    /// Institution whose data the backend holds.
    pub institution: InstitutionId,
    /// Capabilities the backend implements.
    #[serde(default)]
    pub capabilities: BTreeSet<Capability>,
    /// Organizational units the backend is authoritative for.
    #[serde(default)]
    pub ounits: BTreeSet<OunitId>,
    /// Designated first choice when no mapping disambiguates.
    #[serde(default)]
    pub primary: bool,
}

impl BackendDescriptor {
    /// Descriptor with no capabilities or units yet.
    pub fn new(id: impl Into<BackendId>, institution: impl Into<InstitutionId>) -> Self {
        Self {
            id: id.into(),
            institution: institution.into(),
            capabilities: BTreeSet::new(),
            ounits: BTreeSet::new(),
            primary: false,
        }
    }

    /// Add a served capability.
    pub fn serving(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        self
    }

    /// Add an owned organizational unit.
    pub fn covering(mut self, ounit: impl Into<OunitId>) -> Self {
        self.ounits.insert(ounit.into());
        self
    }

    /// Mark as the designated primary backend.
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    /// Whether the backend implements `capability`.
    pub fn serves(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Whether the backend owns `ounit`.
    pub fn covers(&self, ounit: &OunitId) -> bool {
        self.ounits.contains(ounit)
    }
}

impl From<String> for BackendId {
    fn from(id: String) -> Self {
        Self(id)
    }
}
