//! # Static Registry
//!
//! `PeerRegistry` loaded once from a JSON document:
//!
//! ```json
//! {
//!   "institutions": {
//!     "uni.example": {
//!       "apis": {
//!         "agreements": {
//!           "baseUrl": "https://gw.uni.example/rest/agreements/",
//!           "authMethods": ["HTTP_SIGNATURE", "TLS_CERTIFICATE"],
//!           "maxIds": 3
//!         }
//!       },
//!       "keys": ["<base64 ed25519 public key>"]
//!     }
//!   },
//!   "keys": ["<base64 ed25519 public key>"]
//! }
//! ```
//!
//! Keys under an institution are that institution's and may sign its
//! responses. Top-level keys belong to no institution. They can
//! authenticate inbound callers only.

use crate::domain::{FederationKey, RegistryError};
use crate::ports::{ApiConfiguration, PeerRegistry};
use serde::{Deserialize, Serialize};
use shared_crypto::Ed25519PublicKey;
use shared_types::InstitutionId;
use std::collections::HashMap;

/// APIs one institution exposes, and the keys it signs with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstitutionEntry {
    /// API name to configuration.
    #[serde(default)]
    pub apis: HashMap<String, ApiConfiguration>,
    /// Base64 Ed25519 keys published by the institution.
    #[serde(default)]
    pub keys: Vec<String>,
}

#[derive(Deserialize)]
struct RegistryDocument {
    #[serde(default)]
    institutions: HashMap<InstitutionId, InstitutionEntry>,
    #[serde(default)]
    keys: Vec<String>,
}

/// In-memory registry.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    institutions: HashMap<InstitutionId, InstitutionEntry>,
    keys: HashMap<String, FederationKey>,
}

impl StaticRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a registry document.
    ///
    /// ## Errors
    ///
    /// - `Parse`: malformed JSON
    /// - `InvalidKey`: a key is not a base64 32-byte Ed25519 key
    pub fn from_json(json: &str) -> Result<Self, RegistryError> {
        let document: RegistryDocument =
            serde_json::from_str(json).map_err(|e| RegistryError::Parse(e.to_string()))?;
        let mut registry = Self::new();
        for key in document.keys {
            registry = registry.with_key(parse_key(key)?);
        }
        for (institution, entry) in &document.institutions {
            for key in &entry.keys {
                registry = registry.with_institution_key(institution.clone(), parse_key(key.clone())?);
            }
        }
        registry.institutions = document.institutions;
        Ok(registry)
    }

    /// Register an API of an institution.
    pub fn with_api(
        mut self,
        institution: impl Into<InstitutionId>,
        api: impl Into<String>,
        config: ApiConfiguration,
    ) -> Self {
        self.institutions
            .entry(institution.into())
            .or_default()
            .apis
            .insert(api.into(), config);
        self
    }

    /// Register a federation key no institution publishes.
    pub fn with_key(mut self, key: Ed25519PublicKey) -> Self {
        let key = FederationKey::new(key, None);
        self.keys.insert(key.key_id.clone(), key);
        self
    }

    /// Register a key published by `institution`.
    pub fn with_institution_key(
        mut self,
        institution: impl Into<InstitutionId>,
        key: Ed25519PublicKey,
    ) -> Self {
        let key = FederationKey::new(key, Some(institution.into()));
        self.keys.insert(key.key_id.clone(), key);
        self
    }

    /// Number of institutions listed.
    pub fn institution_count(&self) -> usize {
        self.institutions.len()
    }
}

impl PeerRegistry for StaticRegistry {
    fn api_config(&self, institution: &InstitutionId, api: &str) -> Option<ApiConfiguration> {
        self.institutions.get(institution)?.apis.get(api).cloned()
    }

    fn federation_key(&self, fingerprint: &str) -> Option<FederationKey> {
        self.keys.get(fingerprint).cloned()
    }
}

fn parse_key(key: String) -> Result<Ed25519PublicKey, RegistryError> {
    Ed25519PublicKey::from_base64(&key).map_err(|source| RegistryError::InvalidKey { key, source })
}
