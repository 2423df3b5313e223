//! # Plugin Manifest
//!
//! Describes the backends the router loads. Each entry names the serving
//! institution, the capabilities, the covered organizational units and
//! where the data comes from:
//!
//! ```json
//! {
//!   "backends": [
//!     {
//!       "id": "law-school",
//!       "institution": "uni.example",
//!       "capabilities": ["agreements"],
//!       "ounits": ["law"],
//!       "primary": true,
//!       "source": { "type": "remote", "url": "http://localhost:9001/" }
//!     },
//!     {
//!       "id": "fixtures",
//!       "institution": "test.example",
//!       "capabilities": ["agreements"],
//!       "source": {
//!         "type": "in-memory",
//!         "records": { "agreements": [{ "id": "a1", "ownerOunitId": "u1" }] },
//!         "stats": { "agreements": { "fetchable": 1 } }
//!       }
//!     }
//!   ]
//! }
//! ```
//!
//! A manifest is turned into a complete `BackendRegistry`; the router swaps
//! it in as a whole.

use fg_03_dispatch_router::{
    Backend, BackendDescriptor, BackendRegistry, DispatchError, InMemoryBackend, RemoteBackend,
};
use serde::Deserialize;
use shared_types::{BackendStats, Capability, OunitId, Record, UnknownCapability};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Failure loading a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PluginError {
    /// The manifest file could not be read.
    #[error("Cannot read plugin manifest {path}: {message}")]
    Io {
        /// Manifest path.
        path: String,
        /// OS error.
        message: String,
    },

    /// The manifest is not valid JSON of the expected shape.
    #[error("Invalid plugin manifest: {0}")]
    Parse(String),

    /// A capability name is unknown.
    #[error("Backend {backend}: {source}")]
    UnknownCapability {
        /// Backend declaring it.
        backend: String,
        /// Offending name.
        source: UnknownCapability,
    },

    /// The backends do not form a valid registry.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Parsed manifest.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PluginManifest {
    /// Backends in registration order.
    #[serde(default)]
    pub backends: Vec<BackendEntry>,
}

/// One backend of the manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendEntry {
    /// Unique backend id.
    pub id: String,
    /// Institution served.
    pub institution: String,
    /// Capability wire names.
    pub capabilities: Vec<String>,
    /// Organizational units this backend is authoritative for.
    #[serde(default)]
    pub ounits: Vec<OunitId>,
    /// Designated first choice for unmapped ids.
    #[serde(default)]
    pub primary: bool,
    /// Where the data lives.
    pub source: BackendSource,
}

/// Data source of a backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum BackendSource {
    /// Plugin process reached over HTTP.
    Remote {
        /// Base URL of the plugin.
        url: String,
    },
    /// Records held in the manifest itself.
    InMemory {
        /// Records per capability wire name.
        #[serde(default)]
        records: BTreeMap<String, Vec<Record>>,
        /// Counters per capability wire name.
        #[serde(default)]
        stats: BTreeMap<String, BackendStats>,
    },
}

impl PluginManifest {
    /// Parse a manifest document.
    pub fn from_json(json: &str) -> Result<Self, PluginError> {
        serde_json::from_str(json).map_err(|e| PluginError::Parse(e.to_string()))
    }

    /// Read and parse a manifest file.
    pub fn from_file(path: &Path) -> Result<Self, PluginError> {
        let json = std::fs::read_to_string(path).map_err(|e| PluginError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json(&json)
    }

    /// Build the registry. `timeout` applies to remote backends.
    ///
    /// ## Errors
    ///
    /// - `UnknownCapability`: a capability name matches nothing
    /// - `Dispatch`: invalid URL, duplicate id, several primaries, or
    ///   overlapping units
    pub fn into_registry(self, timeout: Duration) -> Result<BackendRegistry, PluginError> {
        let mut builder = BackendRegistry::builder();
        let count = self.backends.len();
        for entry in self.backends {
            builder = builder.register(entry.into_backend(timeout)?);
        }
        let registry = builder.build()?;
        info!(backends = count, "Plugin manifest loaded");
        Ok(registry)
    }
}

impl BackendEntry {
    fn capability(&self, name: &str) -> Result<Capability, PluginError> {
        name.parse().map_err(|source| PluginError::UnknownCapability {
            backend: self.id.clone(),
            source,
        })
    }

    fn into_backend(self, timeout: Duration) -> Result<Backend, PluginError> {
        let mut descriptor = BackendDescriptor::new(self.id.as_str(), self.institution.as_str());
        for name in &self.capabilities {
            descriptor = descriptor.serving(self.capability(name)?);
        }
        for ounit in &self.ounits {
            descriptor = descriptor.covering(ounit.clone());
        }
        if self.primary {
            descriptor = descriptor.primary();
        }

        match &self.source {
            BackendSource::Remote { url } => {
                Ok(Backend::Remote(RemoteBackend::new(descriptor, url, timeout)?))
            }
            BackendSource::InMemory { records, stats } => {
                let mut backend = InMemoryBackend::new(descriptor);
                for (name, records) in records {
                    backend = backend.with_records(self.capability(name)?, records.clone());
                }
                for (name, counters) in stats {
                    backend = backend.with_stats(self.capability(name)?, counters.clone());
                }
                Ok(Backend::InMemory(backend))
            }
        }
    }
}
