//! # Outbound Ports (Driven Ports)
//!
//! External collaborators of the engine: the HTTP transport, the key store
//! and the federation registry.

use crate::domain::{
    FederationKey, KeyMaterial, KeyStoreError, OutboundRequest, OutboundResponse, TlsIdentity,
    TransportError,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use shared_types::{AuthMethod, InstitutionId};
use std::collections::VecDeque;
use url::Url;

/// Sends a prepared request.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send `request`, presenting `identity` in the TLS handshake if given.
    async fn send(
        &self,
        request: &OutboundRequest,
        identity: Option<&TlsIdentity>,
    ) -> Result<OutboundResponse, TransportError>;
}

/// Supplies the current key material. Read on every exchange so rotated
/// keys take effect without a restart.
pub trait KeySource: Send + Sync {
    /// Load key material.
    fn load(&self) -> Result<KeyMaterial, KeyStoreError>;
}

/// How a peer exposes one API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfiguration {
    /// Base URL of the API.
    pub base_url: Url,
    /// Supported authentication methods.
    pub auth_methods: Vec<AuthMethod>,
    /// Maximum ids per get request, if limited.
    #[serde(default)]
    pub max_ids: Option<usize>,
}

impl ApiConfiguration {
    /// Strongest supported method: HttpSignature > TlsCertificate > Anonymous.
    pub fn preferred_auth_method(&self) -> AuthMethod {
        self.auth_methods
            .iter()
            .copied()
            .max_by_key(AuthMethod::preference)
            .unwrap_or(AuthMethod::Anonymous)
    }
}

/// Read-only view of the federation registry.
pub trait PeerRegistry: Send + Sync {
    /// API entry of `institution` for `api`.
    fn api_config(&self, institution: &InstitutionId, api: &str) -> Option<ApiConfiguration>;

    /// Federation key with the given fingerprint, with its publishing
    /// institution.
    fn federation_key(&self, fingerprint: &str) -> Option<FederationKey>;
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

/// Transport answering from a queue of scripted outcomes.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<OutboundResponse, TransportError>>>,
    sent: Mutex<Vec<OutboundRequest>>,
}

impl ScriptedTransport {
    /// Empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response.
    pub fn respond(self, response: OutboundResponse) -> Self {
        self.script.lock().push_back(Ok(response));
        self
    }

    /// Queue a transport failure.
    pub fn fail(self, error: TransportError) -> Self {
        self.script.lock().push_back(Err(error));
        self
    }

    /// Requests sent so far.
    pub fn sent(&self) -> Vec<OutboundRequest> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(
        &self,
        request: &OutboundRequest,
        _identity: Option<&TlsIdentity>,
    ) -> Result<OutboundResponse, TransportError> {
        self.sent.lock().push(request.clone());
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Connect("script exhausted".to_string())))
    }
}

/// Key source returning fixed material, or a fixed error.
pub struct StaticKeySource {
    result: Result<KeyMaterial, KeyStoreError>,
}

impl StaticKeySource {
    /// Always return `material`.
    pub fn new(material: KeyMaterial) -> Self {
        Self {
            result: Ok(material),
        }
    }

    /// Always fail with `error`.
    pub fn failing(error: KeyStoreError) -> Self {
        Self { result: Err(error) }
    }
}

impl KeySource for StaticKeySource {
    fn load(&self) -> Result<KeyMaterial, KeyStoreError> {
        self.result.clone()
    }
}
