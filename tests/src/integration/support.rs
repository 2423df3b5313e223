//! # Test Support
//!
//! `RouterTransport` delivers outbound requests to other gateways' routers
//! by host name. `GatewayBuilder` assembles a complete gateway from a
//! signing seed, a registry document and an optional set of backends.

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request};
use axum::Router;
use base64::{engine::general_purpose::STANDARD, Engine};
use parking_lot::RwLock;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tower::ServiceExt;

use fg_03_dispatch_router::BackendRegistry;
use fg_04_outbound_client::{
    HttpTransport, OutboundRequest, OutboundResponse, TlsIdentity, TransportError,
};
use gateway_runtime::{
    operator_router, router, ContainerError, GatewayConfig, GatewayContainer,
    TESTING_OPERATOR_TOKEN,
};
use shared_crypto::Ed25519KeyPair;

/// Largest response body buffered by `RouterTransport`.
const MAX_BODY: usize = 4 * 1024 * 1024;

/// `HttpTransport` answering from in-process routers.
#[derive(Default)]
pub struct RouterTransport {
    hosts: RwLock<HashMap<String, Router>>,
    delivered: RwLock<Vec<OutboundRequest>>,
}

impl RouterTransport {
    /// Transport with no reachable host.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `host` with `router`, replacing any earlier route.
    pub fn route(&self, host: impl Into<String>, router: Router) {
        self.hosts.write().insert(host.into(), router);
    }

    /// Requests that reached a router, in delivery order.
    pub fn delivered(&self) -> Vec<OutboundRequest> {
        self.delivered.read().clone()
    }
}

fn to_http(request: &OutboundRequest) -> Result<Request<Body>, TransportError> {
    let mut builder = Request::builder()
        .method(request.method.as_str())
        .uri(request.path_and_query())
        .header(header::HOST, request.host());
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    let body = match request.body.content_type() {
        Some(content_type) => {
            builder = builder.header(header::CONTENT_TYPE, content_type);
            Body::from(request.body.serialize())
        }
        None => Body::empty(),
    };
    builder
        .body(body)
        .map_err(|e| TransportError::Http(e.to_string()))
}

#[async_trait]
impl HttpTransport for RouterTransport {
    async fn send(
        &self,
        request: &OutboundRequest,
        _identity: Option<&TlsIdentity>,
    ) -> Result<OutboundResponse, TransportError> {
        let host = request.host();
        let target = self.hosts.read().get(&host).cloned();
        let Some(target) = target else {
            return Err(TransportError::Connect(format!("No gateway listening at {host}")));
        };

        let response = match target.oneshot(to_http(request)?).await {
            Ok(response) => response,
            Err(never) => match never {},
        };
        self.delivered.write().push(request.clone());

        let status = response.status().as_u16();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = to_bytes(response.into_body(), MAX_BODY)
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;

        Ok(OutboundResponse::from_wire(status, headers, body.to_vec()))
    }
}

/// A running gateway and the files backing its configuration.
pub struct Gateway {
    /// Wired subsystems.
    pub container: Arc<GatewayContainer>,
    /// Key the gateway signs with.
    pub key: Ed25519KeyPair,
    _files: Vec<NamedTempFile>,
}

impl Gateway {
    /// Fresh public router over the gateway's container.
    pub fn router(&self) -> Router {
        router(Arc::clone(&self.container))
    }

    /// Fresh operator router over the gateway's container.
    pub fn operator_router(&self) -> Router {
        operator_router(Arc::clone(&self.container))
    }
}

/// `Authorization` value carrying the testing operator token.
pub fn operator_authorization() -> String {
    format!("Bearer {TESTING_OPERATOR_TOKEN}")
}

/// Assembles a `Gateway`.
pub struct GatewayBuilder {
    seed: u8,
    institutions: Map<String, Value>,
    enforce_auth: bool,
    backends: Option<BackendRegistry>,
}

impl GatewayBuilder {
    /// Gateway signing with the key derived from `[seed; 32]`.
    pub fn new(seed: u8) -> Self {
        Self {
            seed,
            institutions: Map::new(),
            enforce_auth: false,
            backends: None,
        }
    }

    /// Accept signatures made with `key` as coming from `institution`.
    pub fn trusting(mut self, institution: &str, key: &Ed25519KeyPair) -> Self {
        let entry = self.entry(institution);
        if let Some(keys) = entry["keys"].as_array_mut() {
            keys.push(json!(key.public_key().to_base64()));
        }
        self
    }

    fn entry(&mut self, institution: &str) -> &mut Value {
        self.institutions
            .entry(institution.to_string())
            .or_insert_with(|| json!({ "apis": {}, "keys": [] }))
    }

    /// Register a partner API. `auth_methods` uses the wire names.
    pub fn partner(
        mut self,
        institution: &str,
        api: &str,
        base_url: &str,
        auth_methods: &[&str],
        max_ids: Option<usize>,
    ) -> Self {
        let entry = self.entry(institution);
        entry["apis"][api] = json!({
            "baseUrl": base_url,
            "authMethods": auth_methods,
            "maxIds": max_ids,
        });
        self
    }

    /// Reject unsigned inbound requests.
    pub fn enforcing_auth(mut self) -> Self {
        self.enforce_auth = true;
        self
    }

    /// Backends behind the inbound API.
    pub fn with_backends(mut self, backends: BackendRegistry) -> Self {
        self.backends = Some(backends);
        self
    }

    /// Write the fixture files and build the container over `transport`.
    pub fn build(self, transport: Arc<dyn HttpTransport>) -> Result<Gateway, ContainerError> {
        let key = Ed25519KeyPair::from_seed([self.seed; 32]);
        let key_file = fixture_file(&STANDARD.encode([self.seed; 32]))?;
        let registry = json!({ "institutions": Value::Object(self.institutions) });
        let registry_file = fixture_file(&registry.to_string())?;

        let mut config = GatewayConfig::for_testing();
        config.server.enforce_auth = self.enforce_auth;
        config.registry.path = Some(registry_file.path().to_path_buf());
        config.outbound.signing_key = Some(key_file.path().to_path_buf());

        let container = GatewayContainer::with_transport(config, transport)?;
        if let Some(backends) = self.backends {
            container.router.reload(backends);
        }
        Ok(Gateway {
            container: Arc::new(container),
            key,
            _files: vec![key_file, registry_file],
        })
    }
}

/// Temporary file holding `contents`. Removed when the handle drops.
pub fn fixture_file(contents: &str) -> Result<NamedTempFile, ContainerError> {
    let io_error = |path: PathBuf, e: std::io::Error| ContainerError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    };
    let mut file = NamedTempFile::new().map_err(|e| io_error(std::env::temp_dir(), e))?;
    file.write_all(contents.as_bytes())
        .map_err(|e| io_error(file.path().to_path_buf(), e))?;
    Ok(file)
}
