//! # FG-04 Outbound Request Engine
//!
//! Signs, sends and classifies requests toward partner gateways. Every call
//! ends in exactly one of four `OperationResult` variants and is recorded as
//! exactly one communication log entry.
//!
//! **Subsystem ID:** 04
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Classification
//!
//! | Condition | Result |
//! |-----------|--------|
//! | 2xx, parseable body | `Success` |
//! | 400, parseable error document | `ClientErrorResponse` |
//! | other 4xx, or unparseable 4xx body | `InternalError` (authentication failure) |
//! | 5xx, bad response signature, unparseable 2xx body | `InvalidResponse` |
//! | 1xx or 3xx (redirects are not followed) | `InternalError` |
//! | key store, signing or transport failure | `InternalError` |
//!
//! ## Security
//!
//! - TLS client identities are presented unless self-issued
//! - HTTP signatures are Ed25519 over `(request-target) host digest x-request-id`
//! - Responses to signed requests must be signed over the echoed request id,
//!   with a key the addressed institution publishes
//!
//! ## Module Structure
//!
//! ```text
//! fg-04-outbound-client/
//! ├── domain/          # Envelope, OperationResult, signing, key material, errors
//! ├── ports/           # OutboundApi, HttpTransport, KeySource, PeerRegistry
//! ├── adapters/        # ReqwestTransport, PemKeyStore, StaticRegistry
//! ├── service.rs       # OutboundClient
//! ├── peer_api.rs      # PeerApiClient (index/get/stats toward peers)
//! └── monitoring.rs    # MonitoringReporter
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod domain;
pub mod monitoring;
pub mod peer_api;
pub mod ports;
pub mod service;

// Re-exports
pub use adapters::{InstitutionEntry, PemKeyStore, ReqwestTransport, StaticRegistry};
pub use domain::{
    charset, decode_body, normalize_content_type, sign_request, sign_response, verify_request,
    verify_response, ClientError, ExchangeContext, ExchangeState, FederationKey, HttpMethod,
    KeyMaterial, KeyStoreError,
    OperationResult, OutboundRequest, OutboundResponse, RegistryError, RequestBody,
    ResponseAuthentication, SignatureParams, SignedRequest, SigningError, SuccessfulExchange,
    TlsIdentity, TransportError,
};
pub use monitoring::{MonitoringReport, MonitoringReporter, MONITORING_API};
pub use peer_api::PeerApiClient;
pub use ports::{
    ApiConfiguration, HttpTransport, KeySource, OutboundApi, PeerRegistry, ScriptedTransport,
    StaticKeySource,
};
pub use service::OutboundClient;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
