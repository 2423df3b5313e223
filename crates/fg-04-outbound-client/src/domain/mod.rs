//! # Domain Layer
//!
//! Envelope, results, signatures and key material of outbound exchanges.

pub mod errors;
pub mod keys;
pub mod request;
pub mod result;
pub mod signing;

pub use errors::{ClientError, KeyStoreError, RegistryError, SigningError, TransportError};
pub use keys::{is_self_issued, FederationKey, KeyMaterial, TlsIdentity};
pub use request::{
    charset, decode_body, normalize_content_type, HttpMethod, OutboundRequest, OutboundResponse,
    RequestBody,
};
pub use result::{
    ExchangeContext, ExchangeState, OperationResult, ResponseAuthentication, SuccessfulExchange,
};
pub use signing::{
    sign_request, sign_response, verify_request, verify_response, SignatureParams, SignedRequest,
};
