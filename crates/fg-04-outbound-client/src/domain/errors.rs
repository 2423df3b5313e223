//! # Outbound Client Errors

use shared_crypto::CryptoError;
use shared_types::{Capability, ErrorResponse, InstitutionId};
use thiserror::Error;

/// Failure sending a request or reading its response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// TCP/TLS connection could not be established.
    #[error("Connection failed: {0}")]
    Connect(String),

    /// No answer within the configured timeout.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The TLS client identity was rejected by the HTTP stack.
    #[error("Invalid client identity: {0}")]
    InvalidIdentity(String),

    /// Any other HTTP-level failure.
    #[error("HTTP failure: {0}")]
    Http(String),
}

/// Failure loading key material.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyStoreError {
    /// A key file could not be read.
    #[error("Cannot read {path}: {message}")]
    Io {
        /// File path.
        path: String,
        /// OS error.
        message: String,
    },

    /// No certificate in the PEM data, or it does not parse.
    #[error("Invalid certificate: {0}")]
    InvalidCertificate(String),

    /// No private key in the PEM data.
    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    /// The HTTP signature seed is not a base64 32-byte value.
    #[error("Invalid signing key: {0}")]
    InvalidSigningKey(#[from] CryptoError),
}

/// Failure creating or checking an HTTP signature.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SigningError {
    /// The request must be signed but no signing key is loaded.
    #[error("No HTTP signature key configured")]
    MissingSigningKey,

    /// A header needed for verification is absent.
    #[error("Missing {0} header")]
    MissingHeader(&'static str),

    /// The `Signature` header does not parse.
    #[error("Malformed Signature header: {0}")]
    MalformedHeader(String),

    /// The signature names an algorithm other than ed25519.
    #[error("Unsupported signature algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The signature does not cover the required headers.
    #[error("Signature does not cover {0}")]
    UncoveredHeader(&'static str),

    /// `keyId` is not a known federation key.
    #[error("Unknown key: {0}")]
    UnknownKey(String),

    /// The key is registered, but not as one of the addressed institution's.
    #[error("Key {key_id} is not published by {institution}")]
    ForeignKey {
        /// Fingerprint of the signing key.
        key_id: String,
        /// Institution the request was sent to.
        institution: InstitutionId,
    },

    /// The body does not match its `Digest` header.
    #[error("Digest mismatch")]
    DigestMismatch,

    /// The response does not echo the request id.
    #[error("Request id mismatch: expected {expected}, got {actual}")]
    RequestIdMismatch {
        /// Id that was sent.
        expected: String,
        /// Id that came back.
        actual: String,
    },

    /// Cryptographic verification failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Failure loading a registry document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The document is not valid JSON of the expected shape.
    #[error("Invalid registry document: {0}")]
    Parse(String),

    /// A listed federation key does not decode.
    #[error("Invalid federation key {key}: {source}")]
    InvalidKey {
        /// Key as written in the document.
        key: String,
        /// Decoding failure.
        source: CryptoError,
    },
}

/// Error surfaced to callers that expect a successful exchange.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The peer answered 400 with an error document.
    #[error("Peer returned error response (HTTP {status}): {error}")]
    ErrorResponse {
        /// HTTP status.
        status: u16,
        /// Peer's error document.
        error: ErrorResponse,
    },

    /// The peer's answer was unusable.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The exchange could not be carried out.
    #[error("Internal error: {0}")]
    Internal(String),

    /// The registry has no API entry for the target.
    #[error("No {api} API registered for {institution}")]
    NoApiConfiguration {
        /// Target institution.
        institution: InstitutionId,
        /// API name.
        api: String,
    },

    /// More ids than the peer accepts per request.
    #[error("Requested {requested} ids for {capability}, peer accepts at most {max}")]
    TooManyIds {
        /// Capability addressed.
        capability: Capability,
        /// Ids requested.
        requested: usize,
        /// Peer limit.
        max: usize,
    },

    /// The call was refused before anything was sent.
    #[error("Request rejected: {0}")]
    Rejected(String),
}
