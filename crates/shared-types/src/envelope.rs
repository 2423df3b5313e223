//! # Wire Envelope Types
//!
//! Pieces of the request/response envelope that several subsystems need to
//! agree on: the authentication method, the correlation id carried in
//! `X-Request-Id`, and the structured error document.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// How a request is authenticated toward the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthMethod {
    /// No authentication.
    Anonymous,
    /// TLS client certificate.
    TlsCertificate,
    /// HTTP signature over method, target, digest and request id.
    HttpSignature,
}

impl AuthMethod {
    /// Whether the request itself must carry a signature header.
    pub fn requires_request_signature(&self) -> bool {
        matches!(self, AuthMethod::HttpSignature)
    }

    /// Preference rank when a peer supports several methods (higher wins).
    pub fn preference(&self) -> u8 {
        match self {
            AuthMethod::HttpSignature => 2,
            AuthMethod::TlsCertificate => 1,
            AuthMethod::Anonymous => 0,
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMethod::Anonymous => write!(f, "ANONYMOUS"),
            AuthMethod::TlsCertificate => write!(f, "TLS_CERTIFICATE"),
            AuthMethod::HttpSignature => write!(f, "HTTP_SIGNATURE"),
        }
    }
}

/// Correlation id for one exchange, sent as `X-Request-Id`.
///
/// UUID v7, so ids sort by creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generate a fresh id.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Parse from the textual form.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }

    /// Underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for CorrelationId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Structured failure document returned by a gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// Message meant for end users. Empty when the failure is technical.
    #[serde(default)]
    pub user_message: String,
    /// Message meant for the developer of the calling system.
    pub developer_message: String,
}

impl ErrorResponse {
    /// Technical failure with an empty user message.
    pub fn developer(message: impl Into<String>) -> Self {
        Self {
            user_message: String::new(),
            developer_message: message.into(),
        }
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.user_message.is_empty() {
            write!(f, "{}", self.developer_message)
        } else {
            write!(f, "{} ({})", self.developer_message, self.user_message)
        }
    }
}
