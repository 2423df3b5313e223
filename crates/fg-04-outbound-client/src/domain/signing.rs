//! # HTTP Signatures
//!
//! Ed25519 signatures over a canonical string built from selected headers.
//!
//! ## Request Signing String
//!
//! ```text
//! (request-target): <lowercase method> <path-and-query>
//! host: <host>
//! digest: SHA-256=<base64(sha256(body))>
//! x-request-id: <correlation id>
//! ```
//!
//! ## Response Signing String
//!
//! ```text
//! x-request-id: <echoed correlation id>
//! digest: SHA-256=<base64(sha256(body))>
//! (status): <status code>
//! ```
//!
//! Both travel in a `Signature` header:
//! `keyId="<fingerprint>",algorithm="ed25519",headers="...",signature="<base64>"`.

use super::errors::SigningError;
use super::keys::FederationKey;
use super::request::{OutboundRequest, OutboundResponse};
use super::result::ResponseAuthentication;
use shared_crypto::{digest_header_value, Ed25519KeyPair, Ed25519Signature};

/// Only supported algorithm.
pub const ALGORITHM: &str = "ed25519";

/// Pseudo-headers and headers covered by a request signature.
pub const REQUEST_SIGNED_HEADERS: [&str; 4] = ["(request-target)", "host", "digest", "x-request-id"];

/// Pseudo-headers and headers covered by a response signature.
pub const RESPONSE_SIGNED_HEADERS: [&str; 3] = ["x-request-id", "digest", "(status)"];

/// Parsed `Signature` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureParams {
    /// Fingerprint of the signing key.
    pub key_id: String,
    /// Signature algorithm.
    pub algorithm: String,
    /// Covered headers, in signing-string order.
    pub headers: Vec<String>,
    /// Base64 signature.
    pub signature: String,
}

impl SignatureParams {
    fn new(key_id: String, covered: &[&str], signature: &Ed25519Signature) -> Self {
        Self {
            key_id,
            algorithm: ALGORITHM.to_string(),
            headers: covered.iter().map(|h| h.to_string()).collect(),
            signature: signature.to_base64(),
        }
    }

    /// Render as a header value.
    pub fn to_header(&self) -> String {
        format!(
            "keyId=\"{}\",algorithm=\"{}\",headers=\"{}\",signature=\"{}\"",
            self.key_id,
            self.algorithm,
            self.headers.join(" "),
            self.signature
        )
    }

    /// Parse a header value.
    pub fn parse(value: &str) -> Result<Self, SigningError> {
        let (mut key_id, mut algorithm, mut headers, mut signature) = (None, None, None, None);

        for part in value.split(',') {
            let (name, raw) = part
                .trim()
                .split_once('=')
                .ok_or_else(|| SigningError::MalformedHeader(format!("expected name=value in {part:?}")))?;
            let unquoted = raw
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .ok_or_else(|| SigningError::MalformedHeader(format!("unquoted value for {name}")))?;
            match name {
                "keyId" => key_id = Some(unquoted.to_string()),
                "algorithm" => algorithm = Some(unquoted.to_string()),
                "headers" => headers = Some(unquoted.split_whitespace().map(str::to_lowercase).collect()),
                "signature" => signature = Some(unquoted.to_string()),
                _ => {}
            }
        }

        Ok(Self {
            key_id: key_id.ok_or_else(|| SigningError::MalformedHeader("missing keyId".into()))?,
            algorithm: algorithm.unwrap_or_else(|| ALGORITHM.to_string()),
            headers: headers.ok_or_else(|| SigningError::MalformedHeader("missing headers".into()))?,
            signature: signature
                .ok_or_else(|| SigningError::MalformedHeader("missing signature".into()))?,
        })
    }

    fn require(&self, covered: &[&'static str]) -> Result<(), SigningError> {
        if !self.algorithm.eq_ignore_ascii_case(ALGORITHM) {
            return Err(SigningError::UnsupportedAlgorithm(self.algorithm.clone()));
        }
        for &header in covered {
            if !self.headers.iter().any(|h| h == header) {
                return Err(SigningError::UncoveredHeader(header));
            }
        }
        Ok(())
    }
}

/// Canonical string signed on requests.
pub fn request_signing_string(
    method: &str,
    path_and_query: &str,
    host: &str,
    digest: &str,
    request_id: &str,
) -> String {
    format!(
        "(request-target): {} {}\nhost: {}\ndigest: {}\nx-request-id: {}",
        method.to_lowercase(),
        path_and_query,
        host,
        digest,
        request_id
    )
}

/// Canonical string signed on responses.
pub fn response_signing_string(request_id: &str, digest: &str, status: u16) -> String {
    format!("x-request-id: {request_id}\ndigest: {digest}\n(status): {status}")
}

/// Attach `Digest`, `X-Request-Id` and `Signature` to `request`.
pub fn sign_request(key: &Ed25519KeyPair, request: &mut OutboundRequest) {
    let digest = digest_header_value(request.body.serialize().as_bytes());
    let request_id = request.correlation_id.to_string();
    let signing_string = request_signing_string(
        request.method.as_str(),
        &request.path_and_query(),
        &request.host(),
        &digest,
        &request_id,
    );
    let signature = key.sign(signing_string.as_bytes());
    let params = SignatureParams::new(key.public_key().fingerprint(), &REQUEST_SIGNED_HEADERS, &signature);

    request.headers.push(("Digest".to_string(), digest));
    request.headers.push(("X-Request-Id".to_string(), request_id));
    request.headers.push(("Signature".to_string(), params.to_header()));
}

/// Headers a gateway attaches to a response it signs.
pub fn sign_response(
    key: &Ed25519KeyPair,
    request_id: &str,
    status: u16,
    body: &[u8],
) -> Vec<(String, String)> {
    let digest = digest_header_value(body);
    let signature = key.sign(response_signing_string(request_id, &digest, status).as_bytes());
    let params = SignatureParams::new(key.public_key().fingerprint(), &RESPONSE_SIGNED_HEADERS, &signature);
    vec![
        ("Digest".to_string(), digest),
        ("X-Request-Id".to_string(), request_id.to_string()),
        ("Signature".to_string(), params.to_header()),
    ]
}

/// An inbound request, as seen by the receiving gateway.
#[derive(Debug, Clone, Copy)]
pub struct SignedRequest<'a> {
    /// HTTP method.
    pub method: &'a str,
    /// Path and query as received.
    pub path_and_query: &'a str,
    /// `Host` header value.
    pub host: &'a str,
    /// All headers.
    pub headers: &'a [(String, String)],
    /// Raw body.
    pub body: &'a [u8],
}

fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Verify an inbound request signature. Returns the verifying key.
///
/// ## Errors
///
/// Any `SigningError` describing why the request is not authentic.
pub fn verify_request(
    request: &SignedRequest<'_>,
    lookup: impl Fn(&str) -> Option<FederationKey>,
) -> Result<FederationKey, SigningError> {
    let params = SignatureParams::parse(
        header(request.headers, "signature").ok_or(SigningError::MissingHeader("Signature"))?,
    )?;
    params.require(&REQUEST_SIGNED_HEADERS)?;
    let key = lookup(&params.key_id).ok_or_else(|| SigningError::UnknownKey(params.key_id.clone()))?;

    let digest = header(request.headers, "digest").ok_or(SigningError::MissingHeader("Digest"))?;
    if digest != digest_header_value(request.body) {
        return Err(SigningError::DigestMismatch);
    }
    let request_id =
        header(request.headers, "x-request-id").ok_or(SigningError::MissingHeader("X-Request-Id"))?;

    let signing_string =
        request_signing_string(request.method, request.path_and_query, request.host, digest, request_id);
    key.key
        .verify(signing_string.as_bytes(), &Ed25519Signature::from_base64(&params.signature)?)?;
    Ok(key)
}

fn check_response(
    request: &OutboundRequest,
    response: &OutboundResponse,
    lookup: impl Fn(&str) -> Option<FederationKey>,
) -> Result<String, SigningError> {
    let params =
        SignatureParams::parse(response.header("signature").ok_or(SigningError::MissingHeader("Signature"))?)?;
    params.require(&RESPONSE_SIGNED_HEADERS)?;
    let key = lookup(&params.key_id).ok_or_else(|| SigningError::UnknownKey(params.key_id.clone()))?;
    if let Some(institution) = &request.target_institution {
        if !key.belongs_to(institution) {
            return Err(SigningError::ForeignKey {
                key_id: params.key_id,
                institution: institution.clone(),
            });
        }
    }

    let digest = response.header("digest").ok_or(SigningError::MissingHeader("Digest"))?;
    if digest != digest_header_value(&response.body) {
        return Err(SigningError::DigestMismatch);
    }
    let expected = request.correlation_id.to_string();
    let echoed = response
        .header("x-request-id")
        .ok_or(SigningError::MissingHeader("X-Request-Id"))?;
    if echoed != expected {
        return Err(SigningError::RequestIdMismatch {
            expected,
            actual: echoed.to_string(),
        });
    }

    let signing_string = response_signing_string(echoed, digest, response.status);
    key.key
        .verify(signing_string.as_bytes(), &Ed25519Signature::from_base64(&params.signature)?)?;
    Ok(params.key_id)
}

/// Check who produced `response`, against the request's auth method.
///
/// Only HTTP-signature requests expect signed responses. When the request
/// names its target institution, the signing key must be one it publishes.
pub fn verify_response(
    request: &OutboundRequest,
    response: &OutboundResponse,
    lookup: impl Fn(&str) -> Option<FederationKey>,
) -> ResponseAuthentication {
    if !request.auth_method.requires_request_signature() {
        return ResponseAuthentication::NotRequired;
    }
    match check_response(request, response, lookup) {
        Ok(key_id) => ResponseAuthentication::Valid { key_id },
        Err(e) => ResponseAuthentication::Invalid {
            reason: e.to_string(),
        },
    }
}
