//! # Request/Response Envelope
//!
//! The request as the engine signs and sends it, and the response as the
//! transport hands it back.

use fg_01_communication_log::{HttpRequestRecord, HttpResponseRecord};
use shared_types::{AuthMethod, CorrelationId, InstitutionId};
use std::fmt;
use url::Url;

/// HTTP methods the federation protocol uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// `GET`
    Get,
    /// `POST`
    Post,
}

impl HttpMethod {
    /// Upper-case wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RequestBody {
    /// No body.
    #[default]
    Empty,
    /// `application/x-www-form-urlencoded` parameters, order preserved.
    Form(Vec<(String, String)>),
    /// Pre-serialized body with its content type.
    Raw {
        /// Content type sent with the body.
        content_type: String,
        /// Body text.
        body: String,
    },
}

impl RequestBody {
    /// Bytes as they go on the wire. Also the input of the body digest.
    pub fn serialize(&self) -> String {
        match self {
            RequestBody::Empty => String::new(),
            RequestBody::Form(params) => url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(params.iter())
                .finish(),
            RequestBody::Raw { body, .. } => body.clone(),
        }
    }

    /// Content type header value, if the body has one.
    pub fn content_type(&self) -> Option<&str> {
        match self {
            RequestBody::Empty => None,
            RequestBody::Form(_) => Some("application/x-www-form-urlencoded"),
            RequestBody::Raw { content_type, .. } => Some(content_type),
        }
    }
}

/// A request to a partner gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Full target URL, query included.
    pub url: Url,
    /// How the request authenticates.
    pub auth_method: AuthMethod,
    /// Headers in insertion order. Signing appends to these.
    pub headers: Vec<(String, String)>,
    /// Payload.
    pub body: RequestBody,
    /// Fresh id sent as `X-Request-Id`.
    pub correlation_id: CorrelationId,
    /// Institution addressed. Used for log filtering. When set, only keys
    /// this institution publishes can sign the response.
    pub target_institution: Option<InstitutionId>,
}

impl OutboundRequest {
    /// `GET` without a body.
    pub fn get(url: Url, auth_method: AuthMethod) -> Self {
        Self::new(HttpMethod::Get, url, auth_method, RequestBody::Empty)
    }

    /// `POST` with form parameters.
    pub fn post_form(url: Url, auth_method: AuthMethod, params: Vec<(String, String)>) -> Self {
        Self::new(HttpMethod::Post, url, auth_method, RequestBody::Form(params))
    }

    fn new(method: HttpMethod, url: Url, auth_method: AuthMethod, body: RequestBody) -> Self {
        Self {
            method,
            url,
            auth_method,
            headers: Vec::new(),
            body,
            correlation_id: CorrelationId::new(),
            target_institution: None,
        }
    }

    /// Tag the addressed institution.
    pub fn targeting(mut self, institution: InstitutionId) -> Self {
        self.target_institution = Some(institution);
        self
    }

    /// Append a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// First header named `name`, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Path and query, as used in `(request-target)`.
    pub fn path_and_query(&self) -> String {
        match self.url.query() {
            Some(query) => format!("{}?{}", self.url.path(), query),
            None => self.url.path().to_string(),
        }
    }

    /// Host with a non-default port, as used in the `host` signature line.
    pub fn host(&self) -> String {
        let host = self.url.host_str().unwrap_or_default();
        match self.url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }

    /// Snapshot for the communication log.
    pub fn to_record(&self) -> HttpRequestRecord {
        HttpRequestRecord {
            method: self.method.to_string(),
            url: self.url.to_string(),
            headers: self.headers.clone(),
            body: self.body.serialize(),
        }
    }
}

/// A response as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundResponse {
    /// HTTP status code.
    pub status: u16,
    /// Normalized content type.
    pub media_type: Option<String>,
    /// Headers in received order.
    pub headers: Vec<(String, String)>,
    /// Body bytes exactly as received. The `Digest` check runs over these.
    pub body: Vec<u8>,
    /// Body decoded with the charset named by `media_type`.
    pub raw_body: String,
}

impl OutboundResponse {
    /// Response with a status and body only.
    pub fn new(status: u16, raw_body: impl Into<String>) -> Self {
        let raw_body = raw_body.into();
        Self {
            status,
            media_type: None,
            headers: Vec::new(),
            body: raw_body.clone().into_bytes(),
            raw_body,
        }
    }

    /// Response as read off the wire. The media type is taken from
    /// `Content-Type` after normalization and decides how `body` decodes.
    pub fn from_wire(status: u16, headers: Vec<(String, String)>, body: Vec<u8>) -> Self {
        let media_type = find_header(&headers, "content-type").map(normalize_content_type);
        let raw_body = decode_body(&body, media_type.as_deref());
        Self {
            status,
            media_type,
            headers,
            body,
            raw_body,
        }
    }

    /// Append a header. `Content-Type` also sets the normalized media type
    /// and re-decodes the body with its charset.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let (name, value) = (name.into(), value.into());
        if name.eq_ignore_ascii_case("content-type") {
            let media_type = normalize_content_type(&value);
            self.raw_body = decode_body(&self.body, Some(&media_type));
            self.media_type = Some(media_type);
        }
        self.headers.push((name, value));
        self
    }

    /// 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 4xx
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    /// 5xx
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }

    /// First header named `name`, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Snapshot for the communication log.
    pub fn to_record(&self) -> HttpResponseRecord {
        HttpResponseRecord {
            status: self.status,
            media_type: self.media_type.clone(),
            headers: self.headers.clone(),
            body: self.raw_body.clone(),
        }
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// `charset` parameter of a media type, lower-cased and unquoted.
pub fn charset(media_type: &str) -> Option<String> {
    media_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"').to_ascii_lowercase())
    })
}

/// Decode a body. Latin-1 and ASCII bodies map byte for byte; anything
/// else is read as UTF-8, replacing invalid sequences.
pub fn decode_body(body: &[u8], media_type: Option<&str>) -> String {
    match media_type.and_then(charset).as_deref() {
        Some("iso-8859-1" | "latin1" | "latin-1" | "us-ascii") => {
            body.iter().copied().map(char::from).collect()
        }
        _ => String::from_utf8_lossy(body).into_owned(),
    }
}

/// Repair a bare `xml; charset=...` content type into
/// `application/xml; charset=...`. Anything else is returned unchanged.
pub fn normalize_content_type(value: &str) -> String {
    let trimmed = value.trim_start_matches([' ', '\t']);
    let Some(rest) = trimmed.strip_prefix("xml") else {
        return value.to_string();
    };
    let after = rest.trim_start_matches([' ', '\t']);
    match after.strip_prefix(';') {
        Some(params) if params.trim_start_matches([' ', '\t']).starts_with("charset=") => {
            format!("application/xml{rest}")
        }
        _ => value.to_string(),
    }
}
