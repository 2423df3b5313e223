//! # Log Entities
//!
//! A `CommunicationLog` is one node of the tree. Protocol-specific fields are
//! carried in `CommunicationDetail`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared_types::{AuthMethod, InstitutionId};
use std::fmt;

/// Maximum number of characters kept from an observation text.
pub const MAX_OBSERVATIONS_LEN: usize = 65_535;

/// Appended to observations that were cut at `MAX_OBSERVATIONS_LEN`.
pub const TRUNCATION_MARKER: &str = "====TRUNCATED====";

/// Surrogate key of a log entry. Monotonic, assigned by the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogId(pub u64);

impl fmt::Display for LogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Truncate `text` to `MAX_OBSERVATIONS_LEN` characters and append the
/// marker. Short text is returned unchanged.
///
/// Cuts on a character boundary, so the result is always valid UTF-8 and
/// at most `MAX_OBSERVATIONS_LEN + TRUNCATION_MARKER.len()` characters long.
pub fn truncate_observations(text: &str) -> String {
    match text.char_indices().nth(MAX_OBSERVATIONS_LEN) {
        None => text.to_string(),
        Some((cut, _)) => {
            let mut truncated = String::with_capacity(cut + TRUNCATION_MARKER.len());
            truncated.push_str(&text[..cut]);
            truncated.push_str(TRUNCATION_MARKER);
            truncated
        }
    }
}

/// Raw outbound or inbound request as seen on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpRequestRecord {
    /// HTTP method.
    pub method: String,
    /// Full target URL.
    pub url: String,
    /// Header name/value pairs, in send order.
    pub headers: Vec<(String, String)>,
    /// Body as text (form-encoded or raw).
    pub body: String,
}

/// Raw response as received or sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpResponseRecord {
    /// HTTP status code.
    pub status: u16,
    /// Media type after normalization.
    pub media_type: Option<String>,
    /// Header name/value pairs.
    pub headers: Vec<(String, String)>,
    /// Body as text.
    pub body: String,
}

/// Protocol-specific part of a log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommunicationDetail {
    /// Plain entry without protocol data.
    Generic,
    /// A call into a backend plugin.
    PluginCall {
        /// Plugin (backend) identifier.
        plugin: String,
        /// Function invoked on the plugin.
        function: String,
    },
    /// Exchange initiated by this gateway toward a peer.
    OutboundHttp {
        /// Authentication method used for the request.
        auth_method: AuthMethod,
        /// Request as sent.
        request: HttpRequestRecord,
        /// Response as received, when one was obtained.
        response: Option<HttpResponseRecord>,
        /// Institution the request targets, when known.
        target_institution: Option<InstitutionId>,
    },
    /// Exchange initiated by a peer toward this gateway.
    InboundHttp {
        /// Authentication method the peer used.
        auth_method: AuthMethod,
        /// Request as received.
        request: HttpRequestRecord,
        /// Response as sent.
        response: Option<HttpResponseRecord>,
        /// Institution of the requester, when authenticated.
        requester_institution: Option<InstitutionId>,
    },
}

impl CommunicationDetail {
    /// Discriminator used in filters.
    pub fn kind(&self) -> LogKind {
        match self {
            CommunicationDetail::Generic => LogKind::Generic,
            CommunicationDetail::PluginCall { .. } => LogKind::PluginCall,
            CommunicationDetail::OutboundHttp { .. } => LogKind::OutboundHttp,
            CommunicationDetail::InboundHttp { .. } => LogKind::InboundHttp,
        }
    }
}

/// Discriminator of `CommunicationDetail`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogKind {
    /// `CommunicationDetail::Generic`
    Generic,
    /// `CommunicationDetail::PluginCall`
    PluginCall,
    /// `CommunicationDetail::OutboundHttp`
    OutboundHttp,
    /// `CommunicationDetail::InboundHttp`
    InboundHttp,
}

/// One node of the communication log tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunicationLog {
    /// Surrogate key.
    pub id: LogId,
    /// When the exchange started.
    pub start_time: DateTime<Utc>,
    /// When the exchange completed. `None` while in progress.
    pub end_time: Option<DateTime<Utc>>,
    /// Free text, already truncated.
    pub observations: String,
    /// Failure trace, if the exchange failed.
    pub exception_trace: Option<String>,
    /// Parent entry, if any.
    pub parent_id: Option<LogId>,
    /// Protocol-specific data.
    pub detail: CommunicationDetail,
}

impl CommunicationLog {
    /// Whether the entry is still waiting for completion.
    pub fn is_in_progress(&self) -> bool {
        self.end_time.is_none()
    }

    /// Duration of a completed exchange.
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.end_time.map(|end| end - self.start_time)
    }

    /// Institution targeted by an outbound exchange.
    pub fn target_institution(&self) -> Option<&InstitutionId> {
        match &self.detail {
            CommunicationDetail::OutboundHttp {
                target_institution, ..
            } => target_institution.as_ref(),
            _ => None,
        }
    }
}

/// What the caller learned by the time an exchange finished.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogOutcome {
    /// Replacement observations (truncated on write). `None` keeps the
    /// observations given at `begin`.
    pub observations: Option<String>,
    /// Failure trace, if the exchange failed.
    pub exception_trace: Option<String>,
    /// Replacement detail, e.g. an outbound entry now carrying its response.
    pub detail: Option<CommunicationDetail>,
}

impl LogOutcome {
    /// Successful completion with a summary.
    pub fn success(observations: impl Into<String>) -> Self {
        Self {
            observations: Some(observations.into()),
            ..Default::default()
        }
    }

    /// Failed completion with a summary and a trace.
    pub fn failure(observations: impl Into<String>, trace: impl Into<String>) -> Self {
        Self {
            observations: Some(observations.into()),
            exception_trace: Some(trace.into()),
            detail: None,
        }
    }

    /// Attach a replacement detail.
    pub fn with_detail(mut self, detail: CommunicationDetail) -> Self {
        self.detail = Some(detail);
        self
    }
}
