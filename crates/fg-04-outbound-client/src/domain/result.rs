//! # Operation Results
//!
//! Exactly one `OperationResult` exists per completed exchange. Every
//! variant carries the `ExchangeContext`: what was sent, what came back and
//! how far the exchange got.
//!
//! ## State Machine
//!
//! ```text
//! Building ──► Signed ──► Sent ──┬──► AuthVerified ──► Classified
//!                                └──► AuthFailed
//! ```

use super::errors::ClientError;
use super::request::{OutboundRequest, OutboundResponse};
use serde::{Deserialize, Serialize};
use shared_types::ErrorResponse;
use std::fmt;

/// Last state an exchange reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ExchangeState {
    /// Request assembled, nothing sent.
    Building,
    /// Signature headers attached.
    Signed,
    /// Response received.
    Sent,
    /// Response authentication passed (or was not required).
    AuthVerified,
    /// Response authentication failed.
    AuthFailed,
    /// Status mapped to a result.
    Classified,
}

/// Outcome of checking who produced a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseAuthentication {
    /// The request's method does not call for response verification.
    NotRequired,
    /// Signature checked against the named key.
    Valid {
        /// Fingerprint of the verifying key.
        key_id: String,
    },
    /// Verification failed.
    Invalid {
        /// Reason reported by the verifier.
        reason: String,
    },
}

impl ResponseAuthentication {
    /// Whether the response may be trusted.
    pub fn is_valid(&self) -> bool {
        !matches!(self, ResponseAuthentication::Invalid { .. })
    }
}

impl fmt::Display for ResponseAuthentication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseAuthentication::NotRequired => write!(f, "not required"),
            ResponseAuthentication::Valid { key_id } => write!(f, "valid (key {key_id})"),
            ResponseAuthentication::Invalid { reason } => write!(f, "invalid: {reason}"),
        }
    }
}

/// What was observed during one exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeContext {
    /// Request as sent (signature headers included once signed).
    pub request: OutboundRequest,
    /// Response, if one was obtained.
    pub response: Option<OutboundResponse>,
    /// Response authentication, if verification ran.
    pub response_auth: Option<ResponseAuthentication>,
    /// Last state reached.
    pub state: ExchangeState,
}

impl ExchangeContext {
    /// Context of a request that has not left yet.
    pub fn new(request: OutboundRequest) -> Self {
        Self {
            request,
            response: None,
            response_auth: None,
            state: ExchangeState::Building,
        }
    }

    /// Advance to `state`.
    pub fn advance(&mut self, state: ExchangeState) {
        self.state = state;
    }
}

/// Classified result of an exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationResult {
    /// 2xx with a parseable body.
    Success {
        /// Exchange details.
        context: ExchangeContext,
        /// Parsed body.
        body: serde_json::Value,
    },
    /// 400 with a parseable error document.
    ClientErrorResponse {
        /// Exchange details.
        context: ExchangeContext,
        /// Error document returned by the peer.
        error: ErrorResponse,
    },
    /// The peer answered, but not acceptably.
    InvalidResponse {
        /// Exchange details.
        context: ExchangeContext,
        /// What was wrong.
        cause: String,
    },
    /// The exchange could not be carried out.
    InternalError {
        /// Exchange details.
        context: ExchangeContext,
        /// What went wrong.
        cause: String,
    },
}

/// A `Success` result taken apart.
#[derive(Debug, Clone, PartialEq)]
pub struct SuccessfulExchange {
    /// Exchange details.
    pub context: ExchangeContext,
    /// Parsed body.
    pub body: serde_json::Value,
}

impl OperationResult {
    /// Keep `Success`, turn every other variant into a `ClientError`.
    pub fn into_success(self) -> Result<SuccessfulExchange, ClientError> {
        match self {
            OperationResult::Success { context, body } => Ok(SuccessfulExchange { context, body }),
            OperationResult::ClientErrorResponse { context, error } => Err(ClientError::ErrorResponse {
                status: context.response.as_ref().map(|r| r.status).unwrap_or(400),
                error,
            }),
            OperationResult::InvalidResponse { cause, .. } => Err(ClientError::InvalidResponse(cause)),
            OperationResult::InternalError { cause, .. } => Err(ClientError::Internal(cause)),
        }
    }

    /// Exchange details, whatever the variant.
    pub fn context(&self) -> &ExchangeContext {
        match self {
            OperationResult::Success { context, .. }
            | OperationResult::ClientErrorResponse { context, .. }
            | OperationResult::InvalidResponse { context, .. }
            | OperationResult::InternalError { context, .. } => context,
        }
    }

    /// Whether this is `Success`.
    pub fn is_success(&self) -> bool {
        matches!(self, OperationResult::Success { .. })
    }

    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            OperationResult::Success { .. } => "success",
            OperationResult::ClientErrorResponse { .. } => "client_error_response",
            OperationResult::InvalidResponse { .. } => "invalid_response",
            OperationResult::InternalError { .. } => "internal_error",
        }
    }

    /// Failure description, `None` on success.
    pub fn failure_cause(&self) -> Option<String> {
        match self {
            OperationResult::Success { .. } => None,
            OperationResult::ClientErrorResponse { error, .. } => {
                Some(format!("Peer rejected request: {error}"))
            }
            OperationResult::InvalidResponse { cause, .. }
            | OperationResult::InternalError { cause, .. } => Some(cause.clone()),
        }
    }

    /// One-line summary stored as log observations.
    pub fn summary(&self) -> String {
        let context = self.context();
        let status = context
            .response
            .as_ref()
            .map(|r| r.status.to_string())
            .unwrap_or_else(|| "-".to_string());
        format!(
            "{} {} -> {} (status {}, state {:?})",
            context.request.method,
            context.request.url,
            self.kind(),
            status,
            context.state
        )
    }
}
