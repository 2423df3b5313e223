//! # Operator Guard
//!
//! Middleware in front of the forward and admin APIs.
//!
//! | `server.operator_token` | Let in |
//! |-------------------------|--------|
//! | set | `Authorization: Bearer <token>` or `X-API-Key: <token>` |
//! | unset | loopback peers only |
//!
//! Rejections are `401` with an `ErrorResponse` and `WWW-Authenticate: Bearer`.

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use std::net::SocketAddr;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use super::{error_response, AppState};

/// Reject callers that are neither holding the operator token nor, when no
/// token is configured, connecting from loopback.
pub async fn require_operator(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let allowed = match &state.container.config.server.operator_token {
        Some(expected) => presented_token(request.headers())
            .is_some_and(|token| constant_time_compare(token, expected)),
        None => peer.is_some_and(|addr| addr.ip().is_loopback()),
    };

    if !allowed {
        warn!(path = %request.uri().path(), peer = ?peer, "Operator API access denied");
        return unauthorized_response();
    }
    debug!(path = %request.uri().path(), "Operator API access granted");
    next.run(request).await
}

/// Bearer token, else `X-API-Key`.
fn presented_token(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    bearer.or_else(|| headers.get("x-api-key").and_then(|v| v.to_str().ok()))
}

/// Compare without leaking the matching prefix length through timing.
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    let max_len = a.len().max(b.len());
    let mut a_padded = vec![0u8; max_len];
    let mut b_padded = vec![0xFFu8; max_len];
    a_padded[..a.len()].copy_from_slice(a.as_bytes());
    b_padded[..b.len()].copy_from_slice(b.as_bytes());

    let lengths_equal = a.len().ct_eq(&b.len());
    let contents_equal = a_padded.ct_eq(&b_padded);
    (lengths_equal & contents_equal).into()
}

fn unauthorized_response() -> Response {
    let mut response = error_response(StatusCode::UNAUTHORIZED, "Operator credentials required");
    response
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    response
}
