//! # HTTP Surface
//!
//! | Listener | Prefix | Module | Purpose |
//! |----------|--------|--------|---------|
//! | public | `/rest/:capability/*` | `inbound` | Record API served to partner gateways |
//! | operator | `/forward/:capability/*` | `forward` | Local callers reaching partner gateways |
//! | operator | `/admin/*` | `admin` | Log inspection, conflicts, sync and plugin control |
//! | all | `/health` | here | Liveness |
//! | metrics | `/metrics` | here | Prometheus text |
//!
//! Every operator route sits behind `operator::require_operator`.
//!
//! Success bodies are `{ "data": ... }`. Failures carry an `ErrorResponse`.

pub mod admin;
pub mod forward;
pub mod inbound;
pub mod operator;

use axum::body::Body;
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use shared_types::ErrorResponse;
use std::sync::Arc;
use tracing::error;

use crate::container::GatewayContainer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Wired subsystems.
    pub container: Arc<GatewayContainer>,
}

/// Public router: record API and health.
pub fn router(container: Arc<GatewayContainer>) -> Router {
    let state = AppState { container };
    Router::new()
        .merge(inbound::routes())
        .route("/health", get(health_check))
        .with_state(state)
}

/// Operator router: forward API and admin API behind the operator guard,
/// plus an unguarded health check.
pub fn operator_router(container: Arc<GatewayContainer>) -> Router {
    let state = AppState { container };
    let guarded = Router::new()
        .merge(forward::routes())
        .merge(admin::routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            operator::require_operator,
        ));
    guarded
        .route("/health", get(health_check))
        .with_state(state)
}

/// Router for the dedicated metrics port.
pub fn metrics_router() -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .route("/health", get(health_check))
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "federation-gateway",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn metrics() -> Response {
    match gateway_telemetry::encode_metrics() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// `{ "data": value }` with the given status.
pub(crate) fn data_response<T: Serialize>(status: StatusCode, value: &T) -> Response {
    (status, Json(serde_json::json!({ "data": value }))).into_response()
}

/// Error body with a developer message.
pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorResponse::developer(message))).into_response()
}

/// Query and form parameters of a record API call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct RecordParams {
    /// `hei_id`
    pub hei_id: Option<String>,
    /// Repeated `id`, in request order.
    pub ids: Vec<String>,
}

impl RecordParams {
    /// Merge the URL query with a form-encoded body. The body is read only
    /// when it is declared as a form.
    pub fn parse(query: Option<&str>, headers: &HeaderMap, body: &[u8]) -> Self {
        let mut params = Self::default();
        params.extend(query.unwrap_or_default().as_bytes());
        let is_form = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("application/x-www-form-urlencoded"));
        if is_form {
            params.extend(body);
        }
        params
    }

    fn extend(&mut self, encoded: &[u8]) {
        for (name, value) in url::form_urlencoded::parse(encoded) {
            match name.as_ref() {
                "hei_id" if self.hei_id.is_none() => self.hei_id = Some(value.into_owned()),
                "id" => self.ids.push(value.into_owned()),
                _ => {}
            }
        }
    }
}

/// Header pairs as strings. Non-UTF-8 values are replaced lossily.
pub(crate) fn header_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

/// Build a response from raw parts.
pub(crate) fn raw_response(status: StatusCode, headers: &[(String, String)], body: String) -> Response {
    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json");
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder.body(Body::from(body)).unwrap_or_else(|e| {
        error!(error = %e, "Failed to build response");
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    })
}
