//! # Forward API
//!
//! Lets local systems query partner gateways without speaking the
//! federation protocol themselves. The gateway resolves the partner in the
//! registry, signs, sends, verifies and unwraps the `data` element.
//!
//! | Method | Path | Partner call |
//! |--------|------|--------------|
//! | `GET` | `/forward/:capability/index?hei_id=` | `index` |
//! | `GET`/`POST` | `/forward/:capability/get?hei_id=&id=` | `get` |
//! | `GET` | `/forward/:capability/stats?hei_id=` | `stats` |
//!
//! `hei_id` names the partner institution.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tracing::warn;

use fg_04_outbound_client::ClientError;
use shared_types::{Capability, InstitutionId};

use super::{data_response, error_response, AppState, RecordParams};
use super::inbound::Operation;

/// Forward routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/forward/:capability/index", get(index))
        .route("/forward/:capability/get", get(fetch).post(fetch))
        .route("/forward/:capability/stats", get(stats))
}

async fn index(
    State(state): State<AppState>,
    Path(capability): Path<String>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    forward(&state, Operation::Index, &capability, &uri, &headers, &body).await
}

async fn fetch(
    State(state): State<AppState>,
    Path(capability): Path<String>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    forward(&state, Operation::Get, &capability, &uri, &headers, &body).await
}

async fn stats(
    State(state): State<AppState>,
    Path(capability): Path<String>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    forward(&state, Operation::Stats, &capability, &uri, &headers, &body).await
}

async fn forward(
    state: &AppState,
    operation: Operation,
    capability: &str,
    uri: &Uri,
    headers: &HeaderMap,
    body: &[u8],
) -> Response {
    let capability = match capability.parse::<Capability>() {
        Ok(capability) => capability,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };
    let params = RecordParams::parse(uri.query(), headers, body);
    let Some(hei_id) = params.hei_id else {
        return error_response(StatusCode::BAD_REQUEST, "Missing required parameter: hei_id");
    };
    let institution = InstitutionId::from(hei_id.as_str());
    let peers = &state.container.peers;

    let result = match operation {
        Operation::Index => peers
            .index(&institution, capability, None)
            .await
            .map(|ids| data_response(StatusCode::OK, &ids)),
        Operation::Get => peers
            .get(&institution, capability, &params.ids, None)
            .await
            .map(|records| data_response(StatusCode::OK, &records)),
        Operation::Stats => peers
            .stats(&institution, capability, None)
            .await
            .map(|stats| data_response(StatusCode::OK, &stats)),
    };
    result.unwrap_or_else(|e| {
        warn!(%institution, %capability, %operation, error = %e, "Forwarded call failed");
        client_error_response(e)
    })
}

fn client_error_response(err: ClientError) -> Response {
    match err {
        ClientError::ErrorResponse { error, .. } => {
            (StatusCode::BAD_REQUEST, Json(error)).into_response()
        }
        e @ (ClientError::NoApiConfiguration { .. }
        | ClientError::TooManyIds { .. }
        | ClientError::Rejected(_)) => error_response(StatusCode::BAD_REQUEST, e.to_string()),
        e @ ClientError::InvalidResponse(_) => error_response(StatusCode::BAD_GATEWAY, e.to_string()),
        e @ ClientError::Internal(_) => {
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
