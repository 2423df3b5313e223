//! # Inbound Record API
//!
//! Serves `index`, `get` and `stats` for every capability to partner
//! gateways. Each request becomes an `InboundHttp` log entry; the backend
//! calls made to answer it are its children.
//!
//! ## Request Flow
//!
//! ```text
//! request ──► capability ──► signature ──► params ──► reconciler ──► sign ──► response
//!                 │              │            │            │
//!                400            401          400      400/502/500
//! ```
//!
//! A signature is verified whenever one is present, and required when
//! `server.enforce_auth` is set. Responses are signed only when the request
//! signature verified and a signing key is loaded. The verifying key's
//! institution is logged as the requester.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};

use fg_01_communication_log::{
    CommunicationDetail, CommunicationLogApi, HttpRequestRecord, HttpResponseRecord, LogHandle,
    LogId, LogOutcome,
};
use fg_03_dispatch_router::{DispatchError, RecordQueryApi};
use fg_04_outbound_client::{sign_response, verify_request, FederationKey, SignedRequest};
use gateway_telemetry::{metric_inc, INBOUND_REQUESTS, RECONCILIATIONS};
use shared_types::{AuthMethod, Capability, ErrorResponse, InstitutionId, ValidationError};

use super::{header_pairs, raw_response, AppState, RecordParams};

/// Record API routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/rest/:capability/index", get(index).post(index))
        .route("/rest/:capability/get", get(fetch).post(fetch))
        .route("/rest/:capability/stats", get(stats))
}

/// Record API operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// List ids.
    Index,
    /// Fetch records by id.
    Get,
    /// Aggregate counters.
    Stats,
}

impl Operation {
    /// Route segment and metric label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Index => "index",
            Operation::Get => "get",
            Operation::Stats => "stats",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a handler extracted from the request.
struct InboundCall {
    capability: String,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
}

async fn index(
    State(state): State<AppState>,
    Path(capability): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let call = InboundCall { capability, method, uri, headers, body };
    serve(&state, Operation::Index, call).await
}

async fn fetch(
    State(state): State<AppState>,
    Path(capability): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let call = InboundCall { capability, method, uri, headers, body };
    serve(&state, Operation::Get, call).await
}

async fn stats(
    State(state): State<AppState>,
    Path(capability): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let call = InboundCall { capability, method, uri, headers, body };
    serve(&state, Operation::Stats, call).await
}

/// Answer as computed, before signing.
struct Reply {
    status: StatusCode,
    body: String,
    observations: String,
    failure: Option<String>,
}

impl Reply {
    fn data<T: Serialize>(value: &T, observations: String) -> Self {
        match serde_json::to_string(&serde_json::json!({ "data": value })) {
            Ok(body) => Self {
                status: StatusCode::OK,
                body,
                observations,
                failure: None,
            },
            Err(e) => Self::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to encode response".to_string(),
                Some(e.to_string()),
            ),
        }
    }

    /// Rejected request. Logged as a successful exchange.
    fn invalid(err: &ValidationError) -> Self {
        Self::with_body(StatusCode::BAD_REQUEST, err.to_error_response(), err.to_string(), None)
    }

    fn error(status: StatusCode, message: String, failure: Option<String>) -> Self {
        let failure = failure.or_else(|| Some(message.clone()));
        Self::with_body(status, ErrorResponse::developer(message.clone()), message, failure)
    }

    fn with_body(
        status: StatusCode,
        error: ErrorResponse,
        observations: String,
        failure: Option<String>,
    ) -> Self {
        Self {
            status,
            body: serde_json::to_string(&error).unwrap_or_default(),
            observations,
            failure,
        }
    }

    fn from_dispatch(err: DispatchError) -> Self {
        match err {
            DispatchError::Validation(e) => Self::invalid(&e),
            e @ DispatchError::Backend { .. } => {
                Self::error(StatusCode::BAD_GATEWAY, e.to_string(), None)
            }
            e => Self::error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string(), None),
        }
    }
}

async fn serve(state: &AppState, operation: Operation, call: InboundCall) -> Response {
    let container = &state.container;
    let headers = header_pairs(&call.headers);
    let record = HttpRequestRecord {
        method: call.method.to_string(),
        url: call.uri.to_string(),
        headers: headers.clone(),
        body: String::from_utf8_lossy(&call.body).into_owned(),
    };
    let path_and_query = call
        .uri
        .path_and_query()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| call.uri.path().to_string());

    let signed = headers.iter().any(|(name, _)| name.eq_ignore_ascii_case("signature"));
    let auth_method = if signed { AuthMethod::HttpSignature } else { AuthMethod::Anonymous };
    let handle = begin(container.log.as_ref(), &call, operation, auth_method, record.clone());
    let parent = handle.as_ref().map(LogHandle::id);

    let (reply, signer) = match authenticate(state, &call, &path_and_query, &headers, signed) {
        Err(reply) => (reply, None),
        Ok(signer) => (answer(state, operation, &call, parent).await, signer),
    };

    let response_headers = match &signer {
        Some(_) => sign(state, &headers, &reply),
        None => Vec::new(),
    };
    let requester_institution = signer.and_then(|key| key.institution);

    let label = call
        .capability
        .parse::<Capability>()
        .map(|c| c.as_str())
        .unwrap_or("unknown");
    metric_inc!(INBOUND_REQUESTS, &[label, reply.status.as_str()]);
    info!(
        capability = %call.capability,
        %operation,
        status = reply.status.as_u16(),
        requester = ?requester_institution,
        "Inbound request served"
    );

    if let Some(handle) = handle {
        let detail = CommunicationDetail::InboundHttp {
            auth_method,
            request: record,
            response: Some(HttpResponseRecord {
                status: reply.status.as_u16(),
                media_type: Some("application/json".to_string()),
                headers: response_headers.clone(),
                body: reply.body.clone(),
            }),
            requester_institution,
        };
        let outcome = match &reply.failure {
            None => LogOutcome::success(reply.observations.clone()),
            Some(trace) => LogOutcome::failure(reply.observations.clone(), trace.clone()),
        }
        .with_detail(detail);
        if let Err(e) = container.log.complete(handle, outcome) {
            warn!(error = %e, "Cannot complete inbound log entry");
        }
    }

    raw_response(reply.status, &response_headers, reply.body)
}

/// Reply to an authenticated call.
async fn answer(
    state: &AppState,
    operation: Operation,
    call: &InboundCall,
    parent: Option<LogId>,
) -> Reply {
    match call.capability.parse::<Capability>() {
        Err(e) => Reply::with_body(
            StatusCode::BAD_REQUEST,
            ErrorResponse::developer(e.to_string()),
            e.to_string(),
            None,
        ),
        Ok(capability) => {
            let params = RecordParams::parse(call.uri.query(), &call.headers, &call.body);
            dispatch(state, operation, capability, params, parent).await
        }
    }
}

fn begin(
    log: &dyn CommunicationLogApi,
    call: &InboundCall,
    operation: Operation,
    auth_method: AuthMethod,
    request: HttpRequestRecord,
) -> Option<LogHandle> {
    let detail = CommunicationDetail::InboundHttp {
        auth_method,
        request,
        response: None,
        requester_institution: None,
    };
    log.begin(
        &format!("{} {} {}", call.method, call.capability, operation),
        None,
        detail,
    )
    .map_err(|e| warn!(error = %e, "Cannot open inbound log entry"))
    .ok()
}

fn authenticate(
    state: &AppState,
    call: &InboundCall,
    path_and_query: &str,
    headers: &[(String, String)],
    signed: bool,
) -> Result<Option<FederationKey>, Reply> {
    let container = &state.container;
    if !signed {
        if container.config.server.enforce_auth {
            return Err(Reply::error(
                StatusCode::UNAUTHORIZED,
                "Missing Signature header".to_string(),
                None,
            ));
        }
        return Ok(None);
    }

    let host = call
        .headers
        .get(axum::http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let request = SignedRequest {
        method: call.method.as_str(),
        path_and_query,
        host,
        headers,
        body: &call.body,
    };
    match verify_request(&request, |key_id: &str| container.registry.federation_key(key_id)) {
        Ok(signer) => {
            debug!(key_id = %signer.key_id, institution = ?signer.institution, "Inbound signature verified");
            Ok(Some(signer))
        }
        Err(e) => {
            warn!(error = %e, "Inbound signature rejected");
            Err(Reply::error(
                StatusCode::UNAUTHORIZED,
                format!("Invalid request signature: {e}"),
                None,
            ))
        }
    }
}

async fn dispatch(
    state: &AppState,
    operation: Operation,
    capability: Capability,
    params: RecordParams,
    parent: Option<LogId>,
) -> Reply {
    let container = &state.container;
    let Some(hei_id) = params.hei_id else {
        return Reply::invalid(&ValidationError::MissingParameter("hei_id"));
    };
    let institution = InstitutionId::from(hei_id.as_str());
    let reconciler = container.reconciler.as_ref();

    let reply = match operation {
        Operation::Index => reconciler
            .index(&institution, capability, parent)
            .await
            .map(|ids| Reply::data(&ids, format!("Listed {} ids", ids.len()))),
        Operation::Get => {
            let max = container.config.server.max_ids;
            if params.ids.len() > max {
                return Reply::invalid(&ValidationError::TooManyIds {
                    requested: params.ids.len(),
                    max,
                });
            }
            reconciler
                .get(&institution, capability, &params.ids, parent)
                .await
                .map(|records| {
                    let observations =
                        format!("Returned {} of {} records", records.len(), params.ids.len());
                    Reply::data(&records, observations)
                })
        }
        Operation::Stats => reconciler
            .stats(&institution, capability, parent)
            .await
            .map(|counters| Reply::data(&counters, "Stats reconciled".to_string())),
    };

    let outcome = if reply.is_ok() { "ok" } else { "error" };
    metric_inc!(RECONCILIATIONS, &[operation.as_str(), outcome]);
    reply.unwrap_or_else(Reply::from_dispatch)
}

/// Response signature headers, echoing the caller's request id.
fn sign(state: &AppState, headers: &[(String, String)], reply: &Reply) -> Vec<(String, String)> {
    let Some(request_id) = headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("x-request-id"))
        .map(|(_, value)| value.as_str())
    else {
        return Vec::new();
    };
    match state.container.keys.load() {
        Ok(material) => match material.signing {
            Some(key) => sign_response(&key, request_id, reply.status.as_u16(), reply.body.as_bytes()),
            None => Vec::new(),
        },
        Err(e) => {
            warn!(error = %e, "Cannot load signing key for response");
            Vec::new()
        }
    }
}
