//! # Admin API
//!
//! Operator endpoints. Not part of the federation protocol and expected to
//! be reachable only from the operator network.
//!
//! | Method | Path | Action |
//! |--------|------|--------|
//! | `POST` | `/admin/communications/logs` | Filtered, paged log search |
//! | `GET` | `/admin/communications/logs/:id` | One entry with its sorted children |
//! | `GET` | `/admin/mappings/conflicts` | Recorded mapping conflicts |
//! | `POST` | `/admin/sync` | Run the synchronizer now |
//! | `POST` | `/admin/plugins/reload` | Re-read the plugin manifest |

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use fg_01_communication_log::{
    CommunicationLog, CommunicationLogApi, LogError, LogFilter, LogId, MAX_PAGE_SIZE,
};
use fg_05_mapping_sync::SyncError;
use gateway_telemetry::{metric_inc, SYNC_RUNS};

use super::{data_response, error_response, AppState};

/// Admin routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/communications/logs", post(search_logs))
        .route("/admin/communications/logs/:id", get(log_tree))
        .route("/admin/mappings/conflicts", get(conflicts))
        .route("/admin/sync", post(trigger_sync))
        .route("/admin/plugins/reload", post(reload_plugins))
}

/// Body of a log search.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogQuery {
    /// Predicate. Everything when absent.
    #[serde(default = "match_all")]
    pub filter: LogFilter,
    /// Entries to skip.
    #[serde(default)]
    pub offset: usize,
    /// Page size, at most `MAX_PAGE_SIZE`.
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn match_all() -> LogFilter {
    LogFilter::All
}

fn default_limit() -> usize {
    MAX_PAGE_SIZE
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LogPage {
    communication_logs: Vec<CommunicationLog>,
    total_results: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LogTree {
    communication_log: CommunicationLog,
    sorted_children: Vec<CommunicationLog>,
}

async fn search_logs(State(state): State<AppState>, Json(query): Json<LogQuery>) -> Response {
    let log = &state.container.log;
    let page = log
        .find_by_filter(&query.filter, query.offset, query.limit)
        .and_then(|logs| {
            Ok(LogPage {
                communication_logs: logs,
                total_results: log.count_by_filter(&query.filter)?,
            })
        });
    match page {
        Ok(page) => data_response(StatusCode::OK, &page),
        Err(e @ LogError::InvalidPageLimit { .. }) => {
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
        Err(e) => log_failure(e),
    }
}

async fn log_tree(State(state): State<AppState>, Path(id): Path<u64>) -> Response {
    let log = &state.container.log;
    let id = LogId(id);
    let entry = match log.find_by_id(id) {
        Ok(Some(entry)) => entry,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, LogError::NotFound(id).to_string()),
        Err(e) => return log_failure(e),
    };
    match log.sorted_children(id) {
        Ok(children) => data_response(
            StatusCode::OK,
            &LogTree {
                communication_log: entry,
                sorted_children: children,
            },
        ),
        Err(e) => log_failure(e),
    }
}

fn log_failure(e: LogError) -> Response {
    error!(error = %e, "Communication log query failed");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

async fn conflicts(State(state): State<AppState>) -> Response {
    match state.container.mappings.conflicts() {
        Ok(conflicts) => data_response(StatusCode::OK, &conflicts),
        Err(e) => {
            error!(error = %e, "Conflict listing failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn trigger_sync(State(state): State<AppState>) -> Response {
    match state.container.scheduler.trigger().await {
        Ok(report) => {
            info!(%report, "Manual synchronization finished");
            data_response(StatusCode::OK, &report)
        }
        Err(SyncError::AlreadyRunning) => {
            metric_inc!(SYNC_RUNS, &["skipped"]);
            error_response(StatusCode::CONFLICT, SyncError::AlreadyRunning.to_string())
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn reload_plugins(State(state): State<AppState>) -> Response {
    match state.container.reload_plugins() {
        Ok(backends) => {
            data_response(StatusCode::OK, &serde_json::json!({ "backends": backends }))
        }
        Err(e) => {
            error!(error = %e, "Plugin reload failed; previous registry kept");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::operator_router;
    use crate::api::test_support::{as_operator, container_with, json_body};
    use axum::body::Body;
    use axum::http::Request;
    use fg_01_communication_log::{CommunicationDetail, LogOutcome};
    use fg_02_identifier_mapping::MappingApi;
    use fg_03_dispatch_router::{Backend, BackendDescriptor, BackendRegistry, InMemoryBackend};
    use fg_04_outbound_client::ScriptedTransport;
    use shared_types::{Capability, InstitutionId, OunitId, Record};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn empty_app() -> (Router, Arc<crate::container::GatewayContainer>) {
        let container = container_with(Arc::new(ScriptedTransport::new()), BackendRegistry::empty());
        (operator_router(container.clone()), container)
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        as_operator(Request::post(uri))
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_search_logs_pages_and_counts() {
        let (app, container) = empty_app();
        for i in 0..3 {
            container
                .log
                .record(&format!("entry {i}"), None, CommunicationDetail::Generic, LogOutcome::default())
                .unwrap();
        }

        let response = app
            .oneshot(post_json(
                "/admin/communications/logs",
                serde_json::json!({ "filter": { "type": "ALL" }, "offset": 1, "limit": 1 }),
            ))
            .await
            .unwrap();

        let (status, body) = json_body(response).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["totalResults"], 3);
        assert_eq!(body["data"]["communicationLogs"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_search_logs_rejects_oversized_page() {
        let (app, _) = empty_app();

        let response = app
            .oneshot(post_json(
                "/admin/communications/logs",
                serde_json::json!({ "limit": MAX_PAGE_SIZE + 1 }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_log_tree_returns_children() {
        let (app, container) = empty_app();
        let root = container
            .log
            .record("root", None, CommunicationDetail::Generic, LogOutcome::default())
            .unwrap();
        container
            .log
            .record("child", Some(root.id), CommunicationDetail::Generic, LogOutcome::default())
            .unwrap();

        let response = app
            .clone()
            .oneshot(
                as_operator(Request::get(format!("/admin/communications/logs/{}", root.id)))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let (status, body) = json_body(response).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["communicationLog"]["observations"], "root");
        assert_eq!(body["data"]["sortedChildren"][0]["observations"], "child");

        let response = app
            .oneshot(
                as_operator(Request::get("/admin/communications/logs/999"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_conflicts_listed() {
        let (app, container) = empty_app();
        let hei = InstitutionId::from("uni.example");
        container.mappings.register_mapping(&hei, "a1", &OunitId::from("law")).unwrap();
        container.mappings.register_mapping(&hei, "a1", &OunitId::from("med")).unwrap();

        let response = app
            .oneshot(as_operator(Request::get("/admin/mappings/conflicts")).body(Body::empty()).unwrap())
            .await
            .unwrap();

        let (status, body) = json_body(response).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_manual_sync_creates_mappings() {
        let backend = InMemoryBackend::new(
            BackendDescriptor::new("b1", "uni.example")
                .serving(Capability::Agreements)
                .primary(),
        )
        .with_records(Capability::Agreements, vec![Record::owned("a1", "law")]);
        let registry = BackendRegistry::builder()
            .register(Backend::InMemory(backend))
            .build()
            .unwrap();
        let container = container_with(Arc::new(ScriptedTransport::new()), registry);

        let response = operator_router(container.clone())
            .oneshot(as_operator(Request::post("/admin/sync")).body(Body::empty()).unwrap())
            .await
            .unwrap();

        let (status, body) = json_body(response).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["created"], 1);
        assert_eq!(
            container
                .mappings
                .get_mapping(&InstitutionId::from("uni.example"), "a1")
                .unwrap(),
            Some(OunitId::from("law"))
        );
    }

    #[tokio::test]
    async fn test_reload_without_manifest_empties_registry() {
        let backend = InMemoryBackend::new(
            BackendDescriptor::new("b1", "uni.example").serving(Capability::Courses),
        );
        let registry = BackendRegistry::builder()
            .register(Backend::InMemory(backend))
            .build()
            .unwrap();
        let container = container_with(Arc::new(ScriptedTransport::new()), registry);

        let response = operator_router(container.clone())
            .oneshot(as_operator(Request::post("/admin/plugins/reload")).body(Body::empty()).unwrap())
            .await
            .unwrap();

        let (status, body) = json_body(response).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["backends"], 0);
        assert!(!container
            .router
            .has_backend(&InstitutionId::from("uni.example"), Capability::Courses));
    }
}
