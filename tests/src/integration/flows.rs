//! # Single-Gateway Flows
//!
//! One gateway, several subsystems:
//!
//! 1. **Sync (05) → Mapping (02) → Reconciler (03)**: mappings learned by the
//!    synchronizer route later `get` calls to a single backend
//! 2. **Inbound API → Log (01)**: every served request is a log tree with
//!    one plugin-call child per backend touched
//! 3. **Sync failure policy**: a failing backend is skipped, the others
//!    still feed the mapping store

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use fg_01_communication_log::{CommunicationLogApi, LogFilter, LogKind};
    use fg_02_identifier_mapping::MappingApi;
    use fg_03_dispatch_router::{Backend, BackendDescriptor, BackendRegistry, InMemoryBackend};
    use fg_04_outbound_client::ScriptedTransport;
    use fg_05_mapping_sync::SYNC_PLUGIN_NAME;
    use gateway_runtime::{router, GatewayContainer};
    use shared_types::{Capability, InstitutionId, OunitId, Record};

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    const HEI: &str = "uni.example";

    fn unit_backend(id: &str, ounit: &str, records: &[&str]) -> InMemoryBackend {
        InMemoryBackend::new(
            BackendDescriptor::new(id, HEI)
                .serving(Capability::Agreements)
                .covering(ounit),
        )
        .with_records(
            Capability::Agreements,
            records.iter().map(|r| Record::owned(*r, ounit)).collect(),
        )
    }

    fn gateway(backends: &[&InMemoryBackend]) -> Arc<GatewayContainer> {
        let container = GatewayContainer::for_testing(Arc::new(ScriptedTransport::new())).unwrap();
        let mut registry = BackendRegistry::builder();
        for backend in backends {
            registry = registry.register(Backend::InMemory((*backend).clone()));
        }
        container.router.reload(registry.build().unwrap());
        Arc::new(container)
    }

    async fn call(container: &Arc<GatewayContainer>, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router(container.clone())
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    // =============================================================================
    // SYNC → MAPPING → RECONCILER
    // =============================================================================

    #[tokio::test]
    async fn test_synced_mapping_routes_get_to_one_backend() {
        let law = unit_backend("law-db", "law", &["a1", "a2"]);
        let arts = unit_backend("arts-db", "arts", &["b1"]);
        let container = gateway(&[&law, &arts]);

        let report = container.scheduler.trigger().await.unwrap();
        assert_eq!(report.created, 3);
        assert_eq!(report.institutions, 1);
        assert_eq!(
            container
                .mappings
                .get_mapping(&InstitutionId::from(HEI), "b1")
                .unwrap(),
            Some(OunitId::from("arts"))
        );

        law.reset_calls();
        arts.reset_calls();
        let (status, body) = call(&container, "/rest/agreements/get?hei_id=uni.example&id=b1").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["id"], "b1");
        assert_eq!(law.calls().total(), 0);
        assert_eq!(arts.calls().fetch_calls, vec![vec!["b1".to_string()]]);
    }

    #[tokio::test]
    async fn test_unmapped_get_falls_back_then_resync_is_quiet() {
        let law = unit_backend("law-db", "law", &["a1"]);
        let arts = unit_backend("arts-db", "arts", &["b1"]);
        let container = gateway(&[&law, &arts]);

        let (status, body) = call(&container, "/rest/agreements/get?hei_id=uni.example&id=b1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        assert_eq!(law.calls().fetch_calls.len() + arts.calls().fetch_calls.len(), 2);

        container.scheduler.trigger().await.unwrap();
        let second = container.scheduler.trigger().await.unwrap();
        assert_eq!(second.created, 0);
        assert_eq!(second.fetch_calls, 0);
        assert_eq!(second.ids_listed, 2);
    }

    #[tokio::test]
    async fn test_unit_move_reported_as_conflict() {
        let law = unit_backend("law-db", "law", &["a1"]);
        let container = gateway(&[&law]);
        container.scheduler.trigger().await.unwrap();

        let arts = unit_backend("arts-db", "arts", &["a1"]);
        let registry = BackendRegistry::builder()
            .register(Backend::InMemory(arts))
            .build()
            .unwrap();
        container.router.reload(registry);
        let report = container.scheduler.trigger().await.unwrap();

        // Mapped ids are not re-fetched, so the move stays invisible.
        assert_eq!(report.conflicts, 0);
        assert_eq!(
            container
                .mappings
                .get_mapping(&InstitutionId::from(HEI), "a1")
                .unwrap(),
            Some(OunitId::from("law"))
        );

        container
            .mappings
            .register_mapping(&InstitutionId::from(HEI), "a1", &OunitId::from("arts"))
            .unwrap();
        assert_eq!(container.mappings.conflicts().unwrap().len(), 1);
    }

    // =============================================================================
    // INBOUND API → COMMUNICATION LOG
    // =============================================================================

    #[tokio::test]
    async fn test_inbound_request_logged_as_tree() {
        let law = unit_backend("law-db", "law", &["a1"]);
        let arts = unit_backend("arts-db", "arts", &["b1"]);
        let container = gateway(&[&law, &arts]);

        let (status, body) = call(&container, "/rest/agreements/index?hei_id=uni.example").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], serde_json::json!(["a1", "b1"]));

        let inbound = container
            .log
            .find_by_filter(&LogFilter::Kind(LogKind::InboundHttp), 0, 10)
            .unwrap();
        assert_eq!(inbound.len(), 1);
        assert!(!inbound[0].is_in_progress());
        assert!(inbound[0].exception_trace.is_none());

        let children = container.log.sorted_children(inbound[0].id).unwrap();
        assert_eq!(children.len(), 2);
        assert!(children.iter().all(|c| c.detail.kind() == LogKind::PluginCall));
        assert!(children[0].start_time <= children[1].start_time);
    }

    #[tokio::test]
    async fn test_failing_backend_fails_request_and_is_traced() {
        let law = unit_backend("law-db", "law", &["a1"]);
        let arts = unit_backend("arts-db", "arts", &["b1"]);
        arts.set_failure(Some("database offline"));
        let container = gateway(&[&law, &arts]);

        let (status, _) = call(&container, "/rest/agreements/index?hei_id=uni.example").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);

        let inbound = container
            .log
            .find_by_filter(&LogFilter::Kind(LogKind::InboundHttp), 0, 10)
            .unwrap();
        assert!(inbound[0].exception_trace.is_some());
        let children = container.log.sorted_children(inbound[0].id).unwrap();
        assert!(children
            .iter()
            .any(|c| c.exception_trace.as_deref().is_some_and(|t| t.contains("database offline"))));
    }

    // =============================================================================
    // SYNC FAILURE POLICY
    // =============================================================================

    #[tokio::test]
    async fn test_failing_backend_skipped_by_sync() {
        let law = unit_backend("law-db", "law", &["a1"]);
        let arts = unit_backend("arts-db", "arts", &["b1"]);
        arts.set_failure(Some("timeout"));
        let container = gateway(&[&law, &arts]);

        let report = container.scheduler.trigger().await.unwrap();

        assert_eq!(report.backend_failures, 1);
        assert_eq!(report.created, 1);
        assert!(container
            .mappings
            .get_mapping(&InstitutionId::from(HEI), "b1")
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_sync_run_logged() {
        let law = unit_backend("law-db", "law", &["a1"]);
        let container = gateway(&[&law]);

        container.scheduler.trigger().await.unwrap();

        let runs = container
            .log
            .find_by_filter(&LogFilter::Kind(LogKind::PluginCall), 0, 10)
            .unwrap();
        assert_eq!(runs.len(), 1);
        assert!(runs[0].parent_id.is_none());
        assert!(runs[0].observations.contains("created=1"));
        assert!(serde_json::to_string(&runs[0].detail)
            .unwrap()
            .contains(SYNC_PLUGIN_NAME));
    }
}
