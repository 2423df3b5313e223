//! # Two-Gateway Federation
//!
//! Gateway A forwards a local caller's query to gateway B over the signed
//! record API. B authenticates A, reconciles its backends and signs the
//! answer; A verifies that signature before unwrapping the data.
//!
//! ```text
//! caller ─► A /forward ─► fg-04 sign ─► RouterTransport ─► B /rest ─► fg-03 ─► backend
//!                            ▲                                 │
//!                            └──────── verify ◄── signed ◄─────┘
//! ```

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use fg_01_communication_log::{CommunicationDetail, CommunicationLogApi, LogFilter, LogKind};
    use fg_03_dispatch_router::{Backend, BackendDescriptor, BackendRegistry, InMemoryBackend};
    use fg_04_outbound_client::{HttpMethod, ScriptedTransport};
    use shared_crypto::Ed25519KeyPair;
    use shared_types::{Capability, InstitutionId, Record};

    use crate::integration::support::{
        operator_authorization, Gateway, GatewayBuilder, RouterTransport,
    };

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    const SEED_A: u8 = 1;
    const SEED_B: u8 = 2;
    const HEI_A: &str = "uni-a.example";
    const HOST_B: &str = "gateway-b.example";
    const HEI_B: &str = "uni-b.example";

    struct Federation {
        a: Gateway,
        b: Gateway,
        backend: InMemoryBackend,
        transport: Arc<RouterTransport>,
    }

    fn key(seed: u8) -> Ed25519KeyPair {
        Ed25519KeyPair::from_seed([seed; 32])
    }

    fn backends() -> (InMemoryBackend, BackendRegistry) {
        let backend = InMemoryBackend::new(
            BackendDescriptor::new("b-main", HEI_B)
                .serving(Capability::Agreements)
                .primary(),
        )
        .with_records(
            Capability::Agreements,
            vec![
                Record::owned("c1", "law"),
                Record::owned("c2", "law"),
                Record::owned("c3", "arts"),
            ],
        );
        let registry = BackendRegistry::builder()
            .register(Backend::InMemory(backend.clone()))
            .build()
            .unwrap();
        (backend, registry)
    }

    /// A and B. B trusts A's key when `b_trusts_a`. A registers B's key
    /// under `b_key_owner`, if any.
    fn federation(b_trusts_a: bool, b_key_owner: Option<&str>) -> Federation {
        let (backend, registry) = backends();

        let mut b = GatewayBuilder::new(SEED_B)
            .enforcing_auth()
            .with_backends(registry);
        if b_trusts_a {
            b = b.trusting(HEI_A, &key(SEED_A));
        }
        let b = b.build(Arc::new(ScriptedTransport::new())).unwrap();

        let transport = Arc::new(RouterTransport::new());
        let mut a = GatewayBuilder::new(SEED_A).partner(
            HEI_B,
            "agreements",
            &format!("http://{HOST_B}/rest/agreements"),
            &["HTTP_SIGNATURE", "ANONYMOUS"],
            Some(2),
        );
        if let Some(owner) = b_key_owner {
            a = a.trusting(owner, &key(SEED_B));
        }
        let a = a.build(transport.clone()).unwrap();

        transport.route(HOST_B, b.router());
        Federation {
            a,
            b,
            backend,
            transport,
        }
    }

    async fn forward(gateway: &Gateway, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = gateway
            .operator_router()
            .oneshot(
                Request::get(uri)
                    .header("authorization", operator_authorization())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    // =============================================================================
    // SUCCESSFUL EXCHANGES
    // =============================================================================

    #[tokio::test]
    async fn test_index_through_signed_exchange() {
        let fed = federation(true, Some(HEI_B));

        let (status, body) = forward(&fed.a, "/forward/agreements/index?hei_id=uni-b.example").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], serde_json::json!(["c1", "c2", "c3"]));
        let delivered = fed.transport.delivered();
        assert_eq!(delivered.len(), 1);
        assert!(delivered[0].header("signature").is_some());
        assert!(delivered[0].header("digest").is_some());
    }

    #[tokio::test]
    async fn test_get_posts_form_and_keeps_request_order() {
        let fed = federation(true, Some(HEI_B));

        let (status, body) =
            forward(&fed.a, "/forward/agreements/get?hei_id=uni-b.example&id=c3&id=c1").await;

        assert_eq!(status, StatusCode::OK);
        let ids: Vec<&str> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["c3", "c1"]);
        assert_eq!(fed.transport.delivered()[0].method, HttpMethod::Post);
        assert_eq!(
            fed.backend.calls().fetch_calls,
            vec![vec!["c3".to_string(), "c1".to_string()]]
        );
    }

    #[tokio::test]
    async fn test_both_sides_log_the_exchange() {
        let fed = federation(true, Some(HEI_B));

        forward(&fed.a, "/forward/agreements/index?hei_id=uni-b.example").await;

        let outbound = fed
            .a
            .container
            .log
            .find_by_filter(
                &LogFilter::TargetInstitution(InstitutionId::from(HEI_B)),
                0,
                10,
            )
            .unwrap();
        assert_eq!(outbound.len(), 1);
        assert_eq!(outbound[0].detail.kind(), LogKind::OutboundHttp);
        assert!(outbound[0].exception_trace.is_none());
        assert!(!outbound[0].is_in_progress());

        let inbound = fed
            .b
            .container
            .log
            .find_by_filter(&LogFilter::Kind(LogKind::InboundHttp), 0, 10)
            .unwrap();
        assert_eq!(inbound.len(), 1);
        assert!(inbound[0].exception_trace.is_none());
        assert!(matches!(
            &inbound[0].detail,
            CommunicationDetail::InboundHttp { requester_institution: Some(hei), .. }
                if hei.as_str() == HEI_A
        ));
        let children = fed.b.container.log.sorted_children(inbound[0].id).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].detail.kind(), LogKind::PluginCall);
    }

    // =============================================================================
    // AUTHENTICATION FAILURES
    // =============================================================================

    #[tokio::test]
    async fn test_unknown_caller_rejected_by_partner() {
        let fed = federation(false, Some(HEI_B));

        let (status, _) = forward(&fed.a, "/forward/agreements/index?hei_id=uni-b.example").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(fed.backend.calls().total(), 0);
        let outbound = fed
            .a
            .container
            .log
            .find_by_filter(&LogFilter::Kind(LogKind::OutboundHttp), 0, 10)
            .unwrap();
        assert!(outbound[0]
            .exception_trace
            .as_deref()
            .is_some_and(|t| t.contains("401")));
        let inbound = fed
            .b
            .container
            .log
            .find_by_filter(&LogFilter::Kind(LogKind::InboundHttp), 0, 10)
            .unwrap();
        assert!(inbound[0].exception_trace.is_some());
    }

    #[tokio::test]
    async fn test_unverifiable_answer_is_bad_gateway() {
        let fed = federation(true, None);

        let (status, _) = forward(&fed.a, "/forward/agreements/index?hei_id=uni-b.example").await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        // B did the work; A refused to trust the answer.
        assert_eq!(fed.backend.calls().list_calls, 1);
    }

    #[tokio::test]
    async fn test_answer_signed_with_another_institutions_key_is_bad_gateway() {
        let fed = federation(true, Some("impostor.example"));

        let (status, _) = forward(&fed.a, "/forward/agreements/index?hei_id=uni-b.example").await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        let outbound = fed
            .a
            .container
            .log
            .find_by_filter(&LogFilter::Kind(LogKind::OutboundHttp), 0, 10)
            .unwrap();
        assert!(outbound[0]
            .exception_trace
            .as_deref()
            .is_some_and(|t| t.contains("is not published by uni-b.example")));
    }

    #[tokio::test]
    async fn test_operator_api_needs_token() {
        let fed = federation(true, Some(HEI_B));

        let response = fed
            .a
            .operator_router()
            .oneshot(
                Request::get("/forward/agreements/index?hei_id=uni-b.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(fed.transport.delivered().is_empty());
        let public = fed
            .a
            .router()
            .oneshot(
                Request::get("/forward/agreements/index?hei_id=uni-b.example")
                    .header("authorization", operator_authorization())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(public.status(), StatusCode::NOT_FOUND);
    }

    // =============================================================================
    // TRANSPORT AND LOCAL CHECKS
    // =============================================================================

    #[tokio::test]
    async fn test_unreachable_partner_is_internal_error() {
        let transport = Arc::new(RouterTransport::new());
        let a = GatewayBuilder::new(SEED_A)
            .partner(
                HEI_B,
                "agreements",
                &format!("http://{HOST_B}/rest/agreements"),
                &["ANONYMOUS"],
                None,
            )
            .build(transport.clone())
            .unwrap();

        let (status, _) = forward(&a, "/forward/agreements/index?hei_id=uni-b.example").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(transport.delivered().is_empty());
    }

    #[tokio::test]
    async fn test_anonymous_call_refused_when_auth_enforced() {
        let fed = federation(true, Some(HEI_B));
        let transport = Arc::new(RouterTransport::new());
        transport.route(HOST_B, fed.b.router());
        let anonymous = GatewayBuilder::new(SEED_A)
            .partner(
                HEI_B,
                "agreements",
                &format!("http://{HOST_B}/rest/agreements"),
                &["ANONYMOUS"],
                None,
            )
            .build(transport.clone())
            .unwrap();

        let (status, _) =
            forward(&anonymous, "/forward/agreements/index?hei_id=uni-b.example").await;

        // 401 from B is not a protocol error response, so A reports it as internal.
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(transport.delivered().len(), 1);
        assert_eq!(fed.backend.calls().total(), 0);
    }
}
