//! # Outbound Client Service
//!
//! Runs one exchange through `Building → Signed → Sent → AuthVerified |
//! AuthFailed → Classified` and records it as a single communication log
//! entry whose span covers signing through classification.

use crate::domain::{
    sign_request, verify_response, ExchangeContext, ExchangeState, OperationResult,
    OutboundRequest, SigningError, SuccessfulExchange, ClientError,
};
use crate::ports::{HttpTransport, KeySource, OutboundApi, PeerRegistry};
use async_trait::async_trait;
use fg_01_communication_log::{CommunicationDetail, CommunicationLogApi, LogId, LogOutcome};
use shared_types::ErrorResponse;
use std::sync::Arc;
use tracing::{error, info, warn};

/// The outbound request engine.
pub struct OutboundClient {
    transport: Arc<dyn HttpTransport>,
    keys: Arc<dyn KeySource>,
    registry: Arc<dyn PeerRegistry>,
    log: Arc<dyn CommunicationLogApi>,
}

impl OutboundClient {
    /// Create the engine.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        keys: Arc<dyn KeySource>,
        registry: Arc<dyn PeerRegistry>,
        log: Arc<dyn CommunicationLogApi>,
    ) -> Self {
        Self {
            transport,
            keys,
            registry,
            log,
        }
    }

    /// Execute and keep only a successful outcome.
    ///
    /// ## Errors
    ///
    /// The non-success variants, converted to `ClientError`.
    pub async fn execute_expecting_success(
        &self,
        request: OutboundRequest,
        parent: Option<LogId>,
    ) -> Result<SuccessfulExchange, ClientError> {
        self.execute(request, parent).await.into_success()
    }

    async fn exchange(&self, request: OutboundRequest) -> OperationResult {
        let mut context = ExchangeContext::new(request);

        let material = match self.keys.load() {
            Ok(material) => material,
            Err(e) => {
                error!(error = %e, "[fg-04] Failed to load key material");
                return internal(context, format!("Key store unavailable: {e}"));
            }
        };

        if context.request.auth_method.requires_request_signature() {
            let Some(key) = material.signing.as_ref() else {
                return internal(context, SigningError::MissingSigningKey.to_string());
            };
            sign_request(key, &mut context.request);
        }
        context.advance(ExchangeState::Signed);

        info!(url = %context.request.url, auth = %context.request.auth_method, "[fg-04] Sending request");
        let response = match self
            .transport
            .send(&context.request, material.presented_identity())
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!(url = %context.request.url, error = %e, "[fg-04] Failed to execute request");
                return internal(context, e.to_string());
            }
        };
        context.advance(ExchangeState::Sent);

        let authentication = verify_response(&context.request, &response, |key_id: &str| {
            self.registry.federation_key(key_id)
        });
        context.response = Some(response);
        context.response_auth = Some(authentication.clone());
        if !authentication.is_valid() {
            context.advance(ExchangeState::AuthFailed);
            warn!(url = %context.request.url, %authentication, "[fg-04] Invalid server response");
            return OperationResult::InvalidResponse {
                context,
                cause: format!("Response authentication failed: {authentication}"),
            };
        }
        context.advance(ExchangeState::AuthVerified);

        classify(context)
    }
}

fn internal(context: ExchangeContext, cause: String) -> OperationResult {
    OperationResult::InternalError { context, cause }
}

/// Map a verified response's status to a result.
fn classify(mut context: ExchangeContext) -> OperationResult {
    context.advance(ExchangeState::Classified);
    let Some(response) = context.response.as_ref() else {
        return internal(context, "No response to classify".to_string());
    };
    let status = response.status;

    if response.is_client_error() {
        let parsed = serde_json::from_str::<ErrorResponse>(&response.raw_body);
        return match parsed {
            Ok(error) if status == 400 => OperationResult::ClientErrorResponse { context, error },
            Ok(error) => internal(
                context,
                format!("Peer rejected client authentication (HTTP {status}): {}", error.developer_message),
            ),
            Err(_) => internal(
                context,
                format!("Peer rejected client authentication (HTTP {status}) with an unparseable body"),
            ),
        };
    }

    if response.is_server_error() {
        return OperationResult::InvalidResponse {
            context,
            cause: format!("Peer failed with HTTP {status}"),
        };
    }

    if response.is_success() {
        let parsed = if response.raw_body.trim().is_empty() {
            Ok(serde_json::Value::Null)
        } else {
            serde_json::from_str(&response.raw_body)
        };
        return match parsed {
            Ok(body) => OperationResult::Success { context, body },
            Err(e) => OperationResult::InvalidResponse {
                context,
                cause: format!("Unparseable response body: {e}"),
            },
        };
    }

    internal(context, format!("Unexpected HTTP status {status}"))
}

#[async_trait]
impl OutboundApi for OutboundClient {
    async fn execute(&self, request: OutboundRequest, parent: Option<LogId>) -> OperationResult {
        let detail = CommunicationDetail::OutboundHttp {
            auth_method: request.auth_method,
            request: request.to_record(),
            response: None,
            target_institution: request.target_institution.clone(),
        };
        let handle = self
            .log
            .begin(&format!("{} {}", request.method, request.url), parent, detail)
            .map_err(|e| warn!(error = %e, "[fg-04] Cannot open communication log entry"))
            .ok();

        let result = self.exchange(request).await;

        if let Some(handle) = handle {
            let context = result.context();
            let detail = CommunicationDetail::OutboundHttp {
                auth_method: context.request.auth_method,
                request: context.request.to_record(),
                response: context.response.as_ref().map(|r| r.to_record()),
                target_institution: context.request.target_institution.clone(),
            };
            let outcome = match result.failure_cause() {
                None => LogOutcome::success(result.summary()),
                Some(cause) => LogOutcome::failure(result.summary(), cause),
            }
            .with_detail(detail);
            if let Err(e) = self.log.complete(handle, outcome) {
                warn!(error = %e, "[fg-04] Cannot complete communication log entry");
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::StaticRegistry;
    use crate::domain::{sign_response, KeyMaterial, KeyStoreError, OutboundResponse, TransportError};
    use crate::ports::{ScriptedTransport, StaticKeySource};
    use chrono::Duration;
    use fg_01_communication_log::{
        CommunicationLogService, InMemoryLogRepository, LogFilter, ManualClock,
    };
    use shared_crypto::Ed25519KeyPair;
    use shared_types::{AuthMethod, InstitutionId};
    use url::Url;

    struct Harness {
        client: OutboundClient,
        transport: Arc<ScriptedTransport>,
        log: Arc<CommunicationLogService>,
    }

    fn peer() -> Ed25519KeyPair {
        Ed25519KeyPair::from_seed([42; 32])
    }

    /// Registered, but published by no institution.
    fn stranger() -> Ed25519KeyPair {
        Ed25519KeyPair::from_seed([43; 32])
    }

    fn signed_by(signer: &Ed25519KeyPair, req: &OutboundRequest, body: &[u8], content_type: &str) -> OutboundResponse {
        let mut headers = sign_response(signer, &req.correlation_id.to_string(), 200, body);
        headers.push(("Content-Type".to_string(), content_type.to_string()));
        OutboundResponse::from_wire(200, headers, body.to_vec())
    }

    fn harness(transport: ScriptedTransport, keys: StaticKeySource) -> Harness {
        let registry = StaticRegistry::new()
            .with_institution_key("peer.example", peer().public_key())
            .with_key(stranger().public_key());
        let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
        let log = Arc::new(CommunicationLogService::new(
            Arc::new(InMemoryLogRepository::new()),
            clock,
        ));
        let transport = Arc::new(transport);
        let client = OutboundClient::new(
            transport.clone(),
            Arc::new(keys),
            Arc::new(registry),
            log.clone(),
        );
        Harness {
            client,
            transport,
            log,
        }
    }

    fn our_keys() -> StaticKeySource {
        StaticKeySource::new(KeyMaterial::signing_only(Ed25519KeyPair::from_seed([1; 32])))
    }

    fn request(auth: AuthMethod) -> OutboundRequest {
        OutboundRequest::get(
            Url::parse("https://peer.example/rest/agreements/index?hei_id=peer.example").unwrap(),
            auth,
        )
        .targeting(InstitutionId::from("peer.example"))
    }

    fn anonymous_response(status: u16, body: &str) -> OutboundResponse {
        OutboundResponse::new(status, body).with_header("Content-Type", "application/json")
    }

    fn assert_logged_once(h: &Harness) {
        let logs = h.log.find_by_filter(&LogFilter::All, 0, 50).unwrap();
        assert_eq!(logs.len(), 1);
        let entry = &logs[0];
        assert!(!entry.is_in_progress());
        assert!(entry.end_time.unwrap() >= entry.start_time);
        assert_eq!(entry.target_institution(), Some(&InstitutionId::from("peer.example")));
    }

    #[tokio::test]
    async fn test_success_parses_body() {
        let h = harness(
            ScriptedTransport::new().respond(anonymous_response(200, r#"{"data":["a1"]}"#)),
            our_keys(),
        );
        let result = h.client.execute(request(AuthMethod::Anonymous), None).await;

        match &result {
            OperationResult::Success { body, context } => {
                assert_eq!(body["data"][0], "a1");
                assert_eq!(context.state, ExchangeState::Classified);
                assert_eq!(context.response_auth, Some(crate::domain::ResponseAuthentication::NotRequired));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_logged_once(&h);
        // Anonymous requests carry no signature.
        assert!(h.transport.sent()[0].header("Signature").is_none());
    }

    #[tokio::test]
    async fn test_signed_exchange_verifies_response() {
        let req = request(AuthMethod::HttpSignature);
        let body = r#"{"data":[]}"#;
        let mut response = anonymous_response(200, body);
        for (name, value) in sign_response(&peer(), &req.correlation_id.to_string(), 200, body.as_bytes()) {
            response = response.with_header(name, value);
        }
        let h = harness(ScriptedTransport::new().respond(response), our_keys());

        let result = h.client.execute(req, None).await;
        assert!(result.is_success(), "{result:?}");
        assert!(matches!(
            result.context().response_auth,
            Some(crate::domain::ResponseAuthentication::Valid { .. })
        ));
        let sent = &h.transport.sent()[0];
        assert!(sent.header("Signature").unwrap().contains("algorithm=\"ed25519\""));
        assert!(sent.header("Digest").unwrap().starts_with("SHA-256="));
        assert_logged_once(&h);
    }

    #[tokio::test]
    async fn test_latin1_signed_response_verified_over_raw_bytes() {
        let req = request(AuthMethod::HttpSignature);
        let response = signed_by(
            &peer(),
            &req,
            b"{\"data\":[\"caf\xe9\"]}",
            "xml;charset=ISO-8859-1",
        );
        let h = harness(ScriptedTransport::new().respond(response), our_keys());

        match h.client.execute(req, None).await {
            OperationResult::Success { body, .. } => {
                assert_eq!(body, serde_json::json!({ "data": ["café"] }))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_response_signed_by_other_key_is_invalid() {
        let req = request(AuthMethod::HttpSignature);
        let response = signed_by(&stranger(), &req, b"{\"data\":[]}", "application/json");
        let h = harness(ScriptedTransport::new().respond(response), our_keys());

        match h.client.execute(req, None).await {
            OperationResult::InvalidResponse { context, cause } => {
                assert_eq!(context.state, ExchangeState::AuthFailed);
                assert!(cause.contains("is not published by peer.example"), "{cause}");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unsigned_response_to_signed_request_is_invalid() {
        let h = harness(
            ScriptedTransport::new().respond(anonymous_response(200, "{}")),
            our_keys(),
        );
        let result = h.client.execute(request(AuthMethod::HttpSignature), None).await;

        match &result {
            OperationResult::InvalidResponse { context, cause } => {
                assert_eq!(context.state, ExchangeState::AuthFailed);
                assert!(cause.starts_with("Response authentication failed"));
                assert!(context.response.is_some());
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_logged_once(&h);
    }

    #[tokio::test]
    async fn test_400_with_error_document() {
        let h = harness(
            ScriptedTransport::new().respond(anonymous_response(
                400,
                r#"{"developerMessage":"Missing hei_id"}"#,
            )),
            our_keys(),
        );
        let result = h.client.execute(request(AuthMethod::TlsCertificate), None).await;

        match &result {
            OperationResult::ClientErrorResponse { error, .. } => {
                assert_eq!(error.developer_message, "Missing hei_id");
                assert!(error.user_message.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_logged_once(&h);
    }

    #[tokio::test]
    async fn test_other_4xx_is_internal_auth_failure() {
        let h = harness(
            ScriptedTransport::new()
                .respond(anonymous_response(403, r#"{"developerMessage":"Unknown client"}"#))
                .respond(anonymous_response(400, "<html>")),
            our_keys(),
        );

        match h.client.execute(request(AuthMethod::TlsCertificate), None).await {
            OperationResult::InternalError { cause, context } => {
                assert!(cause.contains("HTTP 403"));
                assert!(cause.contains("Unknown client"));
                assert!(context.response.is_some());
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            h.client.execute(request(AuthMethod::TlsCertificate), None).await,
            OperationResult::InternalError { .. }
        ));
    }

    #[tokio::test]
    async fn test_5xx_is_invalid_response() {
        let h = harness(
            ScriptedTransport::new().respond(anonymous_response(503, "")),
            our_keys(),
        );
        let result = h.client.execute(request(AuthMethod::Anonymous), None).await;
        assert!(matches!(result, OperationResult::InvalidResponse { .. }));
        assert_logged_once(&h);
    }

    #[tokio::test]
    async fn test_redirect_is_internal_error() {
        let h = harness(
            ScriptedTransport::new().respond(
                anonymous_response(302, "").with_header("Location", "https://elsewhere.example/"),
            ),
            our_keys(),
        );
        match h.client.execute(request(AuthMethod::Anonymous), None).await {
            OperationResult::InternalError { cause, context } => {
                assert_eq!(cause, "Unexpected HTTP status 302");
                assert!(context.response.is_some());
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_logged_once(&h);
    }

    #[tokio::test]
    async fn test_unparseable_success_body() {
        let h = harness(
            ScriptedTransport::new().respond(anonymous_response(200, "<xml/>")),
            our_keys(),
        );
        let result = h.client.execute(request(AuthMethod::Anonymous), None).await;
        match result {
            OperationResult::InvalidResponse { cause, .. } => {
                assert!(cause.starts_with("Unparseable response body"))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_key_store_failure_has_no_response() {
        let h = harness(
            ScriptedTransport::new(),
            StaticKeySource::failing(KeyStoreError::InvalidCertificate("bad".into())),
        );
        let result = h.client.execute(request(AuthMethod::HttpSignature), None).await;

        match &result {
            OperationResult::InternalError { context, .. } => {
                assert!(context.response.is_none());
                assert_eq!(context.state, ExchangeState::Building);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(h.transport.sent().is_empty());
        assert_logged_once(&h);
    }

    #[tokio::test]
    async fn test_missing_signing_key() {
        let h = harness(ScriptedTransport::new(), StaticKeySource::new(KeyMaterial::default()));
        let result = h.client.execute(request(AuthMethod::HttpSignature), None).await;
        assert_eq!(
            result.failure_cause().as_deref(),
            Some("No HTTP signature key configured")
        );
    }

    #[tokio::test]
    async fn test_transport_failure() {
        let h = harness(
            ScriptedTransport::new().fail(TransportError::Timeout("10s".into())),
            our_keys(),
        );
        let result = h.client.execute(request(AuthMethod::Anonymous), None).await;
        match &result {
            OperationResult::InternalError { context, cause } => {
                assert_eq!(context.state, ExchangeState::Signed);
                assert_eq!(cause, "Request timed out: 10s");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_logged_once(&h);
    }

    #[tokio::test]
    async fn test_log_entry_is_child_and_carries_response() {
        let h = harness(
            ScriptedTransport::new().respond(anonymous_response(200, "{}")),
            our_keys(),
        );
        let parent = h.log.begin("inbound", None, CommunicationDetail::Generic).unwrap();
        let parent_id = parent.id();

        h.client.execute(request(AuthMethod::Anonymous), Some(parent_id)).await;

        let children = h.log.sorted_children(parent_id).unwrap();
        assert_eq!(children.len(), 1);
        match &children[0].detail {
            CommunicationDetail::OutboundHttp { response, .. } => {
                assert_eq!(response.as_ref().unwrap().status, 200);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(children[0].duration().unwrap() >= Duration::zero());
    }

    #[tokio::test]
    async fn test_execute_expecting_success() {
        let h = harness(
            ScriptedTransport::new()
                .respond(anonymous_response(200, r#"{"ok":true}"#))
                .respond(anonymous_response(400, r#"{"developerMessage":"nope"}"#)),
            our_keys(),
        );
        let ok = h
            .client
            .execute_expecting_success(request(AuthMethod::Anonymous), None)
            .await
            .unwrap();
        assert_eq!(ok.body["ok"], true);

        let err = h
            .client
            .execute_expecting_success(request(AuthMethod::Anonymous), None)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ClientError::ErrorResponse {
                status: 400,
                error: ErrorResponse::developer("nope"),
            }
        );
    }
}
