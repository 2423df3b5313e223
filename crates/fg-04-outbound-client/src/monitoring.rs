//! # Monitoring Reporter
//!
//! Reports misbehaving partner APIs to the federation monitoring service.

use crate::domain::{ClientError, OutboundRequest};
use crate::ports::{OutboundApi, PeerRegistry};
use fg_01_communication_log::LogId;
use shared_types::InstitutionId;
use std::sync::Arc;
use tracing::info;

/// API name of the monitoring service in the registry.
pub const MONITORING_API: &str = "monitoring";

/// Infrastructure APIs that are never reported.
pub const UNREPORTABLE_APIS: [&str; 4] = ["discovery", "echo", "monitoring", "registry"];

/// One issue observed while talking to a partner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoringReport {
    /// Institution whose API misbehaved.
    pub server_institution: InstitutionId,
    /// API name, e.g. `agreements`.
    pub api_name: String,
    /// Endpoint within the API, e.g. `get`.
    pub endpoint_name: Option<String>,
    /// HTTP status observed, if any.
    pub http_code: Option<u16>,
    /// Message returned by the server.
    pub server_message: Option<String>,
    /// What the client found wrong.
    pub client_message: Option<String>,
}

impl MonitoringReport {
    /// Report about `api_name` of `server_institution` with nothing else set.
    pub fn new(server_institution: InstitutionId, api_name: impl Into<String>) -> Self {
        Self {
            server_institution,
            api_name: api_name.into(),
            endpoint_name: None,
            http_code: None,
            server_message: None,
            client_message: None,
        }
    }

    /// Check the report is worth sending.
    ///
    /// ## Errors
    ///
    /// `Rejected` for infrastructure APIs, and for non-error codes without a
    /// client message. A blank client message counts as none.
    pub fn validate(&self) -> Result<(), ClientError> {
        if UNREPORTABLE_APIS.contains(&self.api_name.as_str()) {
            return Err(ClientError::Rejected(format!(
                "Issues with the {} API are not reported",
                self.api_name
            )));
        }
        let is_error_code = matches!(self.http_code, Some(400..=599));
        if !is_error_code && present(&self.client_message).is_none() {
            return Err(ClientError::Rejected(
                "A client message is required unless the HTTP code is an error code".to_string(),
            ));
        }
        Ok(())
    }

    fn form(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("server_hei_id".to_string(), self.server_institution.to_string()),
            ("api_name".to_string(), self.api_name.clone()),
        ];
        let optional = [
            ("endpoint_name", present(&self.endpoint_name)),
            ("http_code", self.http_code.map(|c| c.to_string())),
            ("server_message", present(&self.server_message)),
            ("client_message", present(&self.client_message)),
        ];
        params.extend(
            optional
                .into_iter()
                .filter_map(|(name, value)| value.map(|v| (name.to_string(), v))),
        );
        params
    }
}

fn present(value: &Option<String>) -> Option<String> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

/// Sends `MonitoringReport`s.
pub struct MonitoringReporter {
    client: Arc<dyn OutboundApi>,
    registry: Arc<dyn PeerRegistry>,
    monitoring_institution: InstitutionId,
}

impl MonitoringReporter {
    /// Reporter posting to the monitoring API of `monitoring_institution`.
    pub fn new(
        client: Arc<dyn OutboundApi>,
        registry: Arc<dyn PeerRegistry>,
        monitoring_institution: InstitutionId,
    ) -> Self {
        Self {
            client,
            registry,
            monitoring_institution,
        }
    }

    /// Validate and send `report`.
    ///
    /// ## Errors
    ///
    /// - `Rejected`: see `MonitoringReport::validate`
    /// - `NoApiConfiguration`: no monitoring API is registered
    /// - any non-success exchange
    pub async fn report(
        &self,
        report: &MonitoringReport,
        parent: Option<LogId>,
    ) -> Result<(), ClientError> {
        report.validate()?;
        let config = self
            .registry
            .api_config(&self.monitoring_institution, MONITORING_API)
            .ok_or_else(|| ClientError::NoApiConfiguration {
                institution: self.monitoring_institution.clone(),
                api: MONITORING_API.to_string(),
            })?;

        let request = OutboundRequest::post_form(
            config.base_url.clone(),
            config.preferred_auth_method(),
            report.form(),
        )
        .targeting(self.monitoring_institution.clone());
        self.client.execute(request, parent).await.into_success()?;

        info!(
            server = %report.server_institution,
            api = %report.api_name,
            "[fg-04] Reported issue to monitoring"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::StaticRegistry;
    use crate::domain::{KeyMaterial, OutboundResponse, RequestBody};
    use crate::ports::{ApiConfiguration, ScriptedTransport, StaticKeySource};
    use crate::service::OutboundClient;
    use fg_01_communication_log::{CommunicationLogService, InMemoryLogRepository};
    use shared_types::AuthMethod;
    use url::Url;

    fn reporter(transport: Arc<ScriptedTransport>) -> MonitoringReporter {
        let registry: Arc<dyn PeerRegistry> = Arc::new(StaticRegistry::new().with_api(
            "monitoring.example",
            MONITORING_API,
            ApiConfiguration {
                base_url: Url::parse("https://monitoring.example/report").unwrap(),
                auth_methods: vec![AuthMethod::TlsCertificate],
                max_ids: None,
            },
        ));
        let engine = OutboundClient::new(
            transport,
            Arc::new(StaticKeySource::new(KeyMaterial::default())),
            registry.clone(),
            Arc::new(CommunicationLogService::with_system_clock(Arc::new(
                InMemoryLogRepository::new(),
            ))),
        );
        MonitoringReporter::new(
            Arc::new(engine),
            registry,
            InstitutionId::from("monitoring.example"),
        )
    }

    fn issue() -> MonitoringReport {
        MonitoringReport::new(InstitutionId::from("peer.example"), "agreements")
    }

    #[test]
    fn test_validation_rules() {
        let infra = MonitoringReport {
            http_code: Some(500),
            ..MonitoringReport::new(InstitutionId::from("peer.example"), "echo")
        };
        assert!(matches!(infra.validate(), Err(ClientError::Rejected(_))));

        let ok_code = MonitoringReport {
            http_code: Some(200),
            ..issue()
        };
        assert!(ok_code.validate().is_err());
        assert!(issue().validate().is_err());

        for blank in ["", "  "] {
            let unexplained = MonitoringReport {
                http_code: Some(200),
                client_message: Some(blank.into()),
                ..issue()
            };
            assert!(matches!(unexplained.validate(), Err(ClientError::Rejected(_))));
        }

        let explained = MonitoringReport {
            http_code: Some(200),
            client_message: Some("Response missing required element".into()),
            ..issue()
        };
        assert!(explained.validate().is_ok());

        for code in [400, 599] {
            let report = MonitoringReport {
                http_code: Some(code),
                ..issue()
            };
            assert!(report.validate().is_ok());
        }
    }

    #[tokio::test]
    async fn test_report_posts_form() {
        let transport = Arc::new(ScriptedTransport::new().respond(OutboundResponse::new(200, "")));
        let report = MonitoringReport {
            endpoint_name: Some("get".into()),
            http_code: Some(500),
            server_message: Some("boom".into()),
            client_message: Some(String::new()),
            ..issue()
        };

        reporter(transport.clone()).report(&report, None).await.unwrap();

        let sent = &transport.sent()[0];
        assert_eq!(sent.url.as_str(), "https://monitoring.example/report");
        assert_eq!(
            sent.body,
            RequestBody::Form(vec![
                ("server_hei_id".into(), "peer.example".into()),
                ("api_name".into(), "agreements".into()),
                ("endpoint_name".into(), "get".into()),
                ("http_code".into(), "500".into()),
                ("server_message".into(), "boom".into()),
            ])
        );
    }

    #[tokio::test]
    async fn test_rejected_report_is_not_sent() {
        let transport = Arc::new(ScriptedTransport::new());
        let result = reporter(transport.clone()).report(&issue(), None).await;
        assert!(result.is_err());
        assert!(transport.sent().is_empty());
    }
}
