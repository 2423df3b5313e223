//! # Peer API Client
//!
//! Typed index/get/stats calls toward a partner gateway, built from the
//! registry's API configuration for the target `(institution, capability)`.
//!
//! With a `MonitoringReporter` attached, answers that fail verification,
//! classification or parsing are reported before the error is returned.

use crate::domain::{ClientError, OutboundRequest, SuccessfulExchange};
use crate::monitoring::{MonitoringReport, MonitoringReporter};
use crate::ports::{ApiConfiguration, OutboundApi, PeerRegistry};
use fg_01_communication_log::LogId;
use serde::de::DeserializeOwned;
use shared_types::{BackendStats, Capability, InstitutionId, Record};
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// Client for the record APIs of partner gateways.
pub struct PeerApiClient {
    client: Arc<dyn OutboundApi>,
    registry: Arc<dyn PeerRegistry>,
    monitoring: Option<Arc<MonitoringReporter>>,
}

impl PeerApiClient {
    /// Create a client sending through `client`.
    pub fn new(client: Arc<dyn OutboundApi>, registry: Arc<dyn PeerRegistry>) -> Self {
        Self {
            client,
            registry,
            monitoring: None,
        }
    }

    /// Report invalid partner answers through `reporter`.
    pub fn with_monitoring(mut self, reporter: Arc<MonitoringReporter>) -> Self {
        self.monitoring = Some(reporter);
        self
    }

    /// Ids the peer lists for `institution`.
    ///
    /// ## Errors
    ///
    /// - `NoApiConfiguration`: the peer does not expose `capability`
    /// - any non-success exchange
    pub async fn index(
        &self,
        institution: &InstitutionId,
        capability: Capability,
        parent: Option<LogId>,
    ) -> Result<Vec<String>, ClientError> {
        let config = self.config(institution, capability)?;
        let url = endpoint(&config, "index", institution)?;
        let request = OutboundRequest::get(url, config.preferred_auth_method())
            .targeting(institution.clone());
        self.call(request, institution, capability, "index", parent).await
    }

    /// Records with the given ids. Ids unknown to the peer are absent from
    /// the answer.
    ///
    /// ## Errors
    ///
    /// - `NoApiConfiguration`: the peer does not expose `capability`
    /// - `TooManyIds`: more ids than the peer's `max_ids`
    /// - any non-success exchange
    pub async fn get(
        &self,
        institution: &InstitutionId,
        capability: Capability,
        ids: &[String],
        parent: Option<LogId>,
    ) -> Result<Vec<Record>, ClientError> {
        let config = self.config(institution, capability)?;
        if let Some(max) = config.max_ids {
            if ids.len() > max {
                return Err(ClientError::TooManyIds {
                    capability,
                    requested: ids.len(),
                    max,
                });
            }
        }
        let url = endpoint(&config, "get", institution)?;
        let params = ids.iter().map(|id| ("id".to_string(), id.clone())).collect();
        let request = OutboundRequest::post_form(url, config.preferred_auth_method(), params)
            .targeting(institution.clone());
        self.call(request, institution, capability, "get", parent).await
    }

    /// Counters the peer reports for `institution`.
    ///
    /// ## Errors
    ///
    /// - `NoApiConfiguration`: the peer does not expose `capability`
    /// - any non-success exchange
    pub async fn stats(
        &self,
        institution: &InstitutionId,
        capability: Capability,
        parent: Option<LogId>,
    ) -> Result<BackendStats, ClientError> {
        let config = self.config(institution, capability)?;
        let url = endpoint(&config, "stats", institution)?;
        let request = OutboundRequest::get(url, config.preferred_auth_method())
            .targeting(institution.clone());
        self.call(request, institution, capability, "stats", parent).await
    }

    async fn call<T: DeserializeOwned>(
        &self,
        request: OutboundRequest,
        institution: &InstitutionId,
        capability: Capability,
        operation: &str,
        parent: Option<LogId>,
    ) -> Result<T, ClientError> {
        let result = self.client.execute(request, parent).await;
        let http_code = result.context().response.as_ref().map(|r| r.status);
        let outcome = result.into_success().and_then(data);
        if let Err(ClientError::InvalidResponse(cause)) = &outcome {
            let report = MonitoringReport {
                endpoint_name: Some(operation.to_string()),
                http_code,
                client_message: Some(cause.clone()),
                ..MonitoringReport::new(institution.clone(), capability.as_str())
            };
            self.report(&report, parent).await;
        }
        outcome
    }

    async fn report(&self, report: &MonitoringReport, parent: Option<LogId>) {
        let Some(reporter) = &self.monitoring else {
            return;
        };
        if let Err(e) = reporter.report(report, parent).await {
            warn!(
                server = %report.server_institution,
                api = %report.api_name,
                error = %e,
                "[fg-04] Failed to report invalid response"
            );
        }
    }

    fn config(
        &self,
        institution: &InstitutionId,
        capability: Capability,
    ) -> Result<ApiConfiguration, ClientError> {
        self.registry
            .api_config(institution, capability.as_str())
            .ok_or_else(|| ClientError::NoApiConfiguration {
                institution: institution.clone(),
                api: capability.as_str().to_string(),
            })
    }
}

fn endpoint(
    config: &ApiConfiguration,
    operation: &str,
    institution: &InstitutionId,
) -> Result<Url, ClientError> {
    let mut base = config.base_url.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    let mut url = base
        .join(operation)
        .map_err(|e| ClientError::Internal(format!("Invalid API URL {base}: {e}")))?;
    url.query_pairs_mut().append_pair("hei_id", institution.as_str());
    debug!(%url, "[fg-04] Peer API endpoint");
    Ok(url)
}

fn data<T: DeserializeOwned>(exchange: SuccessfulExchange) -> Result<T, ClientError> {
    let mut body = exchange.body;
    let data = body
        .get_mut("data")
        .map(serde_json::Value::take)
        .ok_or_else(|| ClientError::InvalidResponse("Response has no data element".to_string()))?;
    serde_json::from_value(data)
        .map_err(|e| ClientError::InvalidResponse(format!("Unexpected data shape: {e}")))
}
