//! # Metered Decorators
//!
//! Subsystem libraries stay free of metrics. The runtime wraps their ports
//! in these decorators to feed the Prometheus counters.
//!
//! | Decorator | Port | Metrics |
//! |-----------|------|---------|
//! | `MeteredOutbound` | `OutboundApi` | `fg_outbound_exchanges_total`, `fg_outbound_duration_seconds` |
//! | `MeteredMappings` | `MappingApi` | `fg_mapping_created_total`, `fg_mapping_conflicts_total` |
//! | `MeteredSync` | `MappingSyncApi` | `fg_sync_runs_total` |

use async_trait::async_trait;
use fg_01_communication_log::LogId;
use fg_02_identifier_mapping::{MappingApi, MappingConflict, MappingError, RegisterOutcome};
use fg_04_outbound_client::{OperationResult, OutboundApi, OutboundRequest};
use fg_05_mapping_sync::{MappingSyncApi, SyncError, SyncReport};
use gateway_telemetry::{
    metric_inc, time_histogram, MAPPINGS_CREATED, MAPPING_CONFLICTS, OUTBOUND_DURATION,
    OUTBOUND_EXCHANGES, SYNC_RUNS,
};
use shared_types::{InstitutionId, OunitId};
use std::sync::Arc;

/// Counts and times outbound exchanges by result.
pub struct MeteredOutbound {
    inner: Arc<dyn OutboundApi>,
}

impl MeteredOutbound {
    /// Wrap an engine.
    pub fn new(inner: Arc<dyn OutboundApi>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl OutboundApi for MeteredOutbound {
    async fn execute(&self, request: OutboundRequest, parent: Option<LogId>) -> OperationResult {
        let _timer = time_histogram!(OUTBOUND_DURATION);
        let result = self.inner.execute(request, parent).await;
        metric_inc!(OUTBOUND_EXCHANGES, &[result.kind()]);
        result
    }
}

/// Counts created mappings and detected conflicts.
pub struct MeteredMappings {
    inner: Arc<dyn MappingApi>,
}

impl MeteredMappings {
    /// Wrap a mapping service.
    pub fn new(inner: Arc<dyn MappingApi>) -> Self {
        Self { inner }
    }
}

impl MappingApi for MeteredMappings {
    fn get_mapping(
        &self,
        institution: &InstitutionId,
        external_id: &str,
    ) -> Result<Option<OunitId>, MappingError> {
        self.inner.get_mapping(institution, external_id)
    }

    fn register_mapping(
        &self,
        institution: &InstitutionId,
        external_id: &str,
        ounit: &OunitId,
    ) -> Result<RegisterOutcome, MappingError> {
        let outcome = self.inner.register_mapping(institution, external_id, ounit)?;
        match &outcome {
            RegisterOutcome::Created(_) => metric_inc!(MAPPINGS_CREATED),
            RegisterOutcome::Conflict(_) => metric_inc!(MAPPING_CONFLICTS),
            RegisterOutcome::AlreadyPresent(_) => {}
        }
        Ok(outcome)
    }

    fn conflicts(&self) -> Result<Vec<MappingConflict>, MappingError> {
        self.inner.conflicts()
    }
}

/// Counts synchronization runs by outcome.
pub struct MeteredSync {
    inner: Arc<dyn MappingSyncApi>,
}

impl MeteredSync {
    /// Wrap a synchronizer.
    pub fn new(inner: Arc<dyn MappingSyncApi>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl MappingSyncApi for MeteredSync {
    async fn run_once(&self) -> Result<SyncReport, SyncError> {
        let result = self.inner.run_once().await;
        let outcome = if result.is_ok() { "ok" } else { "error" };
        metric_inc!(SYNC_RUNS, &[outcome]);
        result
    }
}
