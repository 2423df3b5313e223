//! # Inbound Ports (Driving Ports)
//!
//! What the inbound HTTP layer calls once a request is authenticated.

use crate::domain::DispatchError;
use async_trait::async_trait;
use fg_01_communication_log::LogId;
use shared_types::{Capability, InstitutionId, Record, StatsCounters, ValidationError};

/// Primary API for answering record queries across backends.
#[async_trait]
pub trait RecordQueryApi: Send + Sync {
    /// Reject targets nobody serves before any backend is called.
    ///
    /// ## Errors
    ///
    /// - `UnknownInstitution`: no backend serves the institution at all
    /// - `CapabilityNotServed`: the institution is known but not for `capability`
    fn validate(
        &self,
        institution: &InstitutionId,
        capability: Capability,
    ) -> Result<(), ValidationError>;

    /// Every id held by any backend, concatenated in router order.
    async fn index(
        &self,
        institution: &InstitutionId,
        capability: Capability,
        parent: Option<LogId>,
    ) -> Result<Vec<String>, DispatchError>;

    /// Records for `ids`, in request order. Ids no backend knows are dropped.
    async fn get(
        &self,
        institution: &InstitutionId,
        capability: Capability,
        ids: &[String],
        parent: Option<LogId>,
    ) -> Result<Vec<Record>, DispatchError>;

    /// Field-wise sum of every backend's counters.
    async fn stats(
        &self,
        institution: &InstitutionId,
        capability: Capability,
        parent: Option<LogId>,
    ) -> Result<StatsCounters, DispatchError>;
}
