//! # Inbound Ports (Driving Ports)

use crate::domain::{OperationResult, OutboundRequest};
use async_trait::async_trait;
use fg_01_communication_log::LogId;

/// Primary API for sending requests to partner gateways.
#[async_trait]
pub trait OutboundApi: Send + Sync {
    /// Sign, send, verify and classify one request.
    ///
    /// Never fails: every outcome is an `OperationResult`, and each call is
    /// recorded as exactly one communication log entry, a child of `parent`
    /// when given.
    async fn execute(&self, request: OutboundRequest, parent: Option<LogId>) -> OperationResult;
}
