//! # Core Domain Entities
//!
//! Identifiers and records exchanged between the gateway subsystems.
//!
//! ## Clusters
//!
//! - **Identity**: `InstitutionId`, `OunitId`
//! - **Protocol**: `Capability`
//! - **Backend Data**: `Record`, `BackendStats`, `StatsCounters`

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// =============================================================================
// CLUSTER A: IDENTITY
// =============================================================================

/// Stable identifier of a participating institution (a HEI id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstitutionId(String);

impl InstitutionId {
    /// Create from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstitutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InstitutionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for InstitutionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Identifier of an organizational unit within an institution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OunitId(String);

impl OunitId {
    /// Create from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OunitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OunitId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for OunitId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// =============================================================================
// CLUSTER B: PROTOCOL
// =============================================================================

/// A named protocol function a backend may implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    /// Inter-institutional agreements.
    Agreements,
    /// Notifications that a partner's agreement changed.
    AgreementChangeNotification,
    /// Outgoing mobility records.
    OutgoingMobilities,
    /// Notifications that an outgoing mobility changed.
    MobilityChangeNotification,
    /// Incoming mobility records.
    IncomingMobilities,
    /// Course catalogue.
    Courses,
    /// Organizational units of an institution.
    OrganizationalUnits,
}

impl Capability {
    /// Every capability, in wire-name order.
    pub const ALL: [Capability; 7] = [
        Capability::Agreements,
        Capability::AgreementChangeNotification,
        Capability::OutgoingMobilities,
        Capability::MobilityChangeNotification,
        Capability::IncomingMobilities,
        Capability::Courses,
        Capability::OrganizationalUnits,
    ];

    /// Wire name used in routes, registry entries and log records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Agreements => "agreements",
            Capability::AgreementChangeNotification => "agreement-change-notification",
            Capability::OutgoingMobilities => "outgoing-mobilities",
            Capability::MobilityChangeNotification => "mobility-change-notification",
            Capability::IncomingMobilities => "incoming-mobilities",
            Capability::Courses => "courses",
            Capability::OrganizationalUnits => "organizational-units",
        }
    }

    /// Counter fields reported by the stats operation of this capability.
    ///
    /// Merged statistics always contain every one of these fields, starting
    /// from zero.
    pub fn stat_fields(&self) -> &'static [&'static str] {
        match self {
            Capability::Agreements => &[
                "fetchable",
                "localUnapprovedPartnerApproved",
                "localApprovedPartnerUnapproved",
                "bothApproved",
            ],
            Capability::OutgoingMobilities | Capability::IncomingMobilities => &[
                "fetchable",
                "pending",
                "approved",
                "cancelled",
            ],
            _ => &[],
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a wire name matches no capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCapability(pub String);

impl fmt::Display for UnknownCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown capability: {}", self.0)
    }
}

impl std::error::Error for UnknownCapability {}

impl FromStr for Capability {
    type Err = UnknownCapability;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Capability::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownCapability(s.to_string()))
    }
}

// =============================================================================
// CLUSTER C: BACKEND DATA
// =============================================================================

/// A record fetched from a backend.
///
/// The payload is opaque to the gateway; only the id and the owning
/// organizational unit are interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// External identifier of the record.
    pub id: String,
    /// Organizational unit that owns the record, when the backend knows it.
    #[serde(default)]
    pub owner_ounit_id: Option<OunitId>,
    /// Domain payload.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Record {
    /// Create a record with an owner and an empty payload.
    pub fn owned(id: impl Into<String>, owner: impl Into<OunitId>) -> Self {
        Self {
            id: id.into(),
            owner_ounit_id: Some(owner.into()),
            payload: serde_json::Value::Null,
        }
    }
}

/// Counters as reported by a single backend. A `None` means "not reported".
pub type BackendStats = BTreeMap<String, Option<u64>>;

/// Merged counters across any number of backends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatsCounters(BTreeMap<String, u64>);

impl StatsCounters {
    /// Counters with every given field present and set to zero.
    pub fn zeroed(fields: &[&str]) -> Self {
        Self(fields.iter().map(|f| (f.to_string(), 0)).collect())
    }

    /// Add a backend's contribution field by field. Missing or `None`
    /// fields contribute zero.
    pub fn merge(&mut self, contribution: &BackendStats) {
        for (field, value) in contribution {
            let total = self.0.entry(field.clone()).or_insert(0);
            *total = total.saturating_add(value.unwrap_or(0));
        }
    }

    /// Current value of a field, zero if absent.
    pub fn get(&self, field: &str) -> u64 {
        self.0.get(field).copied().unwrap_or(0)
    }

    /// Borrow the underlying map.
    pub fn as_map(&self) -> &BTreeMap<String, u64> {
        &self.0
    }
}
