//! # FG-01 Communication Log Tree
//!
//! Append-only record of every exchange the gateway takes part in, with
//! parent/child linkage so a single inbound request can be replayed together
//! with every outbound call and plugin call it caused.
//!
//! **Subsystem ID:** 01
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Domain Invariants
//!
//! | ID | Invariant | Description |
//! |----|-----------|-------------|
//! | 1 | In Progress | A log without `end_time` is in progress |
//! | 2 | Monotonic Span | `end_time >= start_time` once set |
//! | 3 | Single Completion | A log is completed at most once |
//! | 4 | Append Only | Logs are never deleted |
//! | 5 | Reciprocal Parent | A child is visible in its parent's children as soon as it exists |
//! | 6 | Bounded Text | Observations are truncated with an explicit marker |
//!
//! ## Module Structure
//!
//! ```text
//! fg-01-communication-log/
//! ├── domain/          # CommunicationLog, details, filters, errors
//! ├── ports/           # CommunicationLogApi, LogRepository, Clock
//! └── service.rs       # CommunicationLogService
//! ```
//!
//! Children are never stored on the parent. Each log holds a one-way
//! `parent_id` and the repository keeps a `parent -> children` index, so the
//! tree is an arena keyed by `LogId` rather than a cyclic object graph.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod domain;
pub mod ports;
pub mod service;

// Re-exports
pub use domain::{
    truncate_observations, CommunicationDetail, CommunicationLog, HttpRequestRecord,
    HttpResponseRecord, LogError, LogFilter, LogId, LogKind, LogOutcome, MAX_OBSERVATIONS_LEN,
    MAX_PAGE_SIZE, TRUNCATION_MARKER,
};
pub use ports::{
    Clock, CommunicationLogApi, InMemoryLogRepository, LogHandle, LogRepository, ManualClock,
    SystemClock,
};
pub use service::CommunicationLogService;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
