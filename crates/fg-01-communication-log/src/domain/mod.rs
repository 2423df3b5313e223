//! # Domain Layer
//!
//! Log entities, protocol-specific details, query filters and errors.

pub mod entities;
pub mod errors;
pub mod filter;

pub use entities::{
    truncate_observations, CommunicationDetail, CommunicationLog, HttpRequestRecord,
    HttpResponseRecord, LogId, LogKind, LogOutcome, MAX_OBSERVATIONS_LEN, TRUNCATION_MARKER,
};
pub use errors::LogError;
pub use filter::{LogFilter, MAX_PAGE_SIZE};
