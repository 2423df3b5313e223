//! # Shared Types Crate
//!
//! Domain identifiers, capability tags, backend records and wire envelopes
//! used across all gateway subsystems.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: Types that cross a subsystem boundary live here.
//! - **Opaque Payloads**: Record bodies are carried as JSON documents; the
//!   gateway never interprets a data domain's schema.
//! - **Neutral Errors**: Inbound validation failures carry a developer-facing
//!   detail and an empty user-facing message.

pub mod entities;
pub mod envelope;
pub mod errors;

pub use entities::*;
pub use envelope::{AuthMethod, CorrelationId, ErrorResponse};
pub use errors::*;
