//! # Ports Layer
//!
//! Inbound API implemented by the service and outbound SPI for storage and
//! time.

pub mod inbound;
pub mod outbound;

pub use inbound::{CommunicationLogApi, LogHandle};
pub use outbound::{Clock, InMemoryLogRepository, LogRepository, ManualClock, SystemClock};
