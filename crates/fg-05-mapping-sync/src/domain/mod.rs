//! # Domain Layer
//!
//! Run configuration, run reports and errors of the synchronizer.

pub mod config;
pub mod errors;
pub mod report;

pub use config::SyncConfig;
pub use errors::SyncError;
pub use report::SyncReport;
