//! # Federation Gateway Test Suite
//!
//! Tests that cross subsystem boundaries. Per-crate behavior is covered by
//! each crate's own unit tests.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── support.rs     # In-process transport and fixture files
//!     ├── flows.rs       # One gateway: sync, reconciliation, logging
//!     └── federation.rs  # Two gateways talking over the signed protocol
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p fg-tests
//!
//! # By category
//! cargo test -p fg-tests integration::flows::
//! cargo test -p fg-tests integration::federation::
//! ```

pub mod integration;
