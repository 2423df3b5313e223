//! # FG-03 Plugin Dispatch Router
//!
//! Resolves which backend(s) serve an institution, or one of its
//! organizational units, for a capability, and reconciles answers when an
//! institution is split across several backends.
//!
//! **Subsystem ID:** 03
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Resolution Views
//!
//! | Operation | Returns |
//! |-----------|---------|
//! | `has_backend` | whether any backend serves `(institution, capability)` |
//! | `all_backends` | every backend, registration order |
//! | `all_backends_grouped_by_institution` | the whole federation for a capability |
//! | `primary_backend` | designated backend, else the first registered |
//! | `backend_for_unit` | the single backend covering an organizational unit |
//!
//! ## Reconciliation Policies
//!
//! | Policy | Rule |
//! |--------|------|
//! | Index | concatenate listings in router order, no de-duplication |
//! | Get | mapped id: only the unit's backend; unmapped: primary, then the rest in order; unknown ids dropped |
//! | Stats | field-wise addition over zeroed counters |
//!
//! Backend calls of one request run concurrently where order does not
//! matter. The request fails if any branch fails.
//!
//! ## Module Structure
//!
//! ```text
//! fg-03-dispatch-router/
//! ├── domain/          # Backend, BackendDescriptor, BackendRegistry, errors
//! ├── ports/           # RecordQueryApi, RecordProvider
//! ├── adapters/        # InMemoryBackend, RemoteBackend
//! ├── router.rs        # DispatchRouter (hot-swappable registry)
//! └── reconciler.rs    # Reconciler (index/get/stats)
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod reconciler;
pub mod router;

// Re-exports
pub use adapters::{CallRecord, InMemoryBackend, RemoteBackend};
pub use domain::{Backend, BackendDescriptor, BackendId, BackendRegistry, DispatchError, RegistryBuilder};
pub use ports::{FailingProvider, ProviderError, RecordProvider, RecordQueryApi};
pub use reconciler::Reconciler;
pub use router::DispatchRouter;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    #[allow(clippy::const_is_empty)]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }
}
