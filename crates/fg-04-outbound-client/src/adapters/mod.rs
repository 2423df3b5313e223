//! # Adapters
//!
//! Production implementations of the outbound ports.

pub mod pem_key_store;
pub mod reqwest_transport;
pub mod static_registry;

pub use pem_key_store::PemKeyStore;
pub use reqwest_transport::ReqwestTransport;
pub use static_registry::{InstitutionEntry, StaticRegistry};
