//! # Domain Layer
//!
//! Backend handles, their descriptors and the registry built from them.

pub mod backend;
pub mod descriptor;
pub mod errors;
pub mod registry;

pub use backend::Backend;
pub use descriptor::{BackendDescriptor, BackendId};
pub use errors::DispatchError;
pub use registry::{BackendRegistry, RegistryBuilder};
