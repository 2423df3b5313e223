//! # Shared Crypto
//!
//! Primitives behind the federation's HTTP signatures.
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `hashing` | SHA-256 | Body digests (`Digest: SHA-256=...`) and key fingerprints |
//! | `signatures` | Ed25519 | Request and response signatures |
//!
//! All binary values that travel in headers are standard base64.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod errors;
pub mod hashing;
pub mod signatures;

// Re-exports
pub use errors::CryptoError;
pub use hashing::{digest_header_value, sha256, sha256_hex};
pub use signatures::{Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
