//! # PEM Key Store
//!
//! `KeySource` reading key files from disk on every load:
//!
//! | File | Content |
//! |------|---------|
//! | certificate | X.509 certificate (chain), PEM |
//! | private key | TLS private key, PEM |
//! | signing key | base64 32-byte Ed25519 seed |

use crate::domain::{KeyMaterial, KeyStoreError, TlsIdentity};
use crate::ports::KeySource;
use shared_crypto::Ed25519KeyPair;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Key files on disk. Absent paths mean the material is not configured.
#[derive(Debug, Clone, Default)]
pub struct PemKeyStore {
    certificate: Option<PathBuf>,
    private_key: Option<PathBuf>,
    signing_key: Option<PathBuf>,
}

impl PemKeyStore {
    /// Store without any files.
    pub fn new() -> Self {
        Self::default()
    }

    /// TLS certificate and private key files.
    pub fn with_tls(mut self, certificate: impl Into<PathBuf>, private_key: impl Into<PathBuf>) -> Self {
        self.certificate = Some(certificate.into());
        self.private_key = Some(private_key.into());
        self
    }

    /// HTTP signature seed file.
    pub fn with_signing_key(mut self, path: impl Into<PathBuf>) -> Self {
        self.signing_key = Some(path.into());
        self
    }
}

fn read(path: &Path) -> Result<String, KeyStoreError> {
    fs::read_to_string(path).map_err(|e| KeyStoreError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

impl KeySource for PemKeyStore {
    fn load(&self) -> Result<KeyMaterial, KeyStoreError> {
        let tls = match (&self.certificate, &self.private_key) {
            (Some(certificate), Some(private_key)) => {
                Some(TlsIdentity::from_pem(&read(certificate)?, &read(private_key)?)?)
            }
            _ => None,
        };
        let signing = match &self.signing_key {
            Some(path) => Some(Arc::new(Ed25519KeyPair::from_base64_seed(read(path)?.trim())?)),
            None => None,
        };
        Ok(KeyMaterial { tls, signing })
    }
}
