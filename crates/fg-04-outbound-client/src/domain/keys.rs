//! # Key Material
//!
//! The TLS client identity and the HTTP signature key the engine works with,
//! plus the federation keys peers sign with.

use super::errors::KeyStoreError;
use shared_crypto::{Ed25519KeyPair, Ed25519PublicKey};
use shared_types::InstitutionId;
use std::fmt;
use std::sync::Arc;
use x509_parser::pem::parse_x509_pem;

/// TLS client certificate with its private key, both PEM.
#[derive(Clone, PartialEq, Eq)]
pub struct TlsIdentity {
    /// Certificate (chain) PEM.
    pub certificate_pem: String,
    /// Private key PEM.
    pub private_key_pem: String,
    /// Issuer equals subject. Such identities are not presented to peers.
    pub self_issued: bool,
}

impl TlsIdentity {
    /// Parse the certificate and detect self-issuance.
    ///
    /// ## Errors
    ///
    /// - `InvalidCertificate`: no parseable certificate in `certificate_pem`
    /// - `InvalidPrivateKey`: `private_key_pem` holds no private key block
    pub fn from_pem(certificate_pem: &str, private_key_pem: &str) -> Result<Self, KeyStoreError> {
        if !private_key_pem.contains("PRIVATE KEY-----") {
            return Err(KeyStoreError::InvalidPrivateKey(
                "no PRIVATE KEY block found".to_string(),
            ));
        }
        Ok(Self {
            self_issued: is_self_issued(certificate_pem)?,
            certificate_pem: certificate_pem.to_string(),
            private_key_pem: private_key_pem.to_string(),
        })
    }

    /// Whether the identity should be presented during the TLS handshake.
    pub fn presentable(&self) -> bool {
        !self.self_issued
    }

    /// Certificate followed by key, the form the HTTP stack loads.
    pub fn combined_pem(&self) -> Vec<u8> {
        let mut pem = self.certificate_pem.clone().into_bytes();
        if !pem.ends_with(b"\n") {
            pem.push(b'\n');
        }
        pem.extend_from_slice(self.private_key_pem.as_bytes());
        pem
    }
}

impl fmt::Debug for TlsIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsIdentity")
            .field("self_issued", &self.self_issued)
            .finish_non_exhaustive()
    }
}

/// Whether the first certificate in `pem` has issuer == subject.
///
/// ## Errors
///
/// - `InvalidCertificate`: no parseable certificate
pub fn is_self_issued(pem: &str) -> Result<bool, KeyStoreError> {
    let (_, block) = parse_x509_pem(pem.as_bytes())
        .map_err(|e| KeyStoreError::InvalidCertificate(e.to_string()))?;
    let certificate = block
        .parse_x509()
        .map_err(|e| KeyStoreError::InvalidCertificate(e.to_string()))?;
    Ok(certificate.issuer().as_raw() == certificate.subject().as_raw())
}

/// A registered federation key and the institution publishing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederationKey {
    /// Fingerprint, the `keyId` of signatures made with the key.
    pub key_id: String,
    /// Public key.
    pub key: Ed25519PublicKey,
    /// Publishing institution. `None` for keys listed without one, which can
    /// authenticate callers but never vouch for a partner's answer.
    pub institution: Option<InstitutionId>,
}

impl FederationKey {
    /// Key published by `institution`, if any.
    pub fn new(key: Ed25519PublicKey, institution: Option<InstitutionId>) -> Self {
        Self {
            key_id: key.fingerprint(),
            key,
            institution,
        }
    }

    /// Whether `institution` published this key.
    pub fn belongs_to(&self, institution: &InstitutionId) -> bool {
        self.institution.as_ref() == Some(institution)
    }
}

/// Everything the engine needs to authenticate itself.
#[derive(Clone, Default)]
pub struct KeyMaterial {
    /// TLS client identity.
    pub tls: Option<TlsIdentity>,
    /// HTTP signature key.
    pub signing: Option<Arc<Ed25519KeyPair>>,
}

impl KeyMaterial {
    /// Material with only an HTTP signature key.
    pub fn signing_only(key: Ed25519KeyPair) -> Self {
        Self {
            tls: None,
            signing: Some(Arc::new(key)),
        }
    }

    /// Identity to present in the TLS handshake, if any.
    pub fn presented_identity(&self) -> Option<&TlsIdentity> {
        self.tls.as_ref().filter(|identity| identity.presentable())
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("tls", &self.tls)
            .field("signing", &self.signing.as_ref().map(|k| k.public_key().fingerprint()))
            .finish()
    }
}
