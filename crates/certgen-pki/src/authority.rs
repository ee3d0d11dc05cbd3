//! The fixed set of self-signed certificate authorities.

use crate::issuer::{CertAndKey, KeyIdMode, LeafCertificateIssuer};
use crate::serial::SerialAllocator;
use crate::template::{CertTemplate, ETCD_CA_KEY_BITS};
use certgen_types::{CaKind, CertgenError, Result};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Subject common name for a CA generated at `now`.
///
/// Most CAs are salted with the generation timestamp; the service catalog
/// CA uses a fixed name. No two CAs share a name.
pub fn common_name(kind: CaKind, now: DateTime<Utc>) -> String {
    let ts = now.timestamp();
    match kind {
        CaKind::Master => format!("openshift-signer@{}", ts),
        CaKind::FrontProxy => format!("front-proxy-signer@{}", ts),
        CaKind::Frontproxy => format!("aggregator-proxy-car@{}", ts),
        CaKind::Etcd => format!("etcd-signer@{}", ts),
        CaKind::ServiceSigner => format!("openshift-service-serving-signer@{}", ts),
        CaKind::ServiceCatalog => "service-catalog-signer".to_string(),
    }
}

/// Template for one CA.
pub fn ca_template(kind: CaKind, serial: u64, now: DateTime<Utc>) -> Result<CertTemplate> {
    let template = CertTemplate::ca(common_name(kind, now), serial, now)?;
    Ok(match kind {
        CaKind::Etcd => template.key_bits(ETCD_CA_KEY_BITS).max_path_len_zero(),
        _ => template,
    })
}

/// Key identifier handling for a CA.
pub fn key_id_mode(kind: CaKind) -> KeyIdMode {
    match kind {
        CaKind::Etcd => KeyIdMode::EtcdCa,
        _ => KeyIdMode::Standard,
    }
}

/// Issue a single self-signed CA, drawing its serial from `serial`.
pub fn issue_ca(kind: CaKind, serial: &SerialAllocator, now: DateTime<Utc>) -> Result<CertAndKey> {
    let template = ca_template(kind, serial.get(), now)?;
    let ca = LeafCertificateIssuer.issue(&template, None, key_id_mode(kind))?;
    tracing::debug!(ca = %kind, serial = template.serial, "created certificate authority");
    Ok(ca)
}

/// Typed registry of certificate authorities.
///
/// Lookups fail with [`CertgenError::UnknownSigner`] instead of returning an
/// empty value, so a leaf can never be signed by a CA that was not built.
#[derive(Debug, Clone, Default)]
pub struct CertificateAuthoritySet {
    cas: BTreeMap<CaKind, CertAndKey>,
}

impl CertificateAuthoritySet {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every CA in [`CaKind::ALL`] order.
    pub fn build(serial: &SerialAllocator, now: DateTime<Utc>) -> Result<Self> {
        let mut set = Self::new();
        for kind in CaKind::ALL {
            set.insert(kind, issue_ca(kind, serial, now)?);
        }
        tracing::info!(count = set.len(), "built certificate authorities");
        Ok(set)
    }

    /// Register a CA, replacing any previous one of the same kind.
    pub fn insert(&mut self, kind: CaKind, ca: CertAndKey) {
        self.cas.insert(kind, ca);
    }

    /// Look up a CA.
    pub fn get(&self, kind: CaKind) -> Result<&CertAndKey> {
        self.cas
            .get(&kind)
            .ok_or_else(|| CertgenError::UnknownSigner(kind.path().to_string()))
    }

    /// Look up a CA by logical path or short name.
    pub fn get_by_name(&self, name: &str) -> Result<&CertAndKey> {
        let kind: CaKind = name.parse()?;
        self.get(kind)
    }

    /// Whether `kind` has been built.
    pub fn contains(&self, kind: CaKind) -> bool {
        self.cas.contains_key(&kind)
    }

    /// CAs in [`CaKind`] order.
    pub fn iter(&self) -> impl Iterator<Item = (CaKind, &CertAndKey)> {
        self.cas.iter().map(|(kind, ca)| (*kind, ca))
    }

    /// Number of CAs.
    pub fn len(&self) -> usize {
        self.cas.len()
    }

    /// Whether no CA has been built.
    pub fn is_empty(&self) -> bool {
        self.cas.is_empty()
    }
}
