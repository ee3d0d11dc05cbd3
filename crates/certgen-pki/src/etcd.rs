//! etcd peer and server certificates.

use crate::authority::CertificateAuthoritySet;
use crate::issuer::{CertAndKey, KeyIdMode, LeafCertificateIssuer};
use crate::serial::SerialAllocator;
use crate::template::{CertTemplate, ETCD_VALIDITY_YEARS};
use certgen_types::{CaKind, EtcdKind, ExtKeyUsage, Result};
use chrono::{DateTime, Utc};
use std::net::IpAddr;

/// Issues the etcd certificates for one master.
///
/// Both are signed by the etcd CA, carry the modulus-based key identifiers,
/// and name the master by hostname and first IP.
#[derive(Debug, Clone)]
pub struct EtcdCertificateIssuer<'a> {
    hostname: &'a str,
    ip: IpAddr,
}

impl<'a> EtcdCertificateIssuer<'a> {
    /// Issuer for the master at `hostname` / `ip`.
    pub fn new(hostname: &'a str, ip: IpAddr) -> Self {
        Self { hostname, ip }
    }

    /// Template for one etcd certificate.
    pub fn template(&self, kind: EtcdKind, serial: u64, now: DateTime<Utc>) -> Result<CertTemplate> {
        let usages = match kind {
            EtcdKind::Peer => vec![ExtKeyUsage::ClientAuth, ExtKeyUsage::ServerAuth],
            EtcdKind::Server => vec![ExtKeyUsage::ServerAuth],
        };
        Ok(CertTemplate::leaf(self.hostname, serial, now, ETCD_VALIDITY_YEARS)?
            .ext_key_usage(usages)
            .dns_names([self.hostname])
            .ip_addresses([self.ip]))
    }

    /// Issue one etcd certificate.
    pub fn issue(
        &self,
        kind: EtcdKind,
        cas: &CertificateAuthoritySet,
        serial: &SerialAllocator,
        now: DateTime<Utc>,
    ) -> Result<CertAndKey> {
        let signer = cas.get(CaKind::Etcd)?;
        let template = self.template(kind, serial.get(), now)?;
        let cert = LeafCertificateIssuer.issue(&template, Some(signer), KeyIdMode::EtcdClient)?;
        tracing::debug!(cert = %kind, serial = template.serial, "issued etcd certificate");
        Ok(cert)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authority::issue_ca;
    use crate::extensions;
    use certgen_types::CertgenError;
    use chrono::TimeZone;

    #[test]
    fn test_peer_template() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let issuer = EtcdCertificateIssuer::new("master-0", "10.0.0.5".parse().unwrap());
        let template = issuer.template(EtcdKind::Peer, 12, now).unwrap();

        assert_eq!(template.subject.common_name, "master-0");
        assert_eq!(template.ext_key_usage, vec![ExtKeyUsage::ClientAuth, ExtKeyUsage::ServerAuth]);
        assert_eq!(template.dns_names, vec!["master-0".to_string()]);
        assert_eq!(template.not_after, Utc.with_ymd_and_hms(2029, 6, 1, 0, 0, 0).unwrap());

        let template = issuer.template(EtcdKind::Server, 13, now).unwrap();
        assert_eq!(template.ext_key_usage, vec![ExtKeyUsage::ServerAuth]);
    }

    #[test]
    fn test_requires_etcd_ca() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let issuer = EtcdCertificateIssuer::new("master-0", "10.0.0.5".parse().unwrap());
        let err = issuer
            .issue(EtcdKind::Server, &CertificateAuthoritySet::new(), &SerialAllocator::new(), now)
            .unwrap_err();
        assert!(matches!(err, CertgenError::UnknownSigner(_)));
    }

    #[test]
    fn test_server_key_ids_follow_etcd_ca() {
        let now = certgen_core::time::now();
        let serial = SerialAllocator::new();
        let mut cas = CertificateAuthoritySet::new();
        cas.insert(CaKind::Etcd, issue_ca(CaKind::Etcd, &serial, now).unwrap());
        let ca = cas.get(CaKind::Etcd).unwrap();

        let issuer = EtcdCertificateIssuer::new("master-0", "10.0.0.5".parse().unwrap());
        let server = issuer.issue(EtcdKind::Server, &cas, &serial, now).unwrap();

        assert!(server.cert().verify(ca.key()).unwrap());
        assert_eq!(server.serial().unwrap(), 2);

        let ski = server.cert().subject_key_id().unwrap().as_slice().to_vec();
        assert_eq!(ski, extensions::key_id(&server.modulus().unwrap()));

        let aki = server.cert().authority_key_id().unwrap().as_slice().to_vec();
        assert_eq!(aki, extensions::key_id(&ca.modulus().unwrap()));
        assert_eq!(
            ca.cert().subject_key_id().unwrap().as_slice(),
            aki.as_slice()
        );
    }
}
