//! Decoding issued certificates back into plain data.

use crate::issuer::serial_from_bytes;
use certgen_types::{CertgenError, Result};
use chrono::{DateTime, TimeZone, Utc};
use openssl::x509::X509Ref;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use x509_parser::pem::parse_x509_pem;
use x509_parser::prelude::*;

/// Decoded view of a certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    /// Subject in RFC 4514-ish form
    pub subject: String,
    /// Subject common name
    pub common_name: Option<String>,
    /// Subject organizations
    pub organizations: Vec<String>,
    /// Issuer in RFC 4514-ish form
    pub issuer: String,
    /// Serial number
    pub serial: u64,
    /// Start of validity
    pub not_before: DateTime<Utc>,
    /// End of validity
    pub not_after: DateTime<Utc>,
    /// Basic constraints CA flag
    pub is_ca: bool,
    /// Basic constraints path length, if present
    pub path_len: Option<u32>,
    /// DNS subject alternative names
    pub dns_names: Vec<String>,
    /// IP subject alternative names
    pub ip_addresses: Vec<IpAddr>,
    /// keyUsage digitalSignature
    pub digital_signature: bool,
    /// keyUsage keyEncipherment
    pub key_encipherment: bool,
    /// keyUsage keyCertSign
    pub key_cert_sign: bool,
    /// extendedKeyUsage serverAuth
    pub server_auth: bool,
    /// extendedKeyUsage clientAuth
    pub client_auth: bool,
    /// Subject key identifier
    pub subject_key_id: Option<Vec<u8>>,
    /// Authority key identifier key id
    pub authority_key_id: Option<Vec<u8>>,
    /// Authority key identifier serial
    pub authority_serial: Option<Vec<u8>>,
    /// Whether the AKI names the authority by directory name
    pub authority_has_issuer: bool,
}

impl CertificateInfo {
    /// Decode the first certificate in a PEM document.
    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        let (_, pem) = parse_x509_pem(pem)
            .map_err(|e| CertgenError::Crypto(format!("Failed to read certificate PEM: {}", e)))?;
        Self::from_der(&pem.contents)
    }

    /// Decode a DER certificate.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let (_, cert) = parse_x509_certificate(der)
            .map_err(|e| CertgenError::Crypto(format!("Failed to parse certificate: {}", e)))?;
        Self::from_parsed(&cert)
    }

    /// Decode an OpenSSL certificate.
    pub fn from_x509(cert: &X509Ref) -> Result<Self> {
        let der = cert
            .to_der()
            .map_err(|e| CertgenError::Crypto(format!("Failed to encode certificate: {}", e)))?;
        Self::from_der(&der)
    }

    fn from_parsed(cert: &X509Certificate<'_>) -> Result<Self> {
        let mut info = Self {
            subject: cert.subject().to_string(),
            common_name: cert
                .subject()
                .iter_common_name()
                .next()
                .and_then(|cn| cn.as_str().ok())
                .map(str::to_string),
            organizations: cert
                .subject()
                .iter_organization()
                .filter_map(|o| o.as_str().ok())
                .map(str::to_string)
                .collect(),
            issuer: cert.issuer().to_string(),
            serial: serial_from_bytes(cert.raw_serial())?,
            not_before: to_utc(cert.validity().not_before)?,
            not_after: to_utc(cert.validity().not_after)?,
            is_ca: false,
            path_len: None,
            dns_names: Vec::new(),
            ip_addresses: Vec::new(),
            digital_signature: false,
            key_encipherment: false,
            key_cert_sign: false,
            server_auth: false,
            client_auth: false,
            subject_key_id: None,
            authority_key_id: None,
            authority_serial: None,
            authority_has_issuer: false,
        };

        for ext in cert.extensions() {
            match ext.parsed_extension() {
                ParsedExtension::BasicConstraints(bc) => {
                    info.is_ca = bc.ca;
                    info.path_len = bc.path_len_constraint;
                }
                ParsedExtension::KeyUsage(ku) => {
                    info.digital_signature = ku.digital_signature();
                    info.key_encipherment = ku.key_encipherment();
                    info.key_cert_sign = ku.key_cert_sign();
                }
                ParsedExtension::ExtendedKeyUsage(eku) => {
                    info.server_auth = eku.server_auth;
                    info.client_auth = eku.client_auth;
                }
                ParsedExtension::SubjectAlternativeName(san) => {
                    for name in &san.general_names {
                        match name {
                            GeneralName::DNSName(dns) => info.dns_names.push(dns.to_string()),
                            GeneralName::IPAddress(bytes) => {
                                if let Some(ip) = ip_from_bytes(bytes) {
                                    info.ip_addresses.push(ip);
                                }
                            }
                            _ => {}
                        }
                    }
                }
                ParsedExtension::SubjectKeyIdentifier(kid) => {
                    info.subject_key_id = Some(kid.0.to_vec());
                }
                ParsedExtension::AuthorityKeyIdentifier(aki) => {
                    info.authority_key_id = aki.key_identifier.as_ref().map(|kid| kid.0.to_vec());
                    info.authority_serial = aki.authority_cert_serial.map(|s| s.to_vec());
                    info.authority_has_issuer = aki
                        .authority_cert_issuer
                        .as_ref()
                        .map(|names| names.iter().any(|n| matches!(n, GeneralName::DirectoryName(_))))
                        .unwrap_or(false);
                }
                _ => {}
            }
        }

        Ok(info)
    }

    /// Whether the subject and issuer are the same name.
    pub fn is_self_issued(&self) -> bool {
        self.subject == self.issuer
    }

    /// Whether any subject alternative name is present.
    pub fn has_sans(&self) -> bool {
        !self.dns_names.is_empty() || !self.ip_addresses.is_empty()
    }

    /// Whole days from `now` until expiry; negative once expired.
    pub fn days_until_expiry(&self, now: DateTime<Utc>) -> i64 {
        self.not_after.signed_duration_since(now).num_days()
    }
}

fn to_utc(time: ASN1Time) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(time.timestamp(), 0)
        .single()
        .ok_or_else(|| CertgenError::Crypto(format!("certificate time {} is out of range", time)))
}

fn ip_from_bytes(bytes: &[u8]) -> Option<IpAddr> {
    match bytes.len() {
        4 => {
            let octets: [u8; 4] = bytes.try_into().ok()?;
            Some(IpAddr::V4(Ipv4Addr::from(octets)))
        }
        16 => {
            let octets: [u8; 16] = bytes.try_into().ok()?;
            Some(IpAddr::V6(Ipv6Addr::from(octets)))
        }
        _ => None,
    }
}
