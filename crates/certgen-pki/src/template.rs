//! Certificate templates.

use certgen_types::{ExtKeyUsage, Result};
use chrono::{DateTime, Utc};
use std::net::IpAddr;
use yasna::models::ObjectIdentifier;
use yasna::DERWriter;

const ORGANIZATION_OID: [u64; 4] = [2, 5, 4, 10];
const COMMON_NAME_OID: [u64; 4] = [2, 5, 4, 3];

/// RSA modulus size for ordinary keys.
pub const DEFAULT_KEY_BITS: u32 = 2048;

/// RSA modulus size for the etcd CA.
pub const ETCD_CA_KEY_BITS: u32 = 4096;

/// Validity of every CA, in years.
pub const CA_VALIDITY_YEARS: u32 = 5;

/// Validity of ordinary master leaves, in years.
pub const LEAF_VALIDITY_YEARS: u32 = 2;

/// Validity of the etcd peer and server certificates, in years.
pub const ETCD_VALIDITY_YEARS: u32 = 5;

/// Key usage bits a template may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyUsageBit {
    /// digitalSignature
    DigitalSignature,
    /// keyEncipherment
    KeyEncipherment,
    /// keyCertSign
    CertSign,
}

/// Subject distinguished name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    /// Common name
    pub common_name: String,
    /// Organizations, in order
    pub organizations: Vec<String>,
}

impl Subject {
    /// Subject with only a common name.
    pub fn new(common_name: impl Into<String>) -> Self {
        Self {
            common_name: common_name.into(),
            organizations: Vec::new(),
        }
    }

    /// DER `Name`: one multi-valued RDN holding every organization, then
    /// the common name.
    ///
    /// Values are PrintableString when every character allows it and
    /// UTF8String otherwise.
    pub fn to_der(&self) -> Vec<u8> {
        yasna::construct_der(|writer| {
            writer.write_sequence(|writer| {
                if !self.organizations.is_empty() {
                    let values: Vec<&str> = self.organizations.iter().map(String::as_str).collect();
                    write_rdn(writer.next(), &ORGANIZATION_OID, &values);
                }
                write_rdn(writer.next(), &COMMON_NAME_OID, &[self.common_name.as_str()]);
            });
        })
    }
}

fn write_rdn(writer: DERWriter, oid: &[u64], values: &[&str]) {
    let oid = ObjectIdentifier::from_slice(oid);
    let mut encoded: Vec<Vec<u8>> = values
        .iter()
        .map(|value| {
            yasna::construct_der(|writer| {
                writer.write_sequence(|writer| {
                    writer.next().write_oid(&oid);
                    if value.bytes().all(is_printable) {
                        writer.next().write_printable_string(value);
                    } else {
                        writer.next().write_utf8_string(value);
                    }
                });
            })
        })
        .collect();
    encoded.sort();

    writer.write_set(|writer| {
        for attribute in &encoded {
            writer.next().write_der(attribute);
        }
    });
}

fn is_printable(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b" '()+,-./:=?".contains(&b)
}

/// Everything needed to issue one certificate, apart from the signer.
#[derive(Debug, Clone)]
pub struct CertTemplate {
    /// Subject name
    pub subject: Subject,
    /// DNS subject alternative names
    pub dns_names: Vec<String>,
    /// IP subject alternative names
    pub ip_addresses: Vec<IpAddr>,
    /// Key usage bits
    pub key_usage: Vec<KeyUsageBit>,
    /// Extended key usages
    pub ext_key_usage: Vec<ExtKeyUsage>,
    /// Whether this is a CA certificate
    pub is_ca: bool,
    /// Emit `pathlen:0` in basic constraints (CAs only)
    pub max_path_len_zero: bool,
    /// Start of validity
    pub not_before: DateTime<Utc>,
    /// End of validity
    pub not_after: DateTime<Utc>,
    /// Serial number
    pub serial: u64,
    /// RSA key size for the new key
    pub key_bits: u32,
}

impl CertTemplate {
    /// Template for a self-signed CA valid for [`CA_VALIDITY_YEARS`] from `now`.
    pub fn ca(common_name: impl Into<String>, serial: u64, now: DateTime<Utc>) -> Result<Self> {
        Ok(Self {
            subject: Subject::new(common_name),
            dns_names: Vec::new(),
            ip_addresses: Vec::new(),
            key_usage: vec![
                KeyUsageBit::DigitalSignature,
                KeyUsageBit::KeyEncipherment,
                KeyUsageBit::CertSign,
            ],
            ext_key_usage: Vec::new(),
            is_ca: true,
            max_path_len_zero: false,
            not_before: now,
            not_after: certgen_core::time::years_after(now, CA_VALIDITY_YEARS)?,
            serial,
            key_bits: DEFAULT_KEY_BITS,
        })
    }

    /// Template for a leaf valid for `years` from `now`.
    pub fn leaf(
        common_name: impl Into<String>,
        serial: u64,
        now: DateTime<Utc>,
        years: u32,
    ) -> Result<Self> {
        Ok(Self {
            subject: Subject::new(common_name),
            dns_names: Vec::new(),
            ip_addresses: Vec::new(),
            key_usage: vec![KeyUsageBit::DigitalSignature, KeyUsageBit::KeyEncipherment],
            ext_key_usage: Vec::new(),
            is_ca: false,
            max_path_len_zero: false,
            not_before: now,
            not_after: certgen_core::time::years_after(now, years)?,
            serial,
            key_bits: DEFAULT_KEY_BITS,
        })
    }

    /// Set the subject organizations.
    pub fn organizations<I, S>(mut self, organizations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subject.organizations = organizations.into_iter().map(Into::into).collect();
        self
    }

    /// Set the DNS subject alternative names.
    pub fn dns_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dns_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Set the IP subject alternative names.
    pub fn ip_addresses(mut self, ips: impl IntoIterator<Item = IpAddr>) -> Self {
        self.ip_addresses = ips.into_iter().collect();
        self
    }

    /// Set the extended key usages.
    pub fn ext_key_usage(mut self, usages: impl IntoIterator<Item = ExtKeyUsage>) -> Self {
        self.ext_key_usage = usages.into_iter().collect();
        self
    }

    /// Use a different RSA key size.
    pub fn key_bits(mut self, bits: u32) -> Self {
        self.key_bits = bits;
        self
    }

    /// Restrict a CA to signing leaves only.
    pub fn max_path_len_zero(mut self) -> Self {
        self.max_path_len_zero = true;
        self
    }

    /// Whether the template carries any subject alternative name.
    pub fn has_sans(&self) -> bool {
        !self.dns_names.is_empty() || !self.ip_addresses.is_empty()
    }
}
