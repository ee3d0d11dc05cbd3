//! Certificate issuance.

use crate::crypto_err;
use crate::extensions::{self, AUTHORITY_KEY_IDENTIFIER_OID, SUBJECT_KEY_IDENTIFIER_OID};
use crate::template::{CertTemplate, KeyUsageBit, Subject};
use certgen_types::{CertgenError, ExtKeyUsage, Result};
use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::x509::extension::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectAlternativeName,
    SubjectKeyIdentifier,
};
use openssl::x509::{X509Builder, X509Name, X509};

/// An issued certificate and its RSA private key.
#[derive(Clone)]
pub struct CertAndKey {
    cert: X509,
    key: PKey<Private>,
}

impl std::fmt::Debug for CertAndKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertAndKey")
            .field("subject", &self.cert.subject_name())
            .field("serial", &self.cert.serial_number().to_bn().ok())
            .finish_non_exhaustive()
    }
}

impl CertAndKey {
    /// Pair a certificate with its key.
    pub fn new(cert: X509, key: PKey<Private>) -> Self {
        Self { cert, key }
    }

    /// The certificate.
    pub fn cert(&self) -> &X509 {
        &self.cert
    }

    /// The private key.
    pub fn key(&self) -> &PKey<Private> {
        &self.key
    }

    /// Certificate as a `CERTIFICATE` PEM block.
    pub fn cert_pem(&self) -> Result<Vec<u8>> {
        self.cert.to_pem().map_err(crypto_err("encode certificate"))
    }

    /// Key as a PKCS#1 `RSA PRIVATE KEY` PEM block.
    pub fn key_pem(&self) -> Result<Vec<u8>> {
        rsa_private_key_pem(&self.key)
    }

    /// Serial number of the certificate.
    pub fn serial(&self) -> Result<u64> {
        let bytes = self.serial_bytes()?;
        serial_from_bytes(&bytes)
    }

    /// Big-endian magnitude of the serial number.
    pub fn serial_bytes(&self) -> Result<Vec<u8>> {
        let bn = self
            .cert
            .serial_number()
            .to_bn()
            .map_err(crypto_err("read serial number"))?;
        Ok(bn.to_vec())
    }

    /// Big-endian bytes of the RSA modulus.
    pub fn modulus(&self) -> Result<Vec<u8>> {
        let rsa = self.key.rsa().map_err(crypto_err("read RSA key"))?;
        Ok(rsa.n().to_vec())
    }

    /// DER encoding of the certificate subject.
    pub fn subject_der(&self) -> Result<Vec<u8>> {
        self.cert
            .subject_name()
            .to_der()
            .map_err(crypto_err("encode subject name"))
    }

    /// Subject common name, if present.
    pub fn common_name(&self) -> Option<String> {
        self.cert
            .subject_name()
            .entries_by_nid(openssl::nid::Nid::COMMONNAME)
            .next()
            .and_then(|entry| entry.data().as_utf8().ok())
            .map(|cn| cn.to_string())
    }
}

/// PKCS#1 PEM encoding of an RSA private key.
pub fn rsa_private_key_pem(key: &PKey<Private>) -> Result<Vec<u8>> {
    key.rsa()
        .map_err(crypto_err("read RSA key"))?
        .private_key_to_pem()
        .map_err(crypto_err("encode private key"))
}

/// PKIX `PUBLIC KEY` PEM encoding of the public half of a key.
pub fn public_key_pem(key: &PKey<Private>) -> Result<Vec<u8>> {
    key.public_key_to_pem().map_err(crypto_err("encode public key"))
}

/// Generate an RSA key of `bits` bits.
pub fn generate_key(bits: u32) -> Result<PKey<Private>> {
    let rsa = Rsa::generate(bits).map_err(crypto_err("generate RSA key"))?;
    PKey::from_rsa(rsa).map_err(crypto_err("create private key"))
}

pub(crate) fn serial_from_bytes(bytes: &[u8]) -> Result<u64> {
    let significant: Vec<u8> = bytes.iter().copied().skip_while(|b| *b == 0).collect();
    if significant.len() > 8 {
        return Err(CertgenError::Crypto(format!(
            "serial number 0x{} does not fit in 64 bits",
            hex::encode(bytes)
        )));
    }
    Ok(significant.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}

/// How Subject and Authority Key Identifiers are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyIdMode {
    /// Library defaults: CAs get a standard SKI, signed leaves get an AKI
    /// copied from the signer's SKI.
    Standard,
    /// The etcd CA: SKI is SHA-1 of the modulus and a raw AKI names the
    /// certificate's own subject and serial, without a key identifier.
    EtcdCa,
    /// Certificates signed by the etcd CA: SKI is SHA-1 of the new modulus
    /// and a raw AKI carries SHA-1 of the signer's modulus together with the
    /// signer's subject and serial.
    EtcdClient,
}

/// Issues certificates from templates.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeafCertificateIssuer;

impl LeafCertificateIssuer {
    /// Generate a key and certificate for `template`.
    ///
    /// With no `signer` the certificate is self-signed. Every failure is a
    /// [`CertgenError::Crypto`]; nothing is retried.
    pub fn issue(
        &self,
        template: &CertTemplate,
        signer: Option<&CertAndKey>,
        mode: KeyIdMode,
    ) -> Result<CertAndKey> {
        if mode == KeyIdMode::EtcdClient && signer.is_none() {
            return Err(CertgenError::Validation(format!(
                "'{}' requests an etcd client key identifier but has no signer",
                template.subject.common_name
            )));
        }

        let key = generate_key(template.key_bits)?;
        let subject = build_name(&template.subject)?;

        let mut builder = X509Builder::new().map_err(crypto_err("create X509 builder"))?;
        builder.set_version(2).map_err(crypto_err("set version"))?;

        let serial = BigNum::from_slice(&template.serial.to_be_bytes())
            .and_then(|bn| bn.to_asn1_integer())
            .map_err(crypto_err("create serial"))?;
        builder
            .set_serial_number(&serial)
            .map_err(crypto_err("set serial number"))?;

        builder
            .set_subject_name(&subject)
            .map_err(crypto_err("set subject"))?;
        let issuer = match signer {
            Some(signer) => signer.cert.subject_name(),
            None => &*subject,
        };
        builder
            .set_issuer_name(issuer)
            .map_err(crypto_err("set issuer"))?;

        let not_before = Asn1Time::from_unix(template.not_before.timestamp())
            .map_err(crypto_err("create not_before"))?;
        let not_after = Asn1Time::from_unix(template.not_after.timestamp())
            .map_err(crypto_err("create not_after"))?;
        builder
            .set_not_before(&not_before)
            .map_err(crypto_err("set not_before"))?;
        builder
            .set_not_after(&not_after)
            .map_err(crypto_err("set not_after"))?;

        builder.set_pubkey(&key).map_err(crypto_err("set pubkey"))?;

        let mut basic_constraints = BasicConstraints::new();
        basic_constraints.critical();
        if template.is_ca {
            basic_constraints.ca();
            if template.max_path_len_zero {
                basic_constraints.pathlen(0);
            }
        }
        let basic_constraints = basic_constraints
            .build()
            .map_err(crypto_err("build basic constraints"))?;
        builder
            .append_extension(basic_constraints)
            .map_err(crypto_err("append basic constraints"))?;

        if !template.key_usage.is_empty() {
            let mut key_usage = KeyUsage::new();
            key_usage.critical();
            for bit in &template.key_usage {
                match bit {
                    KeyUsageBit::DigitalSignature => key_usage.digital_signature(),
                    KeyUsageBit::KeyEncipherment => key_usage.key_encipherment(),
                    KeyUsageBit::CertSign => key_usage.key_cert_sign(),
                };
            }
            let key_usage = key_usage.build().map_err(crypto_err("build key usage"))?;
            builder
                .append_extension(key_usage)
                .map_err(crypto_err("append key usage"))?;
        }

        if !template.ext_key_usage.is_empty() {
            let mut ext_key_usage = ExtendedKeyUsage::new();
            for usage in &template.ext_key_usage {
                match usage {
                    ExtKeyUsage::ServerAuth => ext_key_usage.server_auth(),
                    ExtKeyUsage::ClientAuth => ext_key_usage.client_auth(),
                };
            }
            let ext_key_usage = ext_key_usage
                .build()
                .map_err(crypto_err("build extended key usage"))?;
            builder
                .append_extension(ext_key_usage)
                .map_err(crypto_err("append extended key usage"))?;
        }

        if template.has_sans() {
            let mut san = SubjectAlternativeName::new();
            for name in &template.dns_names {
                san.dns(name);
            }
            for ip in &template.ip_addresses {
                san.ip(&ip.to_string());
            }
            let san = san
                .build(&builder.x509v3_context(signer.map(|s| &*s.cert), None))
                .map_err(crypto_err("build SAN"))?;
            builder.append_extension(san).map_err(crypto_err("append SAN"))?;
        }

        match mode {
            KeyIdMode::Standard => {
                if template.is_ca {
                    let ski = SubjectKeyIdentifier::new()
                        .build(&builder.x509v3_context(None, None))
                        .map_err(crypto_err("build subject key identifier"))?;
                    builder
                        .append_extension(ski)
                        .map_err(crypto_err("append subject key identifier"))?;
                }
                if let Some(signer) = signer {
                    let aki = AuthorityKeyIdentifier::new()
                        .keyid(false)
                        .build(&builder.x509v3_context(Some(&*signer.cert), None))
                        .map_err(crypto_err("build authority key identifier"))?;
                    builder
                        .append_extension(aki)
                        .map_err(crypto_err("append authority key identifier"))?;
                }
            }
            KeyIdMode::EtcdCa | KeyIdMode::EtcdClient => {
                let modulus = key.rsa().map_err(crypto_err("read RSA key"))?.n().to_vec();
                let subject_key_id = extensions::key_id(&modulus);

                let (authority_key_id, issuer_der, issuer_serial) = match signer {
                    Some(signer) => {
                        let authority_key_id = match mode {
                            KeyIdMode::EtcdClient => Some(extensions::key_id(&signer.modulus()?)),
                            _ => None,
                        };
                        (authority_key_id, signer.subject_der()?, signer.serial_bytes()?)
                    }
                    None => {
                        let issuer_der = subject.to_der().map_err(crypto_err("encode subject name"))?;
                        let issuer_serial = BigNum::from_slice(&template.serial.to_be_bytes())
                            .map_err(crypto_err("create serial"))?
                            .to_vec();
                        (None, issuer_der, issuer_serial)
                    }
                };

                let ski = extensions::raw_extension(
                    SUBJECT_KEY_IDENTIFIER_OID,
                    &extensions::subject_key_identifier_der(&subject_key_id),
                )?;
                builder
                    .append_extension(ski)
                    .map_err(crypto_err("append subject key identifier"))?;

                let aki = extensions::raw_extension(
                    AUTHORITY_KEY_IDENTIFIER_OID,
                    &extensions::authority_key_identifier_der(
                        authority_key_id.as_deref(),
                        &issuer_der,
                        &issuer_serial,
                    ),
                )?;
                builder
                    .append_extension(aki)
                    .map_err(crypto_err("append authority key identifier"))?;

                tracing::trace!(
                    subject_key_id = %hex::encode(&subject_key_id),
                    authority_key_id = ?authority_key_id.as_deref().map(hex::encode),
                    "attached raw key identifiers"
                );
            }
        }

        let signing_key = signer.map(|s| &s.key).unwrap_or(&key);
        builder
            .sign(signing_key, MessageDigest::sha256())
            .map_err(crypto_err("sign certificate"))?;

        let cert = builder.build();
        tracing::debug!(
            serial = template.serial,
            subject = %template.subject.common_name,
            ca = template.is_ca,
            "issued certificate"
        );

        Ok(CertAndKey::new(cert, key))
    }
}

fn build_name(subject: &Subject) -> Result<X509Name> {
    X509Name::from_der(&subject.to_der()).map_err(crypto_err("decode subject name"))
}
