//! Chain verification and credential validation.

use crate::inspect::CertificateInfo;
use crate::issuer::CertAndKey;
use crate::master::Config;
use certgen_types::{CaKind, CertgenError, LeafKind, Result};
use chrono::{DateTime, Utc};
use openssl::stack::Stack;
use openssl::x509::store::X509StoreBuilder;
use openssl::x509::{X509Ref, X509StoreContext};

/// Certificates expiring within this many days produce a warning.
pub const EXPIRY_WARNING_DAYS: i64 = 30;

/// Verify `cert` against a trust store holding only `ca`.
///
/// Fails with [`CertgenError::Validation`] naming the OpenSSL verify error
/// when the chain does not build.
pub fn verify_signed_by(cert: &X509Ref, ca: &X509Ref) -> Result<()> {
    let crypto = |e: openssl::error::ErrorStack| CertgenError::Crypto(format!("Failed to set up verification: {}", e));

    let mut builder = X509StoreBuilder::new().map_err(crypto)?;
    builder.add_cert(ca.to_owned()).map_err(crypto)?;
    let store = builder.build();

    let chain = Stack::new().map_err(crypto)?;
    let mut context = X509StoreContext::new().map_err(crypto)?;
    let (verified, error) = context
        .init(&store, cert, &chain, |ctx| {
            let verified = ctx.verify_cert()?;
            Ok((verified, ctx.error()))
        })
        .map_err(crypto)?;

    if verified {
        Ok(())
    } else {
        Err(CertgenError::Validation(format!(
            "certificate does not chain to the given CA: {}",
            error.error_string()
        )))
    }
}

/// Outcome of validating one credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// Valid
    Ok,
    /// Expected but not issued
    Missing,
    /// Usable with warnings
    Warning(Vec<String>),
    /// Not usable
    Error(Vec<String>),
}

/// Summary of validation results.
#[derive(Debug, Default)]
pub struct ValidationSummary {
    /// Credentials that are valid
    pub ok: Vec<String>,
    /// Credentials that are missing
    pub missing: Vec<String>,
    /// Credentials with warnings (path, warnings)
    pub warnings: Vec<(String, Vec<String>)>,
    /// Credentials with errors (path, errors)
    pub errors: Vec<(String, Vec<String>)>,
}

impl ValidationSummary {
    /// Record the result for `path`.
    pub fn record(&mut self, path: impl Into<String>, result: ValidationResult) {
        let path = path.into();
        match result {
            ValidationResult::Ok => self.ok.push(path),
            ValidationResult::Missing => self.missing.push(path),
            ValidationResult::Warning(warnings) => self.warnings.push((path, warnings)),
            ValidationResult::Error(errors) => self.errors.push((path, errors)),
        }
    }

    /// Check if all credentials are valid.
    pub fn is_all_valid(&self) -> bool {
        self.missing.is_empty() && self.errors.is_empty()
    }

    /// Get total count of credentials.
    pub fn total(&self) -> usize {
        self.ok.len() + self.missing.len() + self.warnings.len() + self.errors.len()
    }
}

fn check(cert: &CertAndKey, ca: &CertAndKey, self_signed: bool, now: DateTime<Utc>) -> Result<ValidationResult> {
    let info = CertificateInfo::from_x509(cert.cert())?;
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if self_signed && !info.is_self_issued() {
        errors.push(format!("issuer '{}' differs from subject '{}'", info.issuer, info.subject));
    }
    if self_signed && !info.is_ca {
        errors.push("CA flag is not set".to_string());
    }
    if let Err(e) = verify_signed_by(cert.cert(), ca.cert()) {
        errors.push(e.to_string());
    }
    if info.server_auth && !info.has_sans() {
        errors.push("server certificate has no subject alternative names".to_string());
    }

    let days = info.days_until_expiry(now);
    if days < 0 {
        errors.push("Certificate has expired".to_string());
    } else if days < EXPIRY_WARNING_DAYS {
        warnings.push(format!("Certificate expires in {} days", days));
    }

    Ok(if !errors.is_empty() {
        ValidationResult::Error(errors)
    } else if !warnings.is_empty() {
        ValidationResult::Warning(warnings)
    } else {
        ValidationResult::Ok
    })
}

impl Config {
    /// Validate every issued credential against the current time.
    pub fn validate(&self) -> Result<ValidationSummary> {
        self.validate_at(certgen_core::time::now())
    }

    /// Validate every issued credential as of `now`.
    ///
    /// CAs must be self-signed; each leaf must chain to its designated CA;
    /// server certificates must carry SANs. Anything that expires within
    /// [`EXPIRY_WARNING_DAYS`] is a warning.
    pub fn validate_at(&self, now: DateTime<Utc>) -> Result<ValidationSummary> {
        let mut summary = ValidationSummary::default();

        for kind in CaKind::ALL {
            let result = match self.cas().get(kind) {
                Ok(ca) => check(ca, ca, true, now)?,
                Err(_) => ValidationResult::Missing,
            };
            summary.record(kind.path(), result);
        }

        for kind in LeafKind::ALL {
            let result = match (self.master.cert(kind), self.cas().get(kind.signer())) {
                (Ok(cert), Ok(ca)) => check(cert, ca, false, now)?,
                (Ok(_), Err(e)) => ValidationResult::Error(vec![e.to_string()]),
                (Err(_), _) => ValidationResult::Missing,
            };
            summary.record(kind.path(), result);
        }

        for kind in certgen_types::EtcdKind::ALL {
            let result = match (self.master.etcd_cert(kind), self.cas().get(CaKind::Etcd)) {
                (Ok(cert), Ok(ca)) => check(cert, ca, false, now)?,
                (Ok(_), Err(e)) => ValidationResult::Error(vec![e.to_string()]),
                (Err(_), _) => ValidationResult::Missing,
            };
            summary.record(kind.path(), result);
        }

        tracing::info!(
            ok = summary.ok.len(),
            missing = summary.missing.len(),
            warnings = summary.warnings.len(),
            errors = summary.errors.len(),
            "validated credentials"
        );
        Ok(summary)
    }
}
