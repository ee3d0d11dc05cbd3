//! # Certgen PKI
//!
//! TLS credential generation for an OpenShift-style master and its nodes.
//!
//! Provides:
//! - Six independent self-signed CAs
//! - Master leaf certificates signed by their designated CA
//! - etcd peer/server certificates with etcd-compatible key identifiers
//! - Admin, front proxy, master and node bootstrap kubeconfigs
//! - Session secrets and the service account keypair
//! - Writing everything through a [`certgen_types::Filesystem`]
//!
//! ## Example
//!
//! ```no_run
//! use certgen_core::MemoryFilesystem;
//! use certgen_pki::{Config, Master};
//!
//! let master = Master::new("master-0", vec!["10.0.0.5".parse().unwrap()], 8443)?;
//! let mut config = Config::new("master.example.com", master)?;
//! config.prepare_all()?;
//!
//! let mut fs = MemoryFilesystem::new();
//! config.write_master(&mut fs)?;
//! # Ok::<(), certgen_types::CertgenError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod authority;
pub mod etcd;
pub mod extensions;
pub mod inspect;
pub mod issuer;
pub mod kubeconfig;
pub mod master;
pub mod persist;
pub mod plan;
pub mod serial;
pub mod template;
pub mod verify;

pub use authority::CertificateAuthoritySet;
pub use etcd::EtcdCertificateIssuer;
pub use inspect::CertificateInfo;
pub use issuer::{CertAndKey, KeyIdMode, LeafCertificateIssuer};
pub use kubeconfig::{KubeConfig, KubeConfigBuilder};
pub use master::{Config, Master};
pub use persist::{FileRenderer, NoRenderedFiles};
pub use plan::{BuildPlan, Step};
pub use serial::SerialAllocator;
pub use template::{CertTemplate, Subject};
pub use verify::{verify_signed_by, ValidationResult, ValidationSummary};

use certgen_types::CertgenError;

/// Map a crypto library error to [`CertgenError::Crypto`] with context.
pub(crate) fn crypto_err<E: std::fmt::Display>(context: &'static str) -> impl FnOnce(E) -> CertgenError {
    move |e| CertgenError::Crypto(format!("Failed to {}: {}", context, e))
}
