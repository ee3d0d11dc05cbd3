//! # Certgen Types
//!
//! Core types, traits, and enums shared across all certgen crates.
//!
//! This crate provides:
//!
//! - The typed credential registry: CA, leaf, etcd and kubeconfig kinds with
//!   their logical paths and signer relationships
//! - Endpoint identifiers used to name kubeconfig clusters
//! - The `Filesystem` trait the persistence layer writes through
//! - Error types and result aliases
//!
//! ## Example
//!
//! ```
//! use certgen_types::{CaKind, LeafKind, Endpoint};
//!
//! assert_eq!(LeafKind::MasterEtcdClient.signer(), CaKind::Etcd);
//! assert_eq!(CaKind::Etcd.path(), "etc/origin/master/master.etcd-ca");
//!
//! let ep = Endpoint::localhost(8443);
//! assert_eq!(ep.server_url(), "https://localhost:8443");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod errors;
pub mod identifiers;
pub mod enums;
pub mod traits;
pub mod config;

// Re-export common types for convenience
pub use errors::{CertgenError, Result};
pub use identifiers::Endpoint;
pub use enums::{CaKind, EtcdKind, ExtKeyUsage, FileKind, KubeConfigKind, LeafKind, LogLevel};
pub use traits::Filesystem;
