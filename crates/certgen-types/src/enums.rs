//! Common enumerations used throughout certgen.
//!
//! The credential kinds below form the typed registry for one bootstrap run:
//! every CA, leaf and kubeconfig is named by a variant rather than by a
//! string path, so a lookup can only fail when the credential was never
//! built.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use crate::errors::{CertgenError, Result};

/// Log level enumeration for the logging system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    /// No logging
    None,
    /// Error messages only
    Error,
    /// Warnings and errors
    Warn,
    /// Informational messages
    Info,
    /// Debug messages
    Debug,
    /// Detailed trace messages
    Trace,
}

impl LogLevel {
    /// The equivalent `tracing` filter directive.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::None => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl FromStr for LogLevel {
    type Err = CertgenError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "NONE" => Ok(LogLevel::None),
            "ERROR" => Ok(LogLevel::Error),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "INFO" => Ok(LogLevel::Info),
            "DEBUG" => Ok(LogLevel::Debug),
            "TRACE" => Ok(LogLevel::Trace),
            _ => Err(CertgenError::Validation(format!("Invalid log level: {}", s))),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::None => write!(f, "NONE"),
            LogLevel::Error => write!(f, "ERROR"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Trace => write!(f, "TRACE"),
        }
    }
}

/// Root certificate authorities, one per trust domain.
///
/// `FrontProxy` and `Frontproxy` are two distinct CAs with near-identical
/// names; they sign different leaves and are never merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CaKind {
    /// Master CA, signs most master identities
    Master,
    /// `front-proxy-ca`, signs the aggregator front proxy client
    FrontProxy,
    /// `frontproxy-ca`, signs the openshift aggregator client
    Frontproxy,
    /// etcd trust domain root
    Etcd,
    /// Service serving-cert signer
    ServiceSigner,
    /// Service catalog root
    ServiceCatalog,
}

impl CaKind {
    /// All CAs in build order.
    pub const ALL: [CaKind; 6] = [
        CaKind::Master,
        CaKind::FrontProxy,
        CaKind::Frontproxy,
        CaKind::Etcd,
        CaKind::ServiceSigner,
        CaKind::ServiceCatalog,
    ];

    /// Logical path (without extension) of the CA's cert/key pair.
    pub fn path(&self) -> &'static str {
        match self {
            CaKind::Master => "etc/origin/master/ca",
            CaKind::FrontProxy => "etc/origin/master/front-proxy-ca",
            CaKind::Frontproxy => "etc/origin/master/frontproxy-ca",
            CaKind::Etcd => "etc/origin/master/master.etcd-ca",
            CaKind::ServiceSigner => "etc/origin/master/service-signer",
            CaKind::ServiceCatalog => "etc/origin/service-catalog/ca",
        }
    }

    /// Short name, accepted by `FromStr` alongside the path.
    pub fn short_name(&self) -> &'static str {
        match self {
            CaKind::Master => "master",
            CaKind::FrontProxy => "front-proxy",
            CaKind::Frontproxy => "frontproxy",
            CaKind::Etcd => "etcd",
            CaKind::ServiceSigner => "service-signer",
            CaKind::ServiceCatalog => "service-catalog",
        }
    }
}

impl FromStr for CaKind {
    type Err = CertgenError;

    /// Unknown names map to `UnknownSigner`, never to a default CA.
    fn from_str(s: &str) -> Result<Self> {
        CaKind::ALL
            .iter()
            .copied()
            .find(|ca| ca.path() == s || ca.short_name() == s)
            .ok_or_else(|| CertgenError::UnknownSigner(s.to_string()))
    }
}

impl fmt::Display for CaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Master-scoped leaf identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LeafKind {
    /// Cluster admin client
    Admin,
    /// Aggregator front proxy client
    AggregatorFrontProxy,
    /// etcd serving cert on the master
    EtcdServer,
    /// Master's client cert towards etcd
    MasterEtcdClient,
    /// Master's client cert towards kubelets
    MasterKubeletClient,
    /// Master proxy client
    MasterProxyClient,
    /// API server serving cert
    MasterServer,
    /// OpenShift aggregator client
    OpenshiftAggregator,
    /// OpenShift master client
    OpenshiftMaster,
    /// Node bootstrapper service account client
    NodeBootstrapper,
    /// Service catalog API server serving cert
    ServiceCatalogApiserver,
}

impl LeafKind {
    /// All master leaves in build order.
    pub const ALL: [LeafKind; 11] = [
        LeafKind::Admin,
        LeafKind::AggregatorFrontProxy,
        LeafKind::EtcdServer,
        LeafKind::MasterEtcdClient,
        LeafKind::MasterKubeletClient,
        LeafKind::MasterProxyClient,
        LeafKind::MasterServer,
        LeafKind::OpenshiftAggregator,
        LeafKind::OpenshiftMaster,
        LeafKind::NodeBootstrapper,
        LeafKind::ServiceCatalogApiserver,
    ];

    /// Logical path (without extension) of the leaf's cert/key pair.
    pub fn path(&self) -> &'static str {
        match self {
            LeafKind::Admin => "etc/origin/master/admin",
            LeafKind::AggregatorFrontProxy => "etc/origin/master/aggregator-front-proxy",
            LeafKind::EtcdServer => "etc/origin/master/etcd.server",
            LeafKind::MasterEtcdClient => "etc/origin/master/master.etcd-client",
            LeafKind::MasterKubeletClient => "etc/origin/master/master.kubelet-client",
            LeafKind::MasterProxyClient => "etc/origin/master/master.proxy-client",
            LeafKind::MasterServer => "etc/origin/master/master.server",
            LeafKind::OpenshiftAggregator => "etc/origin/master/openshift-aggregator",
            LeafKind::OpenshiftMaster => "etc/origin/master/openshift-master",
            LeafKind::NodeBootstrapper => "etc/origin/master/node-bootstrapper",
            LeafKind::ServiceCatalogApiserver => "etc/origin/service-catalog/apiserver",
        }
    }

    /// The CA that signs this leaf.
    pub fn signer(&self) -> CaKind {
        match self {
            LeafKind::AggregatorFrontProxy => CaKind::FrontProxy,
            LeafKind::MasterEtcdClient => CaKind::Etcd,
            LeafKind::OpenshiftAggregator => CaKind::Frontproxy,
            LeafKind::ServiceCatalogApiserver => CaKind::ServiceCatalog,
            _ => CaKind::Master,
        }
    }
}

impl fmt::Display for LeafKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// etcd-scoped leaves, always signed by [`CaKind::Etcd`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EtcdKind {
    /// Peer cert, client and server auth
    Peer,
    /// Server cert
    Server,
}

impl EtcdKind {
    /// Both etcd certs in build order.
    pub const ALL: [EtcdKind; 2] = [EtcdKind::Peer, EtcdKind::Server];

    /// Logical path (without extension).
    pub fn path(&self) -> &'static str {
        match self {
            EtcdKind::Peer => "etc/etcd/peer",
            EtcdKind::Server => "etc/etcd/server",
        }
    }
}

impl fmt::Display for EtcdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Kubeconfig documents produced for a master node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KubeConfigKind {
    /// Admin, external endpoint
    Admin,
    /// Aggregator front proxy, localhost endpoint
    AggregatorFrontProxy,
    /// OpenShift master, internal endpoint
    OpenshiftMaster,
    /// Node bootstrap, external endpoint
    NodeBootstrap,
}

impl KubeConfigKind {
    /// Kubeconfigs kept on the master.
    pub const MASTER: [KubeConfigKind; 3] = [
        KubeConfigKind::Admin,
        KubeConfigKind::AggregatorFrontProxy,
        KubeConfigKind::OpenshiftMaster,
    ];

    /// Output path of the document.
    pub fn path(&self) -> &'static str {
        match self {
            KubeConfigKind::Admin => "etc/origin/master/admin.kubeconfig",
            KubeConfigKind::AggregatorFrontProxy => "etc/origin/master/aggregator-front-proxy.kubeconfig",
            KubeConfigKind::OpenshiftMaster => "etc/origin/master/openshift-master.kubeconfig",
            KubeConfigKind::NodeBootstrap => "etc/origin/node/bootstrap.kubeconfig",
        }
    }

    /// User identity the document authenticates as.
    pub fn identity(&self) -> &'static str {
        match self {
            KubeConfigKind::Admin => "system:admin",
            KubeConfigKind::AggregatorFrontProxy => "aggregator-front-proxy",
            KubeConfigKind::OpenshiftMaster => "system:openshift-master",
            KubeConfigKind::NodeBootstrap => "system:serviceaccount:openshift-infra:node-bootstrapper",
        }
    }

    /// Leaf whose cert/key is embedded as the client credential.
    pub fn client(&self) -> LeafKind {
        match self {
            KubeConfigKind::Admin => LeafKind::Admin,
            KubeConfigKind::AggregatorFrontProxy => LeafKind::AggregatorFrontProxy,
            KubeConfigKind::OpenshiftMaster => LeafKind::OpenshiftMaster,
            KubeConfigKind::NodeBootstrap => LeafKind::NodeBootstrapper,
        }
    }
}

impl fmt::Display for KubeConfigKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Extended key usage purposes used by cluster identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtKeyUsage {
    /// TLS web server authentication
    ServerAuth,
    /// TLS web client authentication
    ClientAuth,
}

/// Kind of file written by the persistence layer; decides the mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// PEM certificate or CA bundle
    Certificate,
    /// PEM private key
    PrivateKey,
    /// PEM public key
    PublicKey,
    /// Kubeconfig document (embeds a private key)
    KubeConfig,
    /// Any other rendered configuration file
    Rendered,
}

impl FileKind {
    /// Permission bits for this kind of file.
    ///
    /// Anything holding private key material is `0600`; everything else is
    /// `0644`.
    pub fn mode(&self) -> u32 {
        match self {
            FileKind::PrivateKey | FileKind::KubeConfig => 0o600,
            FileKind::Certificate | FileKind::PublicKey | FileKind::Rendered => 0o644,
        }
    }

    /// Classify a rendered file by its name.
    pub fn for_path(path: &str) -> Self {
        if path.ends_with(".key") {
            FileKind::PrivateKey
        } else if path.ends_with(".kubeconfig") {
            FileKind::KubeConfig
        } else if path.ends_with(".crt") {
            FileKind::Certificate
        } else {
            FileKind::Rendered
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ca_kind_from_path_and_short_name() {
        assert_eq!("etc/origin/master/ca".parse::<CaKind>().unwrap(), CaKind::Master);
        assert_eq!("frontproxy".parse::<CaKind>().unwrap(), CaKind::Frontproxy);
        assert_eq!("front-proxy".parse::<CaKind>().unwrap(), CaKind::FrontProxy);
        assert_eq!(
            "etc/origin/service-catalog/ca".parse::<CaKind>().unwrap(),
            CaKind::ServiceCatalog
        );
    }

    #[test]
    fn test_ca_kind_unknown_is_unknown_signer() {
        let err = "etc/origin/master/registry-ca".parse::<CaKind>().unwrap_err();
        assert!(matches!(err, CertgenError::UnknownSigner(ref name) if name == "etc/origin/master/registry-ca"));
    }

    #[test]
    fn test_front_proxy_cas_are_distinct() {
        assert_ne!(CaKind::FrontProxy.path(), CaKind::Frontproxy.path());
        assert_eq!(LeafKind::AggregatorFrontProxy.signer(), CaKind::FrontProxy);
        assert_eq!(LeafKind::OpenshiftAggregator.signer(), CaKind::Frontproxy);
    }

    #[test]
    fn test_leaf_signers() {
        assert_eq!(LeafKind::Admin.signer(), CaKind::Master);
        assert_eq!(LeafKind::EtcdServer.signer(), CaKind::Master);
        assert_eq!(LeafKind::MasterEtcdClient.signer(), CaKind::Etcd);
        assert_eq!(LeafKind::ServiceCatalogApiserver.signer(), CaKind::ServiceCatalog);
    }

    #[test]
    fn test_paths_are_unique() {
        let mut paths: Vec<&str> = CaKind::ALL.iter().map(|k| k.path()).collect();
        paths.extend(LeafKind::ALL.iter().map(|k| k.path()));
        paths.extend(EtcdKind::ALL.iter().map(|k| k.path()));
        let total = paths.len();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), total);
    }

    #[test]
    fn test_file_modes() {
        assert_eq!(FileKind::PrivateKey.mode(), 0o600);
        assert_eq!(FileKind::KubeConfig.mode(), 0o600);
        assert_eq!(FileKind::Certificate.mode(), 0o644);
        assert_eq!(FileKind::for_path("etc/origin/master/htpasswd.key"), FileKind::PrivateKey);
        assert_eq!(FileKind::for_path("etc/origin/node/node-config.yaml"), FileKind::Rendered);
    }

    #[test]
    fn test_log_level_parse() {
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!(LogLevel::Debug.as_filter(), "debug");
        assert!("loud".parse::<LogLevel>().is_err());
    }
}
