//! Master credential orchestration.

use crate::authority::{self, CertificateAuthoritySet};
use crate::etcd::EtcdCertificateIssuer;
use crate::issuer::{generate_key, CertAndKey, KeyIdMode, LeafCertificateIssuer};
use crate::kubeconfig::{KubeConfig, KubeConfigBuilder};
use crate::plan::{BuildPlan, Step};
use crate::serial::SerialAllocator;
use crate::template::{CertTemplate, DEFAULT_KEY_BITS, LEAF_VALIDITY_YEARS};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use certgen_core::Settings;
use certgen_types::{
    CaKind, CertgenError, Endpoint, EtcdKind, ExtKeyUsage, KubeConfigKind, LeafKind, Result,
};
use chrono::{DateTime, Utc};
use openssl::pkey::{PKey, Private};
use rand::RngCore;
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};

/// Cluster IP of the `kubernetes` service, added to every master IP set.
pub const SERVICE_IP: IpAddr = IpAddr::V4(Ipv4Addr::new(172, 30, 0, 1));

/// Bytes of entropy in each master secret.
pub const SECRET_BYTES: usize = 24;

const SERVICE_CATALOG_NAMES: [&str; 3] = [
    "apiserver.kube-service-catalog",
    "apiserver.kube-service-catalog.svc",
    "apiserver.kube-service-catalog.svc.cluster.local",
];

/// A master node and the credentials issued for it.
#[derive(Debug, Clone)]
pub struct Master {
    /// Internal hostname
    pub hostname: String,
    /// Master IPs; the first one names the master in server certificates
    pub ips: Vec<IpAddr>,
    /// API server port
    pub port: u16,
    certs: BTreeMap<LeafKind, CertAndKey>,
    etcd_certs: BTreeMap<EtcdKind, CertAndKey>,
    kubeconfigs: BTreeMap<KubeConfigKind, KubeConfig>,
}

impl Master {
    /// Describe a master. At least one IP is required.
    pub fn new(hostname: impl Into<String>, ips: Vec<IpAddr>, port: u16) -> Result<Self> {
        let hostname = hostname.into();
        if !Endpoint::is_valid_host(&hostname) {
            certgen_types::bail!(Config, "invalid master hostname '{}'", hostname);
        }
        if ips.is_empty() {
            certgen_types::bail!(Config, "master '{}' has no IP addresses", hostname);
        }
        Ok(Self {
            hostname,
            ips,
            port,
            certs: BTreeMap::new(),
            etcd_certs: BTreeMap::new(),
            kubeconfigs: BTreeMap::new(),
        })
    }

    /// The first master IP.
    pub fn first_ip(&self) -> Result<IpAddr> {
        self.ips
            .first()
            .copied()
            .ok_or_else(|| CertgenError::Config(format!("master '{}' has no IP addresses", self.hostname)))
    }

    /// An issued master leaf.
    pub fn cert(&self, kind: LeafKind) -> Result<&CertAndKey> {
        self.certs
            .get(&kind)
            .ok_or_else(|| CertgenError::MissingCredential(kind.path().to_string()))
    }

    /// An issued etcd certificate.
    pub fn etcd_cert(&self, kind: EtcdKind) -> Result<&CertAndKey> {
        self.etcd_certs
            .get(&kind)
            .ok_or_else(|| CertgenError::MissingCredential(kind.path().to_string()))
    }

    /// An assembled master kubeconfig.
    pub fn kubeconfig(&self, kind: KubeConfigKind) -> Result<&KubeConfig> {
        self.kubeconfigs
            .get(&kind)
            .ok_or_else(|| CertgenError::MissingCredential(kind.path().to_string()))
    }

    /// Issued master leaves in [`LeafKind`] order.
    pub fn certs(&self) -> impl Iterator<Item = (LeafKind, &CertAndKey)> {
        self.certs.iter().map(|(kind, cert)| (*kind, cert))
    }

    /// Issued etcd certificates in [`EtcdKind`] order.
    pub fn etcd_certs(&self) -> impl Iterator<Item = (EtcdKind, &CertAndKey)> {
        self.etcd_certs.iter().map(|(kind, cert)| (*kind, cert))
    }

    /// Assembled master kubeconfigs in [`KubeConfigKind`] order.
    pub fn kubeconfigs(&self) -> impl Iterator<Item = (KubeConfigKind, &KubeConfig)> {
        self.kubeconfigs.iter().map(|(kind, config)| (*kind, config))
    }
}

/// Everything produced for one bootstrap run.
///
/// Created once, filled in by the `prepare_*` operations, then written out
/// with [`Config::write_master`].
#[derive(Debug)]
pub struct Config {
    /// Hostname clients outside the cluster use
    pub external_master_hostname: String,
    /// The master node
    pub master: Master,
    cas: CertificateAuthoritySet,
    serial: SerialAllocator,
    now: DateTime<Utc>,
    auth_secret: String,
    enc_secret: String,
    bootstrap: Option<KubeConfig>,
    service_account_key: Option<PKey<Private>>,
}

impl Config {
    /// Start a run for `master`, stamped with the current time.
    pub fn new(external_master_hostname: impl Into<String>, master: Master) -> Result<Self> {
        let external_master_hostname = external_master_hostname.into();
        if !Endpoint::is_valid_host(&external_master_hostname) {
            certgen_types::bail!(
                Config,
                "invalid external master hostname '{}'",
                external_master_hostname
            );
        }
        Ok(Self {
            external_master_hostname,
            master,
            cas: CertificateAuthoritySet::new(),
            serial: SerialAllocator::new(),
            now: certgen_core::time::now(),
            auth_secret: String::new(),
            enc_secret: String::new(),
            bootstrap: None,
            service_account_key: None,
        })
    }

    /// Start a run from loaded settings.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        settings.validate()?;
        let master = Master::new(
            settings.master.hostname.clone(),
            settings.master_ips(),
            settings.master.port,
        )?;
        Self::new(settings.external_master_hostname.clone(), master)
    }

    /// Use `now` as the generation time for every certificate.
    pub fn with_time(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Generation time shared by every certificate in the run.
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// The certificate authorities built so far.
    pub fn cas(&self) -> &CertificateAuthoritySet {
        &self.cas
    }

    /// The shared serial allocator.
    pub fn serial(&self) -> &SerialAllocator {
        &self.serial
    }

    /// Base64 session authentication secret, empty until prepared.
    pub fn auth_secret(&self) -> &str {
        &self.auth_secret
    }

    /// Base64 session encryption secret, empty until prepared.
    pub fn enc_secret(&self) -> &str {
        &self.enc_secret
    }

    /// The node bootstrap kubeconfig.
    pub fn bootstrap(&self) -> Result<&KubeConfig> {
        self.bootstrap.as_ref().ok_or_else(|| {
            CertgenError::MissingCredential(KubeConfigKind::NodeBootstrap.path().to_string())
        })
    }

    /// The service account signing key.
    pub fn service_account_key(&self) -> Result<&PKey<Private>> {
        self.service_account_key
            .as_ref()
            .ok_or_else(|| CertgenError::MissingCredential(Step::ServiceAccountKey.to_string()))
    }

    /// Master IPs followed by the service IP.
    pub fn master_ip_set(&self) -> Vec<IpAddr> {
        let mut ips = self.master.ips.clone();
        ips.push(SERVICE_IP);
        ips
    }

    /// DNS names carried by the master server certificates.
    pub fn master_dns_names(&self) -> Vec<String> {
        let mut names = vec![
            self.external_master_hostname.clone(),
            "kubernetes".to_string(),
            "kubernetes.default".to_string(),
            "kubernetes.default.svc".to_string(),
            "kubernetes.default.svc.cluster.local".to_string(),
            self.master.hostname.clone(),
            "openshift".to_string(),
            "openshift.default".to_string(),
            "openshift.default.svc".to_string(),
            "openshift.default.svc.cluster.local".to_string(),
        ];
        names.extend(self.master_ip_set().iter().map(IpAddr::to_string));
        names
    }

    /// Template for one master leaf.
    pub fn leaf_template(&self, kind: LeafKind, serial: u64) -> Result<CertTemplate> {
        let leaf = |cn: &str| CertTemplate::leaf(cn, serial, self.now, LEAF_VALIDITY_YEARS);
        let client = [ExtKeyUsage::ClientAuth];
        let server = [ExtKeyUsage::ServerAuth];

        let template = match kind {
            LeafKind::Admin => leaf("system:admin")?
                .organizations(["system:cluster-admins", "system:masters"])
                .ext_key_usage(client),
            LeafKind::AggregatorFrontProxy => leaf("aggregator-front-proxy")?.ext_key_usage(client),
            LeafKind::EtcdServer | LeafKind::MasterServer => {
                leaf(&self.master.first_ip()?.to_string())?
                    .ext_key_usage(server)
                    .dns_names(self.master_dns_names())
                    .ip_addresses(self.master_ip_set())
            }
            LeafKind::MasterEtcdClient => leaf(&self.master.hostname)?
                .ext_key_usage(client)
                .dns_names([self.master.hostname.as_str()])
                .ip_addresses([self.master.first_ip()?]),
            LeafKind::MasterKubeletClient => leaf("system:openshift-node-admin")?
                .organizations(["system:node-admins"])
                .ext_key_usage(client),
            LeafKind::MasterProxyClient => leaf("system:master-proxy")?.ext_key_usage(client),
            LeafKind::OpenshiftAggregator => leaf("system:openshift-aggregator")?.ext_key_usage(client),
            LeafKind::OpenshiftMaster => leaf("system:openshift-master")?
                .organizations(["system:masters", "system:openshift-master"])
                .ext_key_usage(client),
            LeafKind::NodeBootstrapper => {
                leaf("system:serviceaccount:openshift-infra:node-bootstrapper")?.ext_key_usage(client)
            }
            LeafKind::ServiceCatalogApiserver => leaf("apiserver.kube-service-catalog")?
                .ext_key_usage(server)
                .dns_names(SERVICE_CATALOG_NAMES),
        };
        Ok(template)
    }

    /// Endpoint a kubeconfig points at.
    pub fn endpoint(&self, kind: KubeConfigKind) -> Result<Endpoint> {
        match kind {
            KubeConfigKind::Admin | KubeConfigKind::NodeBootstrap => {
                Endpoint::new(&self.external_master_hostname, self.master.port)
            }
            KubeConfigKind::AggregatorFrontProxy => Ok(Endpoint::localhost(self.master.port)),
            KubeConfigKind::OpenshiftMaster => Endpoint::new(&self.master.hostname, self.master.port),
        }
    }

    /// Run one step, storing what it produces.
    pub fn execute(&mut self, step: Step) -> Result<()> {
        match step {
            Step::Ca(kind) => {
                let ca = authority::issue_ca(kind, &self.serial, self.now)?;
                self.cas.insert(kind, ca);
            }
            Step::Leaf(kind) => {
                let signer = self.cas.get(kind.signer())?;
                let mode = match kind {
                    LeafKind::MasterEtcdClient => KeyIdMode::EtcdClient,
                    _ => KeyIdMode::Standard,
                };
                let template = self.leaf_template(kind, self.serial.get())?;
                let cert = LeafCertificateIssuer.issue(&template, Some(signer), mode)?;
                tracing::debug!(
                    cert = %kind,
                    signer = %kind.signer(),
                    serial = template.serial,
                    "issued master certificate"
                );
                self.master.certs.insert(kind, cert);
            }
            Step::Etcd(kind) => {
                let issuer = EtcdCertificateIssuer::new(&self.master.hostname, self.master.first_ip()?);
                let cert = issuer.issue(kind, &self.cas, &self.serial, self.now)?;
                self.master.etcd_certs.insert(kind, cert);
            }
            Step::KubeConfig(kind) => {
                let config = KubeConfigBuilder.build(
                    &self.endpoint(kind)?,
                    kind.identity(),
                    self.cas.get(CaKind::Master)?,
                    self.master.cert(kind.client())?,
                )?;
                tracing::debug!(kubeconfig = %kind, context = %config.current_context, "assembled kubeconfig");
                match kind {
                    KubeConfigKind::NodeBootstrap => self.bootstrap = Some(config),
                    _ => {
                        self.master.kubeconfigs.insert(kind, config);
                    }
                }
            }
            Step::MasterSecrets => {
                self.auth_secret = random_secret();
                self.enc_secret = random_secret();
                tracing::debug!("generated master secrets");
            }
            Step::ServiceAccountKey => {
                self.service_account_key = Some(generate_key(DEFAULT_KEY_BITS)?);
                tracing::debug!("generated service account keypair");
            }
        }
        Ok(())
    }

    /// Sort `plan` by dependencies and run every step.
    pub fn execute_plan(&mut self, mut plan: BuildPlan) -> Result<()> {
        plan.sort_by_dependencies()?;
        for step in plan.steps() {
            self.execute(*step)?;
        }
        Ok(())
    }

    /// Create every CA, master leaf and etcd certificate.
    pub fn prepare_master_certs(&mut self) -> Result<()> {
        tracing::info!(master = %self.master.hostname, "preparing master certificates");
        self.execute_plan(BuildPlan::certificates())?;
        tracing::info!(
            cas = self.cas.len(),
            certs = self.master.certs.len(),
            etcd = self.master.etcd_certs.len(),
            last_serial = self.serial.last(),
            "prepared master certificates"
        );
        Ok(())
    }

    /// Assemble the admin, aggregator-front-proxy and openshift-master
    /// kubeconfigs. Requires [`Config::prepare_master_certs`].
    pub fn prepare_master_kubeconfigs(&mut self) -> Result<()> {
        tracing::info!("preparing master kubeconfigs");
        for kind in KubeConfigKind::MASTER {
            self.execute(Step::KubeConfig(kind))?;
        }
        Ok(())
    }

    /// Generate the master secrets and the service account keypair.
    pub fn prepare_master_files(&mut self) -> Result<()> {
        tracing::info!("preparing master secrets");
        self.execute(Step::MasterSecrets)?;
        self.execute(Step::ServiceAccountKey)
    }

    /// Assemble the node bootstrap kubeconfig. Requires
    /// [`Config::prepare_master_certs`].
    pub fn prepare_bootstrap_kubeconfig(&mut self) -> Result<()> {
        tracing::info!("preparing node bootstrap kubeconfig");
        self.execute(Step::KubeConfig(KubeConfigKind::NodeBootstrap))
    }

    /// Run the full master plan.
    pub fn prepare_all(&mut self) -> Result<()> {
        let (result, elapsed) = certgen_core::time::measure(|| self.execute_plan(BuildPlan::master()));
        result?;
        tracing::info!(
            master = %self.master.hostname,
            elapsed = %certgen_core::time::pretty_duration(elapsed),
            "prepared master credentials"
        );
        Ok(())
    }
}

fn random_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    STANDARD.encode(bytes)
}
