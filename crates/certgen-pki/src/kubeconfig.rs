//! Kubeconfig documents.

use crate::issuer::CertAndKey;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use certgen_types::{Endpoint, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Namespace every generated context points at.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Minimal kubeconfig: one cluster, one context, one user.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct KubeConfig {
    /// Always `v1`
    #[serde(rename = "apiVersion", default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    /// Always `Config`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    /// Clusters
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clusters: Vec<Cluster>,
    /// Contexts
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contexts: Vec<Context>,
    /// Context selected by default
    #[serde(rename = "current-context", default, skip_serializing_if = "String::is_empty")]
    pub current_context: String,
    /// Client preferences
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub preferences: BTreeMap<String, serde_yaml::Value>,
    /// Users
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<User>,
}

/// Named cluster entry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Cluster {
    /// Cluster name
    pub name: String,
    /// Cluster details
    pub cluster: ClusterInfo,
}

/// API server location and trust root.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClusterInfo {
    /// API server URL
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub server: String,
    /// Base64 of the CA certificate PEM
    #[serde(
        rename = "certificate-authority-data",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub certificate_authority_data: String,
}

/// Named context entry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Context {
    /// Context name
    pub name: String,
    /// Context details
    pub context: ContextInfo,
}

/// Binds a cluster, namespace and user.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContextInfo {
    /// Cluster name
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cluster: String,
    /// Namespace
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    /// User name
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user: String,
}

/// Named user entry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct User {
    /// User name
    pub name: String,
    /// Credentials
    pub user: UserInfo,
}

/// Client certificate credentials.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserInfo {
    /// Base64 of the client certificate PEM
    #[serde(
        rename = "client-certificate-data",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub client_certificate_data: String,
    /// Base64 of the client key PEM
    #[serde(rename = "client-key-data", default, skip_serializing_if = "String::is_empty")]
    pub client_key_data: String,
}

impl KubeConfig {
    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Parse from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// The cluster named by the current context, if any.
    pub fn current_cluster(&self) -> Option<&ClusterInfo> {
        let context = self.contexts.iter().find(|c| c.name == self.current_context)?;
        self.clusters
            .iter()
            .find(|c| c.name == context.context.cluster)
            .map(|c| &c.cluster)
    }

    /// The user named by the current context, if any.
    pub fn current_user(&self) -> Option<&UserInfo> {
        let context = self.contexts.iter().find(|c| c.name == self.current_context)?;
        self.users
            .iter()
            .find(|u| u.name == context.context.user)
            .map(|u| &u.user)
    }
}

/// Builds single-identity kubeconfigs.
#[derive(Debug, Clone, Copy, Default)]
pub struct KubeConfigBuilder;

impl KubeConfigBuilder {
    /// Kubeconfig for `identity` talking to `endpoint`, trusting `ca` and
    /// authenticating with `client`.
    ///
    /// The cluster is named after the endpoint with dots replaced by dashes,
    /// the user `<identity>/<cluster>`, and the context
    /// `default/<cluster>/<identity>`.
    pub fn build(
        &self,
        endpoint: &Endpoint,
        identity: &str,
        ca: &CertAndKey,
        client: &CertAndKey,
    ) -> Result<KubeConfig> {
        let cluster_name = endpoint.name();
        let user_name = format!("{}/{}", identity, cluster_name);
        let context_name = format!("{}/{}/{}", DEFAULT_NAMESPACE, cluster_name, identity);

        Ok(KubeConfig {
            api_version: "v1".to_string(),
            kind: "Config".to_string(),
            clusters: vec![Cluster {
                name: cluster_name.clone(),
                cluster: ClusterInfo {
                    server: endpoint.server_url(),
                    certificate_authority_data: STANDARD.encode(ca.cert_pem()?),
                },
            }],
            contexts: vec![Context {
                name: context_name.clone(),
                context: ContextInfo {
                    cluster: cluster_name,
                    namespace: DEFAULT_NAMESPACE.to_string(),
                    user: user_name.clone(),
                },
            }],
            current_context: context_name,
            preferences: BTreeMap::new(),
            users: vec![User {
                name: user_name,
                user: UserInfo {
                    client_certificate_data: STANDARD.encode(client.cert_pem()?),
                    client_key_data: STANDARD.encode(client.key_pem()?),
                },
            }],
        })
    }
}
