use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Port the control plane's API server listens on inside the cluster.
pub const DEFAULT_NODE_PORT: u16 = 8443;

/// Profile configuration persisted at `<home>/profiles/<cluster>/config.json`.
///
/// Field names follow the PascalCase layout of existing profile files so
/// older profiles keep loading.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ClusterConfig {
    pub machine_config: MachineConfig,
    pub kubernetes_config: KubernetesConfig,
    pub nodes: Vec<NodeConfig>,
}

/// Desired shape of a machine. Immutable template: per-machine copies are
/// produced with [`MachineConfig::for_machine`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MachineConfig {
    pub machine_name: String,
    /// Driver name (`none`, `multipass`, `docker`, ...).
    #[serde(alias = "VMDriver")]
    pub driver: String,
    #[serde(rename = "CPUs")]
    pub cpus: u32,
    /// Memory in MB.
    pub memory: u32,
    /// Disk size in MB.
    pub disk_size: u32,
    /// Base image for drivers that need one (multipass release, container image).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub docker_env: Vec<String>,
    pub insecure_registry: Vec<String>,
    pub registry_mirror: Vec<String>,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            machine_name: String::new(),
            driver: "multipass".to_string(),
            cpus: 2,
            memory: 2048,
            disk_size: 20000,
            image: None,
            docker_env: Vec::new(),
            insecure_registry: Vec::new(),
            registry_mirror: Vec::new(),
        }
    }
}

impl MachineConfig {
    /// Copy of this template bound to `machine_name`.
    #[must_use]
    pub fn for_machine(&self, machine_name: &str) -> Self {
        Self {
            machine_name: machine_name.to_string(),
            ..self.clone()
        }
    }
}

/// Logical cluster node. Carries only the node name; the backing machine
/// name is always derived from the cluster name, never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NodeConfig {
    pub name: String,
}

/// Kubernetes settings shared by every node of a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct KubernetesConfig {
    pub kubernetes_version: String,
    /// Control plane address the workers join.
    #[serde(rename = "NodeIP")]
    pub node_ip: String,
    pub node_port: u16,
    pub api_server_name: String,
    pub dns_domain: String,
    /// Bootstrap token used by `kubeadm join`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_token: Option<String>,
    /// `sha256:<hex>` pin of the cluster CA public key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discovery_token_ca_cert_hash: Option<String>,
}

impl Default for KubernetesConfig {
    fn default() -> Self {
        Self {
            kubernetes_version: "v1.16.2".to_string(),
            node_ip: String::new(),
            node_port: DEFAULT_NODE_PORT,
            api_server_name: "kmachineCA".to_string(),
            dns_domain: "cluster.local".to_string(),
            join_token: None,
            discovery_token_ca_cert_hash: None,
        }
    }
}

/// Invalid Kubernetes version string.
#[derive(Debug, Error)]
pub enum VersionError {
    #[error("kubernetes version must start with 'v': {0:?}")]
    MissingPrefix(String),

    #[error("invalid kubernetes version {version:?}: {source}")]
    Invalid {
        version: String,
        #[source]
        source: semver::Error,
    },
}

/// Parses a `v1.16.2` style version.
pub fn parse_kubernetes_version(version: &str) -> Result<semver::Version, VersionError> {
    let bare = version
        .strip_prefix('v')
        .ok_or_else(|| VersionError::MissingPrefix(version.to_string()))?;
    semver::Version::parse(bare).map_err(|source| VersionError::Invalid {
        version: version.to_string(),
        source,
    })
}
