pub mod config;
pub mod types;

pub use config::{
    ClusterConfig, DEFAULT_NODE_PORT, KubernetesConfig, MachineConfig, NodeConfig, VersionError,
    parse_kubernetes_version,
};
pub use types::*;
