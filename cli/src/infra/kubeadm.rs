//! kubeadm-based node setup: the production `NodeSetup`.
//!
//! Binaries are expected in the node's cache directory (the machine image
//! or a previous run put them there); this module only installs and wires
//! them up over the node's command channel.

use std::path::PathBuf;

use anyhow::{Context, Result};
use kmachine_common::KubernetesConfig;

use crate::application::ports::{NodeSetup, NodeTarget, ShellExecutor};
use crate::domain::engine::transfer_command;

const BINARY_CACHE: &str = "/var/lib/kmachine/binaries";
const CERTS_DIR: &str = "/var/lib/kmachine/certs";
const KUBELET_DROP_IN: &str = "/etc/systemd/system/kubelet.service.d/10-kubeadm.conf";
const BINARIES: [&str; 2] = ["kubeadm", "kubelet"];

/// Shell command installing the cached binaries for `version`.
#[must_use]
pub fn install_binaries_command(version: &str) -> String {
    BINARIES
        .iter()
        .map(|bin| format!("sudo install -m 0755 {BINARY_CACHE}/{version}/{bin} /usr/bin/{bin}"))
        .collect::<Vec<_>>()
        .join(" && ")
}

/// kubelet drop-in pinning the node's address and name.
#[must_use]
pub fn kubelet_drop_in(machine_name: &str, ip: &str) -> String {
    [
        "[Unit]",
        "Wants=docker.socket",
        "",
        "[Service]",
        "ExecStart=",
        &format!(
            "ExecStart=/usr/bin/kubelet --bootstrap-kubeconfig=/etc/kubernetes/bootstrap-kubelet.conf \
             --kubeconfig=/etc/kubernetes/kubelet.conf --config=/var/lib/kubelet/config.yaml \
             --hostname-override={machine_name} --node-ip={ip}"
        ),
        "",
        "[Install]",
        "",
    ]
    .join("\n")
}

/// `kubeadm join` against the control plane in `config`.
///
/// # Errors
///
/// Returns an error when the control plane address, join token or CA hash
/// is missing.
pub fn join_command(config: &KubernetesConfig, machine_name: &str) -> Result<String> {
    anyhow::ensure!(
        !config.node_ip.is_empty(),
        "control plane address is not set in the profile"
    );
    let token = config
        .join_token
        .as_deref()
        .filter(|t| !t.is_empty())
        .context("join token is not set in the profile")?;
    let hash = config
        .discovery_token_ca_cert_hash
        .as_deref()
        .filter(|h| !h.is_empty())
        .context("discovery token CA cert hash is not set in the profile")?;
    Ok(format!(
        "sudo kubeadm join {}:{} --token {token} --discovery-token-ca-cert-hash {hash} \
         --node-name {machine_name} --ignore-preflight-errors=all",
        config.node_ip, config.node_port
    ))
}

/// Joins worker nodes with kubeadm. `cluster_ca` is the local copy of the
/// cluster CA certificate installed on every node.
pub struct KubeadmSetup {
    cluster_ca: PathBuf,
}

impl KubeadmSetup {
    #[must_use]
    pub fn new(cluster_ca: PathBuf) -> Self {
        Self { cluster_ca }
    }
}

impl NodeSetup for KubeadmSetup {
    async fn update_node<E: ShellExecutor>(
        &self,
        node: &NodeTarget<'_, E>,
        config: &KubernetesConfig,
    ) -> Result<()> {
        let runner = node.runner;
        runner
            .exec(&install_binaries_command(&config.kubernetes_version))
            .await
            .context("installing kubernetes binaries")?;
        runner
            .exec("sudo mkdir -p /etc/systemd/system/kubelet.service.d /etc/kubernetes/manifests")
            .await?;
        runner
            .exec(&transfer_command(
                &kubelet_drop_in(node.machine_name, node.ip),
                KUBELET_DROP_IN,
            ))
            .await
            .context("writing kubelet drop-in")?;
        runner.exec("sudo systemctl daemon-reload").await?;
        Ok(())
    }

    async fn setup_certs<E: ShellExecutor>(
        &self,
        node: &NodeTarget<'_, E>,
        _config: &KubernetesConfig,
    ) -> Result<()> {
        let path = self.cluster_ca.clone();
        let ca = tokio::task::spawn_blocking(move || {
            std::fs::read_to_string(&path)
                .with_context(|| format!("reading cluster CA {}", path.display()))
        })
        .await
        .context("cluster CA read task panicked")??;
        node.runner
            .exec(&format!("sudo mkdir -p {CERTS_DIR}"))
            .await?;
        node.runner
            .exec(&transfer_command(&ca, &format!("{CERTS_DIR}/ca.crt")))
            .await
            .context("installing cluster CA")?;
        Ok(())
    }

    async fn join_node<E: ShellExecutor>(
        &self,
        node: &NodeTarget<'_, E>,
        config: &KubernetesConfig,
    ) -> Result<()> {
        let command = join_command(config, node.machine_name)?;
        tracing::info!(machine = node.machine_name, control_plane = %config.node_ip, "running kubeadm join");
        node.runner.exec(&command).await?;
        Ok(())
    }
}
