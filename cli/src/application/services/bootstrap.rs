//! Application service: joining a worker node to an existing control plane.
//!
//! Stages run strictly in order: move assets, set up certs, join. Each stage's
//! error is wrapped with the stage name and aborts the rest. No retries here.

use anyhow::{Context, Result};
use kmachine_common::{KubernetesConfig, parse_kubernetes_version};

use crate::application::ports::{ClusterNode, NodeSetup, NodeTarget, ProgressReporter};

/// Bootstraps `node` into the cluster described by `config`.
///
/// # Errors
///
/// Returns an error naming the stage that failed.
pub async fn bootstrap_worker(
    node: &impl ClusterNode,
    setup: &impl NodeSetup,
    config: &KubernetesConfig,
    reporter: &impl ProgressReporter,
) -> Result<()> {
    let machine_name = node.machine_name();
    parse_kubernetes_version(&config.kubernetes_version)
        .context("validating kubernetes version")?;

    let ip = node.ip().await.context("Error getting node's IP")?;
    let runner = node.runner().await.context("Error getting node's runner")?;
    let target = NodeTarget {
        machine_name: &machine_name,
        ip: &ip,
        runner: &runner,
    };

    reporter.step("Moving assets into node...");
    setup
        .update_node(&target, config)
        .await
        .context("Error updating node")?;

    reporter.step("Setting up certs...");
    setup
        .setup_certs(&target, config)
        .await
        .context("Error configuring authentication")?;

    reporter.step("Joining node to cluster...");
    setup
        .join_node(&target, config)
        .await
        .context("Error joining node to cluster")?;

    tracing::info!(machine = %machine_name, %ip, "node joined");
    Ok(())
}
