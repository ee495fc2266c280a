//! `kmachine node`: manage the worker nodes of a cluster profile.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Subcommand;
use kmachine_common::{ClusterConfig, NodeConfig};

use crate::app::AppContext;
use crate::application::ports::{ClusterNode, MachineApi, ProfileStore};
use crate::application::services::bootstrap::bootstrap_worker;
use crate::application::services::node::{Node, add_node};
use crate::infra::kubeadm::KubeadmSetup;

#[derive(Subcommand, Debug)]
pub enum NodeCommand {
    /// Add a node to the profile (default name node-N)
    Add {
        name: Option<String>,
    },
    /// Create and start a node's machine
    Start { name: String },
    /// Stop a node's machine
    Stop { name: String },
    /// Print a node's status
    Status { name: String },
    /// Print a node's IP address
    Ip { name: String },
    /// Join a node to the control plane
    Join { name: String },
    /// Remove a node's machine
    Delete { name: String },
}

fn node_config(profile: &ClusterConfig, cluster: &str, name: &str) -> Result<NodeConfig> {
    profile
        .nodes
        .iter()
        .find(|n| n.name == name)
        .cloned()
        .with_context(|| format!("node {name:?} not found in profile {cluster:?}"))
}

fn node_of<'a, M: MachineApi>(
    profile: &'a ClusterConfig,
    cluster: &str,
    name: &str,
    api: &'a M,
) -> Result<Node<'a, M>> {
    Ok(Node::new(
        node_config(profile, cluster, name)?,
        &profile.machine_config,
        cluster,
        api,
    ))
}

/// # Errors
///
/// Returns an error if the profile or node cannot be found, or the
/// requested operation fails.
pub async fn run(app: &AppContext, cmd: NodeCommand) -> Result<ExitCode> {
    if let NodeCommand::Add { name } = &cmd {
        let node = add_node(&app.profiles, &app.profile, name.as_deref())?;
        app.output.success(&format!(
            "Added node {} to profile {}",
            node.name, app.profile
        ));
        return Ok(ExitCode::SUCCESS);
    }

    let profile = app
        .profiles
        .load(&app.profile)
        .context("Error loading profile config")?;
    let api = app.machines();
    let reporter = app.reporter();
    let cluster = app.profile.as_str();

    match cmd {
        NodeCommand::Add { .. } => {}
        NodeCommand::Start { name } => {
            node_of(&profile, cluster, &name, &api)?.start().await?;
            app.output.success(&format!("Node {name} started"));
        }
        NodeCommand::Stop { name } => {
            node_of(&profile, cluster, &name, &api)?.stop().await?;
            app.output.success(&format!("Node {name} stopped"));
        }
        NodeCommand::Status { name } => {
            println!("{}", node_of(&profile, cluster, &name, &api)?.status().await?);
        }
        NodeCommand::Ip { name } => {
            println!("{}", node_of(&profile, cluster, &name, &api)?.ip().await?);
        }
        NodeCommand::Join { name } => {
            let node = node_of(&profile, cluster, &name, &api)?;
            let setup = KubeadmSetup::new(app.home.root().join("ca.crt"));
            bootstrap_worker(&node, &setup, &profile.kubernetes_config, &reporter).await?;
            app.output.success(&format!("Node {name} joined the cluster"));
        }
        NodeCommand::Delete { name } => {
            let machine = node_of(&profile, cluster, &name, &api)?.machine_name();
            api.remove(&machine).await?;
            app.output.success(&format!("Machine {machine} removed"));
        }
    }
    Ok(ExitCode::SUCCESS)
}
