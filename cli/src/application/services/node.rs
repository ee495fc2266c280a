//! Application service: node manager.
//!
//! Maps a logical node onto its backing machine (`<cluster>-<node>`) and
//! exposes lifecycle, status, IP and command channel against it. Status is
//! recomputed from the driver on every call.

use anyhow::{Context, Result};
use kmachine_common::{MachineConfig, NodeConfig, NodeStatus};

use crate::application::ports::{ClusterNode, Driver, MachineApi, ProfileStore, ProgressReporter};
use crate::domain::error::{HostError, ProfileError};
use crate::domain::host::Host;
use crate::domain::node::{machine_name, next_node_name, node_status, worker_machine_name};

/// A cluster node bound to the machine API that backs it.
pub struct Node<'a, M> {
    config: NodeConfig,
    base: &'a MachineConfig,
    cluster_name: String,
    api: &'a M,
}

impl<'a, M: MachineApi> Node<'a, M> {
    pub fn new(config: NodeConfig, base: &'a MachineConfig, cluster_name: &str, api: &'a M) -> Self {
        Self {
            config,
            base,
            cluster_name: cluster_name.to_string(),
            api,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Creates the machine if needed and starts it.
    ///
    /// # Errors
    ///
    /// Returns an error if the machine cannot be created, started or provisioned.
    pub async fn start(&self) -> Result<()> {
        let name = ClusterNode::machine_name(self);
        self.api
            .start_host(&self.base.for_machine(&name))
            .await
            .with_context(|| format!("starting {name}"))?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the machine does not exist or the driver fails.
    pub async fn stop(&self) -> Result<()> {
        let host = self.load().await?;
        host.driver
            .stop()
            .await
            .with_context(|| format!("stopping {}", host.name))
    }

    /// Live status of the backing machine.
    ///
    /// # Errors
    ///
    /// Returns an error when the driver state is `Error`, `Timeout` or not
    /// recognised, or when the host cannot be loaded. A missing machine is
    /// [`NodeStatus::NotCreated`], not an error.
    pub async fn status(&self) -> Result<NodeStatus> {
        self.live_status().await.context("getting node status")
    }

    async fn live_status(&self) -> Result<NodeStatus> {
        let name = ClusterNode::machine_name(self);
        if !self.api.exists(&name).await? {
            return Ok(NodeStatus::NotCreated);
        }
        let host = self.api.load(&name).await?;
        let state = host.driver.state().await?;
        Ok(node_status(state)?)
    }

    async fn load(&self) -> Result<Host<M::Driver>> {
        let name = ClusterNode::machine_name(self);
        if !self.api.exists(&name).await? {
            return Err(HostError::NotFound(name).into());
        }
        self.api.load(&name).await
    }
}

impl<M: MachineApi> ClusterNode for Node<'_, M> {
    type Runner = M::Runner;

    fn machine_name(&self) -> String {
        machine_name(&self.cluster_name, &self.config.name)
    }

    async fn ip(&self) -> Result<String> {
        let host = self.load().await?;
        host.driver.ip().await.context("Error getting IP")
    }

    async fn runner(&self) -> Result<M::Runner> {
        let host = self.load().await.context("loading host")?;
        self.api.runner(&host).await
    }
}

/// Creates and starts `count` worker machines named `<base>-<i>`, one at a
/// time. The first failure stops the loop and is returned as is.
///
/// # Errors
///
/// Returns the error of the first machine that fails.
pub async fn start_nodes(
    api: &impl MachineApi,
    base: &MachineConfig,
    count: usize,
    reporter: &impl ProgressReporter,
) -> Result<Vec<String>> {
    let mut started = Vec::with_capacity(count);
    for index in 1..=count {
        let name = worker_machine_name(&base.machine_name, index);
        tracing::info!(machine = %name, "creating machine");
        reporter.step(&format!("Creating machine {name}..."));
        api.start_host(&base.for_machine(&name)).await?;
        reporter.success(&format!("{name} started"));
        started.push(name);
    }
    Ok(started)
}

/// Appends a node to the `cluster` profile and saves it. Without a name the
/// node is called `node-<count+1>`.
///
/// # Errors
///
/// Returns an error if the profile cannot be loaded or saved, or if a node
/// with the same name already exists.
pub fn add_node(
    store: &impl ProfileStore,
    cluster: &str,
    name: Option<&str>,
) -> Result<NodeConfig> {
    if cluster.is_empty() {
        return Err(ProfileError::EmptyName.into());
    }
    let mut config = store
        .load(cluster)
        .context("Error loading profile config")?;
    let name = match name {
        Some(n) if !n.is_empty() => n.to_string(),
        _ => next_node_name(config.nodes.len()),
    };
    anyhow::ensure!(
        config.nodes.iter().all(|n| n.name != name),
        "node {name:?} already exists in profile {cluster:?}"
    );

    let node = NodeConfig { name };
    config.nodes.push(node.clone());
    store
        .save(cluster, &config)
        .context("Error saving profile cluster configuration")?;
    Ok(node)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::path::PathBuf;

    use kmachine_common::{ClusterConfig, MachineState};

    use super::*;
    use crate::application::services::test_support::{
        RecordingReporter, ScriptedShell, StubDriver,
    };
    use crate::domain::host::HostOptions;

    type Shell = ScriptedShell<fn(&str) -> Result<String>>;

    fn echo(command: &str) -> Result<String> {
        Ok(command.to_string())
    }

    #[derive(Default)]
    struct FakeApi {
        machines: RefCell<HashMap<String, MachineState>>,
        started: RefCell<Vec<String>>,
        lookups: RefCell<Vec<String>>,
        fail_on: Option<String>,
    }

    impl FakeApi {
        fn with_machine(name: &str, state: MachineState) -> Self {
            let api = Self::default();
            api.machines.borrow_mut().insert(name.to_string(), state);
            api
        }
    }

    impl MachineApi for FakeApi {
        type Driver = StubDriver;
        type Runner = Shell;

        async fn exists(&self, name: &str) -> Result<bool> {
            self.lookups.borrow_mut().push(name.to_string());
            Ok(self.machines.borrow().contains_key(name))
        }
        async fn load(&self, name: &str) -> Result<Host<StubDriver>> {
            let state = *self
                .machines
                .borrow()
                .get(name)
                .ok_or_else(|| HostError::NotFound(name.to_string()))?;
            let mut driver = StubDriver::running(name, "192.168.64.20");
            driver.state = state;
            Ok(Host::new(name, driver, HostOptions::default()))
        }
        async fn start_host(&self, config: &MachineConfig) -> Result<Host<StubDriver>> {
            self.started.borrow_mut().push(config.machine_name.clone());
            if self.fail_on.as_deref() == Some(config.machine_name.as_str()) {
                anyhow::bail!("{} failed to boot", config.machine_name)
            }
            self.machines
                .borrow_mut()
                .insert(config.machine_name.clone(), MachineState::Running);
            self.load(&config.machine_name).await
        }
        async fn save(&self, _: &Host<StubDriver>) -> Result<()> {
            Ok(())
        }
        async fn remove(&self, name: &str) -> Result<()> {
            self.machines.borrow_mut().remove(name);
            Ok(())
        }
        async fn runner(&self, _: &Host<StubDriver>) -> Result<Shell> {
            Ok(ScriptedShell::new(echo as fn(&str) -> Result<String>))
        }
    }

    fn node<'a>(api: &'a FakeApi, base: &'a MachineConfig, name: &str) -> Node<'a, FakeApi> {
        Node::new(NodeConfig { name: name.into() }, base, "demo", api)
    }

    #[tokio::test]
    async fn status_not_created_when_machine_missing() {
        let api = FakeApi::default();
        let base = MachineConfig::default();
        let status = node(&api, &base, "node-2").status().await.expect("status");
        assert_eq!(status, NodeStatus::NotCreated);
        assert_eq!(*api.lookups.borrow(), vec!["demo-node-2"]);
    }

    #[tokio::test]
    async fn status_maps_live_driver_state() {
        let api = FakeApi::with_machine("demo-node-2", MachineState::Paused);
        let base = MachineConfig::default();
        let status = node(&api, &base, "node-2").status().await.expect("status");
        assert_eq!(status, NodeStatus::Stopped);
    }

    #[tokio::test]
    async fn status_surfaces_error_state() {
        let api = FakeApi::with_machine("demo-node-2", MachineState::Timeout);
        let base = MachineConfig::default();
        let err = node(&api, &base, "node-2").status().await.unwrap_err();
        assert!(format!("{err:#}").contains("Error state Timeout"));
    }

    #[tokio::test]
    async fn ip_and_runner_use_derived_machine_name() {
        let api = FakeApi::with_machine("demo-node-2", MachineState::Running);
        let base = MachineConfig::default();
        let n = node(&api, &base, "node-2");
        assert_eq!(ClusterNode::machine_name(&n), "demo-node-2");
        assert_eq!(n.ip().await.expect("ip"), "192.168.64.20");
        assert!(n.runner().await.is_ok());
        assert!(api.lookups.borrow().iter().all(|l| l == "demo-node-2"));
    }

    #[tokio::test]
    async fn ip_of_missing_machine_is_not_found() {
        let api = FakeApi::default();
        let base = MachineConfig::default();
        let err = node(&api, &base, "node-9").ip().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HostError>(),
            Some(HostError::NotFound(name)) if name == "demo-node-9"
        ));
    }

    #[tokio::test]
    async fn start_uses_base_config_with_machine_name() {
        let api = FakeApi::default();
        let base = MachineConfig {
            machine_name: "demo".into(),
            ..MachineConfig::default()
        };
        node(&api, &base, "node-1").start().await.expect("start");
        assert_eq!(*api.started.borrow(), vec!["demo-node-1"]);
    }

    #[tokio::test]
    async fn start_nodes_stops_at_first_failure() {
        let api = FakeApi {
            fail_on: Some("demo-2".into()),
            ..FakeApi::default()
        };
        let base = MachineConfig {
            machine_name: "demo".into(),
            ..MachineConfig::default()
        };
        let err = start_nodes(&api, &base, 3, &RecordingReporter::default())
            .await
            .unwrap_err();
        assert_eq!(*api.started.borrow(), vec!["demo-1", "demo-2"]);
        assert_eq!(err.to_string(), "demo-2 failed to boot");
    }

    #[tokio::test]
    async fn start_nodes_creates_all_in_order() {
        let api = FakeApi::default();
        let base = MachineConfig {
            machine_name: "demo".into(),
            ..MachineConfig::default()
        };
        let names = start_nodes(&api, &base, 3, &RecordingReporter::default())
            .await
            .expect("started");
        assert_eq!(names, vec!["demo-1", "demo-2", "demo-3"]);
    }

    #[derive(Default)]
    struct MemoryProfiles {
        profiles: RefCell<HashMap<String, ClusterConfig>>,
    }

    impl ProfileStore for MemoryProfiles {
        fn load(&self, cluster: &str) -> Result<ClusterConfig> {
            self.profiles
                .borrow()
                .get(cluster)
                .cloned()
                .ok_or_else(|| ProfileError::NotFound(cluster.to_string()).into())
        }
        fn save(&self, cluster: &str, config: &ClusterConfig) -> Result<()> {
            self.profiles
                .borrow_mut()
                .insert(cluster.to_string(), config.clone());
            Ok(())
        }
        fn list(&self) -> Result<Vec<(String, ClusterConfig)>> {
            let mut all: Vec<_> = self
                .profiles
                .borrow()
                .iter()
                .map(|(name, config)| (name.clone(), config.clone()))
                .collect();
            all.sort_by(|a, b| a.0.cmp(&b.0));
            Ok(all)
        }
        fn path(&self, cluster: &str) -> PathBuf {
            PathBuf::from(cluster)
        }
    }

    #[test]
    fn add_node_defaults_name_from_count() {
        let store = MemoryProfiles::default();
        store.save("demo", &ClusterConfig::default()).unwrap();
        assert_eq!(add_node(&store, "demo", None).unwrap().name, "node-1");
        assert_eq!(add_node(&store, "demo", None).unwrap().name, "node-2");
        assert_eq!(add_node(&store, "demo", Some("gpu")).unwrap().name, "gpu");
        assert_eq!(store.load("demo").unwrap().nodes.len(), 3);
    }

    #[test]
    fn add_node_rejects_duplicate_and_missing_profile() {
        let store = MemoryProfiles::default();
        store.save("demo", &ClusterConfig::default()).unwrap();
        add_node(&store, "demo", Some("a")).unwrap();
        assert!(add_node(&store, "demo", Some("a")).is_err());

        let err = add_node(&store, "other", None).unwrap_err();
        assert!(matches!(
            err.root_cause().downcast_ref::<ProfileError>(),
            Some(ProfileError::NotFound(_))
        ));
    }
}
