//! Machine and node lifecycle against a temporary store, using the
//! passthrough driver so nothing is spawned.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use kmachine_cli::application::ports::{ClusterNode, Driver, MachineApi};
use kmachine_cli::application::services::node::Node;
use kmachine_cli::infra::ssh::NodeRunner;
use kmachine_common::{MachineConfig, MachineState, NodeConfig, NodeStatus};

use crate::mocks::{client, local_machine};

#[tokio::test]
async fn start_host_creates_then_reuses_the_record() {
    let dir = tempfile::tempdir().expect("tempdir");
    let api = client(dir.path());
    let config = local_machine("demo");

    assert!(!api.exists("demo").await.unwrap());
    let host = api.start_host(&config).await.expect("create");
    assert_eq!(host.name, "demo");
    assert!(dir.path().join("machines/demo/config.json").exists());

    // Second start finds the record and sees the machine running.
    let again = api.start_host(&config).await.expect("start existing");
    assert_eq!(again.driver.state().await.unwrap(), MachineState::Running);
    assert_eq!(again.driver.ip().await.unwrap(), "127.0.0.1");
}

#[tokio::test]
async fn saved_record_carries_provider_label() {
    let dir = tempfile::tempdir().expect("tempdir");
    let api = client(dir.path());
    api.start_host(&local_machine("demo")).await.unwrap();

    let host = api.load("demo").await.unwrap();
    assert_eq!(host.driver.driver_name(), "none");
    assert!(
        host.host_options
            .engine_options
            .labels
            .contains(&"provider=none".to_string())
    );
}

#[tokio::test]
async fn passthrough_machine_runs_commands_locally() {
    let dir = tempfile::tempdir().expect("tempdir");
    let api = client(dir.path());
    let host = api.start_host(&local_machine("demo")).await.unwrap();
    let runner = api.runner(&host).await.unwrap();
    assert!(matches!(runner, NodeRunner::Local(_)));
}

#[tokio::test]
async fn node_status_tracks_the_backing_machine() {
    let dir = tempfile::tempdir().expect("tempdir");
    let api = client(dir.path());
    let base = MachineConfig {
        driver: "none".to_string(),
        ..MachineConfig::default()
    };
    let node = Node::new(
        NodeConfig {
            name: "node-1".into(),
        },
        &base,
        "demo",
        &api,
    );

    assert_eq!(node.machine_name(), "demo-node-1");
    assert_eq!(node.status().await.unwrap(), NodeStatus::NotCreated);
    assert!(node.ip().await.is_err());

    node.start().await.expect("start node");
    assert_eq!(node.status().await.unwrap(), NodeStatus::Running);
    assert_eq!(node.ip().await.unwrap(), "127.0.0.1");
}

#[tokio::test]
async fn stopping_passthrough_node_is_refused() {
    let dir = tempfile::tempdir().expect("tempdir");
    let api = client(dir.path());
    let base = local_machine("");
    let node = Node::new(
        NodeConfig {
            name: "node-1".into(),
        },
        &base,
        "demo",
        &api,
    );
    node.start().await.unwrap();
    assert!(node.stop().await.is_err());
}

#[tokio::test]
async fn remove_deletes_the_machine_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let api = client(dir.path());
    api.start_host(&local_machine("demo")).await.unwrap();

    api.remove("demo").await.expect("remove");
    assert!(!api.exists("demo").await.unwrap());
    assert!(!dir.path().join("machines/demo").exists());
}

#[tokio::test]
async fn unknown_driver_is_rejected_before_anything_is_written() {
    let dir = tempfile::tempdir().expect("tempdir");
    let api = client(dir.path());
    let config = MachineConfig {
        machine_name: "demo".into(),
        driver: "virtualbox".into(),
        ..MachineConfig::default()
    };
    let Err(err) = api.start_host(&config).await else {
        panic!("unknown driver accepted");
    };
    assert!(format!("{err:#}").contains("virtualbox"));
    assert!(!api.exists("demo").await.unwrap());
}
