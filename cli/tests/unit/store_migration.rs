//! Host records written by older releases and by drivers this platform
//! cannot run.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::Path;

use kmachine_cli::application::ports::{Driver, MachineApi};
use kmachine_cli::infra::store::HostStore;
use kmachine_common::MachineState;

use crate::mocks::client;

fn write_record(root: &Path, name: &str, json: &str) {
    let dir = root.join("machines").join(name);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("config.json"), json).unwrap();
}

#[tokio::test]
async fn version_zero_record_recovers_store_root_and_name() {
    let dir = tempfile::tempdir().expect("tempdir");
    let machine_dir = dir.path().join("machines").join("old");
    let record = serde_json::json!({
        "DriverName": "none",
        "HostOptions": {"AuthOptions": {"StorePath": machine_dir}},
        "Driver": {"IPAddress": "10.1.1.1"},
        "Name": "old"
    });
    write_record(dir.path(), "old", &record.to_string());

    let migrated = HostStore::new(dir.path().join("machines"))
        .load("old")
        .await
        .unwrap();
    assert_eq!(migrated.metadata.store_path, dir.path());
    assert!(!migrated.migration_performed);

    let host = client(dir.path()).load("old").await.unwrap();
    assert_eq!(host.driver.machine_name(), "old");
    assert_eq!(host.driver.store_path(), dir.path().to_string_lossy());
    assert_eq!(host.driver.ip().await.unwrap(), "10.1.1.1");
}

#[tokio::test]
async fn foreign_driver_payload_survives_load_and_save() {
    let dir = tempfile::tempdir().expect("tempdir");
    let payload = r#"{"MachineName":"vm","Boot2DockerURL":"",  "CPU": 4, "Nested": {"a": [1, 2.50]}}"#;
    let record = format!(
        r#"{{"ConfigVersion": 3, "Driver": {payload}, "DriverName": "hyperv", "Name": "vm"}}"#
    );
    write_record(dir.path(), "vm", &record);

    let api = client(dir.path());
    let host = api.load("vm").await.unwrap();
    assert_eq!(host.driver.driver_name(), "hyperv");
    assert_eq!(host.driver.state().await.unwrap(), MachineState::Error);
    assert!(host.driver.remove().await.is_err());

    api.save(&host).await.unwrap();
    let reloaded = HostStore::new(dir.path().join("machines"))
        .load("vm")
        .await
        .unwrap();
    assert_eq!(reloaded.record.raw_driver(), Some(payload));
}

#[tokio::test]
async fn unregistered_driver_name_fails_to_load() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_record(
        dir.path(),
        "vm",
        r#"{"ConfigVersion": 3, "DriverName": "virtualbox", "Name": "vm"}"#,
    );
    let Err(err) = client(dir.path()).load("vm").await else {
        panic!("unknown driver accepted");
    };
    assert!(format!("{err:#}").contains("unknown driver \"virtualbox\""));
}

#[tokio::test]
async fn malformed_record_is_an_error_not_a_missing_machine() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_record(dir.path(), "broken", "{\"Name\": ");
    let api = client(dir.path());
    assert!(api.exists("broken").await.unwrap());
    assert!(api.load("broken").await.is_err());
}
