//! `kmachine node` profile edits and local-driver machines.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn kmachine(home: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("kmachine"));
    cmd.env("NO_COLOR", "1")
        .env("KMACHINE_HOME", home.path())
        .env_remove("KMACHINE_CONFIG");
    cmd
}

fn write_profile(home: &TempDir, name: &str, json: &str) {
    let dir = home.path().join("profiles").join(name);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("config.json"), json).unwrap();
}

fn local_profile(home: &TempDir) {
    write_profile(
        home,
        "demo",
        r#"{"MachineConfig": {"MachineName": "demo", "Driver": "none"}, "Nodes": [{"Name": "node-1"}]}"#,
    );
}

#[test]
fn test_node_add_without_profile_fails() {
    let home = TempDir::new().expect("temp dir");
    kmachine(&home)
        .args(["-p", "demo", "node", "add"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error loading profile config"));
}

#[test]
fn test_node_add_names_nodes_in_sequence() {
    let home = TempDir::new().expect("temp dir");
    local_profile(&home);
    kmachine(&home)
        .args(["-p", "demo", "node", "add"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added node node-2 to profile demo"));

    let profile = std::fs::read_to_string(home.path().join("profiles/demo/config.json")).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&profile).unwrap();
    assert_eq!(parsed["Nodes"][1]["Name"], "node-2");
}

#[test]
fn test_node_add_duplicate_name_fails() {
    let home = TempDir::new().expect("temp dir");
    local_profile(&home);
    kmachine(&home)
        .args(["-p", "demo", "node", "add", "node-1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_status_of_uncreated_node() {
    let home = TempDir::new().expect("temp dir");
    local_profile(&home);
    kmachine(&home)
        .args(["-p", "demo", "node", "status", "node-1"])
        .assert()
        .success()
        .stdout("NotCreated\n");
}

#[test]
fn test_local_node_start_status_ip_delete() {
    let home = TempDir::new().expect("temp dir");
    local_profile(&home);
    kmachine(&home)
        .args(["-p", "demo", "node", "start", "node-1"])
        .assert()
        .success();
    assert!(home.path().join("machines/demo-node-1/config.json").exists());

    kmachine(&home)
        .args(["-p", "demo", "node", "status", "node-1"])
        .assert()
        .success()
        .stdout("Running\n");
    kmachine(&home)
        .args(["-p", "demo", "node", "ip", "node-1"])
        .assert()
        .success()
        .stdout("127.0.0.1\n");
    kmachine(&home)
        .args(["-p", "demo", "node", "delete", "node-1"])
        .assert()
        .success();
    assert!(!home.path().join("machines/demo-node-1").exists());
}

#[test]
fn test_unknown_node_is_reported() {
    let home = TempDir::new().expect("temp dir");
    local_profile(&home);
    kmachine(&home)
        .args(["-p", "demo", "node", "ip", "node-7"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("node \"node-7\" not found in profile \"demo\""));
}

#[test]
fn test_start_with_local_driver_creates_profile_and_machine() {
    let home = TempDir::new().expect("temp dir");
    kmachine(&home)
        .args(["-p", "solo", "start", "--driver", "none"])
        .assert()
        .success();
    assert!(home.path().join("profiles/solo/config.json").exists());
    assert!(home.path().join("machines/solo/config.json").exists());
}
