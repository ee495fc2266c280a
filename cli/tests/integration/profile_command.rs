//! `kmachine profile list` against a temporary home.

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

#[test]
fn test_profile_list_without_profiles() {
    let home = TempDir::new().expect("temp dir");
    kmachine(&home)
        .args(["profile", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No profiles found"));
}

#[test]
fn test_profile_list_skips_malformed_profile() {
    let home = TempDir::new().expect("temp dir");
    write_profile(
        &home,
        "demo",
        r#"{"MachineConfig": {"MachineName": "demo", "Driver": "docker", "Memory": 4096}, "Nodes": [{"Name": "node-1"}]}"#,
    );
    write_profile(&home, "broken", "{\"Nodes\": [");

    kmachine(&home)
        .args(["-p", "demo", "profile", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("* demo"))
        .stdout(predicate::str::contains("driver=docker"))
        .stdout(predicate::str::contains("memory=4096MB"))
        .stdout(predicate::str::contains("nodes=1"))
        .stdout(predicate::str::contains("broken").not())
        .stderr(predicate::str::contains("skipping unreadable profile"));
}
