//! `kmachine config` against a temporary home.

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

#[test]
fn test_config_show_defaults_without_file() {
    let home = TempDir::new().expect("temp dir");
    kmachine(&home)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("multipass"))
        .stdout(predicate::str::contains("2048"));
}

#[test]
fn test_config_set_then_get() {
    let home = TempDir::new().expect("temp dir");
    kmachine(&home)
        .args(["config", "set", "cpus", "4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Set cpus = 4"));
    kmachine(&home)
        .args(["config", "get", "cpus"])
        .assert()
        .success()
        .stdout("4\n");

    let saved = std::fs::read_to_string(home.path().join("config.yaml")).unwrap();
    assert!(saved.contains("cpus: 4"));
}

#[test]
fn test_config_set_unknown_key_fails() {
    let home = TempDir::new().expect("temp dir");
    kmachine(&home)
        .args(["config", "set", "color", "blue"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown setting: color"));
}

#[test]
fn test_config_set_invalid_driver_fails() {
    let home = TempDir::new().expect("temp dir");
    kmachine(&home)
        .args(["config", "set", "driver", "virtualbox"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Valid drivers: none, multipass, docker"));
    assert!(!home.path().join("config.yaml").exists());
}

#[test]
fn test_malformed_settings_file_is_reported() {
    let home = TempDir::new().expect("temp dir");
    std::fs::write(home.path().join("config.yaml"), "cpus: [").unwrap();
    kmachine(&home)
        .args(["config", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("loading settings"));
}

#[test]
fn test_any_no_color_value_is_accepted() {
    let home = TempDir::new().expect("temp dir");
    kmachine(&home)
        .env("NO_COLOR", "true")
        .args(["config", "show"])
        .assert()
        .success();
}
