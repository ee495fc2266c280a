//! Argument parsing and help output.

#![allow(clippy::expect_used)]

use assert_cmd::Command;
use predicates::prelude::*;

fn kmachine() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("kmachine"));
    cmd.env("NO_COLOR", "1");
    cmd
}

#[test]
fn test_no_args_shows_help_and_exits_two() {
    kmachine().assert().code(2).stderr(predicate::str::contains(
        "Local Kubernetes nodes on VMs, containers, or the bare host",
    ));
}

#[test]
fn test_help_lists_commands() {
    kmachine()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("start"))
        .stdout(predicate::str::contains("node"))
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_version_flag() {
    kmachine()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("kmachine 0.1.0"));
}

#[test]
fn test_node_help_lists_subcommands() {
    kmachine()
        .args(["node", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("add"))
        .stdout(predicate::str::contains("join"))
        .stdout(predicate::str::contains("status"));
}

#[test]
fn test_unknown_subcommand_fails() {
    kmachine()
        .arg("destroy-everything")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}
