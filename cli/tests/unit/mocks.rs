//! Shared mock infrastructure for unit tests.

#![allow(clippy::expect_used)]

use std::path::Path;
use std::process::{ExitStatus, Output};
use std::time::Duration;

use anyhow::Result;
use kmachine_cli::application::ports::{CommandRunner, ProgressReporter};
use kmachine_cli::infra::home::KmachineHome;
use kmachine_cli::infra::machine::LocalMachineClient;
use kmachine_common::MachineConfig;

/// Runner for tests that must not spawn anything.
#[derive(Clone, Copy, Default)]
pub struct NoProcesses;

fn unexpected<T>(program: &str) -> Result<T> {
    anyhow::bail!("unexpected process spawn: {program}")
}

impl CommandRunner for NoProcesses {
    async fn run(&self, program: &str, _: &[&str]) -> Result<Output> {
        unexpected(program)
    }
    async fn run_with_timeout(&self, program: &str, _: &[&str], _: Duration) -> Result<Output> {
        unexpected(program)
    }
    async fn run_with_stdin(&self, program: &str, _: &[&str], _: &[u8]) -> Result<Output> {
        unexpected(program)
    }
    async fn run_status(&self, program: &str, _: &[&str]) -> Result<ExitStatus> {
        unexpected(program)
    }
}

/// Swallows progress output.
pub struct QuietReporter;

impl ProgressReporter for QuietReporter {
    fn step(&self, _: &str) {}
    fn success(&self, _: &str) {}
    fn warn(&self, _: &str) {}
}

pub fn client(root: &Path) -> LocalMachineClient<NoProcesses, QuietReporter> {
    LocalMachineClient::new(
        KmachineHome::new(root.to_path_buf()),
        NoProcesses,
        QuietReporter,
        "tester".to_string(),
    )
}

pub fn local_machine(name: &str) -> MachineConfig {
    MachineConfig {
        machine_name: name.to_string(),
        driver: "none".to_string(),
        ..MachineConfig::default()
    }
}
