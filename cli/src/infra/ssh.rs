//! Command channel implementations: SSH to the machine, or local execution
//! for hosts without a driver.

use std::process::Output;

use anyhow::{Context, Result};

use crate::application::ports::{CommandRunner, ShellExecutor};
use crate::domain::error::CommandError;

#[cfg(windows)]
const DEV_NULL: &str = "NUL";
#[cfg(not(windows))]
const DEV_NULL: &str = "/dev/null";

/// Where and as whom to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub host: String,
    pub port: u16,
    pub user: String,
    /// Private key; empty means the agent or default identities.
    pub key_path: String,
}

/// Arguments for a non-interactive `ssh` invocation running `command`.
#[must_use]
pub fn ssh_args(target: &SshTarget, command: &str) -> Vec<String> {
    let mut args: Vec<String> = [
        "-F",
        DEV_NULL,
        "-o",
        "ConnectionAttempts=3",
        "-o",
        "ConnectTimeout=10",
        "-o",
        "ControlMaster=no",
        "-o",
        "StrictHostKeyChecking=no",
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect();
    args.push("-o".to_string());
    args.push(format!("UserKnownHostsFile={DEV_NULL}"));
    for opt in ["LogLevel=ERROR", "BatchMode=yes"] {
        args.push("-o".to_string());
        args.push(opt.to_string());
    }
    if !target.key_path.is_empty() {
        args.push("-o".to_string());
        args.push("IdentitiesOnly=yes".to_string());
        args.push("-i".to_string());
        args.push(target.key_path.clone());
    }
    args.push("-p".to_string());
    args.push(target.port.to_string());
    args.push(format!("{}@{}", target.user, target.host));
    args.push(command.to_string());
    args
}

/// Stdout of a successful command, or a [`CommandError`] with its stderr.
///
/// # Errors
///
/// Returns [`CommandError`] when the process exited non-zero.
pub fn command_stdout(command: &str, output: Output) -> Result<String> {
    if !output.status.success() {
        return Err(CommandError {
            command: command.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
        .into());
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Runs commands on a remote machine through the `ssh` client.
#[derive(Debug, Clone)]
pub struct SshExecutor<R> {
    runner: R,
    target: SshTarget,
}

impl<R: CommandRunner> SshExecutor<R> {
    pub fn new(runner: R, target: SshTarget) -> Self {
        Self { runner, target }
    }

    pub fn target(&self) -> &SshTarget {
        &self.target
    }
}

impl<R: CommandRunner> ShellExecutor for SshExecutor<R> {
    async fn exec(&self, command: &str) -> Result<String> {
        tracing::debug!(host = %self.target.host, port = self.target.port, command, "ssh exec");
        let args = ssh_args(&self.target, command);
        let refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self
            .runner
            .run("ssh", &refs)
            .await
            .with_context(|| format!("ssh {}@{}", self.target.user, self.target.host))?;
        command_stdout(command, output)
    }
}

/// Runs commands directly on this host through `sh -c`.
#[derive(Debug, Clone)]
pub struct LocalExecutor<R> {
    runner: R,
}

impl<R: CommandRunner> LocalExecutor<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }
}

impl<R: CommandRunner> ShellExecutor for LocalExecutor<R> {
    async fn exec(&self, command: &str) -> Result<String> {
        tracing::debug!(command, "local exec");
        let output = self
            .runner
            .run("sh", &["-c", command])
            .await
            .context("running local command")?;
        command_stdout(command, output)
    }
}

/// The command channel resolved for a host.
#[derive(Debug, Clone)]
pub enum NodeRunner<R> {
    Local(LocalExecutor<R>),
    Ssh(SshExecutor<R>),
}

impl<R: CommandRunner> ShellExecutor for NodeRunner<R> {
    async fn exec(&self, command: &str) -> Result<String> {
        match self {
            Self::Local(local) => local.exec(command).await,
            Self::Ssh(ssh) => ssh.exec(command).await,
        }
    }
}
