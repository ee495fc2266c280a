//! Infrastructure implementation of the `CommandRunner` port.
//!
//! `TokioCommandRunner` runs local processes with tokio and guarantees the
//! child is killed when its timeout fires.

use std::process::{Output, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Child;

use crate::application::ports::CommandRunner;

/// Default timeout for driver CLI calls (info, start, stop, ...).
pub const DEFAULT_CMD_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for machine creation, which downloads images and boots.
pub const CREATE_TIMEOUT: Duration = Duration::from_secs(600);

/// Production `CommandRunner`.
///
/// `tokio::time::timeout` around `.output().await` drops the future but can
/// leave the OS process running on some platforms, so the timeout branch of
/// `tokio::select!` kills the child explicitly.
#[derive(Debug, Clone)]
pub struct TokioCommandRunner {
    timeout: Duration,
}

impl TokioCommandRunner {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TokioCommandRunner {
    fn default() -> Self {
        Self::new(DEFAULT_CMD_TIMEOUT)
    }
}

async fn read_all<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = h.read_to_end(&mut buf).await;
    }
    buf
}

/// Waits for `child` while draining its pipes; kills it after `timeout`.
async fn collect(mut child: Child, program: &str, timeout: Duration) -> Result<Output> {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    tokio::select! {
        result = async {
            let (status, stdout, stderr) =
                tokio::join!(child.wait(), read_all(stdout), read_all(stderr));
            Ok(Output {
                status: status.with_context(|| format!("waiting for {program}"))?,
                stdout,
                stderr,
            })
        } => result,
        () = tokio::time::sleep(timeout) => {
            let _ = child.kill().await;
            anyhow::bail!("{program} timed out after {}s", timeout.as_secs())
        }
    }
}

impl CommandRunner for TokioCommandRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output> {
        self.run_with_timeout(program, args, self.timeout).await
    }

    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<Output> {
        tracing::debug!(program, ?args, "running command");
        let child = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn {program}"))?;
        collect(child, program, timeout).await
    }

    async fn run_with_stdin(&self, program: &str, args: &[&str], input: &[u8]) -> Result<Output> {
        tracing::debug!(program, ?args, bytes = input.len(), "running command with stdin");
        let mut child = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn {program}"))?;

        if let Some(mut stdin) = child.stdin.take() {
            let input = input.to_vec();
            tokio::spawn(async move {
                let _ = stdin.write_all(&input).await;
            });
        }
        collect(child, program, self.timeout).await
    }

    async fn run_status(&self, program: &str, args: &[&str]) -> Result<std::process::ExitStatus> {
        tracing::debug!(program, ?args, "running command with inherited stdio");
        let mut child = tokio::process::Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn {program}"))?;

        child
            .wait()
            .await
            .with_context(|| format!("waiting for {program}"))
    }
}
