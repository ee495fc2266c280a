//! Application service: running the container build client against a
//! machine's TLS-secured daemon.

use std::path::Path;

use anyhow::{Context, Result};

use crate::application::ports::{CommandRunner, Driver, MachineApi};
use crate::domain::engine::engine_port;
use crate::domain::error::HostError;

/// Client flags for talking to the daemon at `ip:port` with the credentials
/// stored in `cert_dir`.
#[must_use]
pub fn tls_flags(cert_dir: &Path, ip: &str, port: u16) -> Vec<String> {
    vec![
        "--tlsverify".to_string(),
        "--tlscacert".to_string(),
        cert_dir.join("ca.pem").to_string_lossy().into_owned(),
        "--tlscert".to_string(),
        cert_dir.join("cert.pem").to_string_lossy().into_owned(),
        "--tlskey".to_string(),
        cert_dir.join("key.pem").to_string_lossy().into_owned(),
        "-H".to_string(),
        format!("tcp://{ip}:{port}"),
    ]
}

/// Full argument list: TLS flags, `build`, then the caller's arguments.
#[must_use]
pub fn build_args(flags: Vec<String>, user_args: &[String]) -> Vec<String> {
    let mut args = flags;
    args.push("build".to_string());
    args.extend_from_slice(user_args);
    args
}

/// Runs `binary build ARGS` against `machine`'s daemon with inherited stdio
/// and returns the child's exit code.
///
/// # Errors
///
/// Returns an error if the machine cannot be loaded, its address cannot be
/// resolved, or the binary cannot be spawned.
pub async fn run_build(
    api: &impl MachineApi,
    runner: &impl CommandRunner,
    machine: &str,
    binary: &str,
    user_args: &[String],
) -> Result<i32> {
    if !api.exists(machine).await? {
        return Err(HostError::NotFound(machine.to_string()).into());
    }
    let host = api.load(machine).await?;
    let ip = host.driver.ip().await.context("getting machine IP")?;
    let url = host.driver.url().await.context("getting daemon URL")?;
    let port = engine_port(&url)?;

    let args = build_args(
        tls_flags(&host.host_options.auth_options.store_path, &ip, port),
        user_args,
    );
    tracing::info!(binary, ?args, "running build client");
    let refs: Vec<&str> = args.iter().map(String::as_str).collect();
    let status = runner
        .run_status(binary, &refs)
        .await
        .with_context(|| format!("Error running {binary}"))?;
    Ok(status.code().unwrap_or(1))
}
