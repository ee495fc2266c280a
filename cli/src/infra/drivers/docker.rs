//! Container driver: each machine is a privileged container running its own
//! init and container daemon, reached over a published SSH port.

use anyhow::{Context, Result};
use kmachine_common::{MachineConfig, MachineState};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::application::ports::{CommandRunner, Driver};
use crate::domain::engine::DEFAULT_ENGINE_PORT;
use crate::domain::error::DriverError;
use crate::domain::host::BaseDriver;
use crate::infra::command_runner::CREATE_TIMEOUT;
use crate::infra::drivers::ensure_ssh_key;
use crate::infra::ssh::command_stdout;

pub const DRIVER_NAME: &str = "docker";

pub const DEFAULT_IMAGE: &str = "kicbase/stable:v0.0.45";
const SSH_USER: &str = "root";
const SSH_HOST: &str = "127.0.0.1";
const KEY_FILE: &str = "id_ed25519";
const AUTHORIZE_KEY: &str = "mkdir -p /root/.ssh && cat >> /root/.ssh/authorized_keys && chmod 600 /root/.ssh/authorized_keys";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DockerConfig {
    #[serde(flatten)]
    pub base: BaseDriver,
    pub image: String,
    #[serde(rename = "CPUs")]
    pub cpus: u32,
    /// MB.
    pub memory: u32,
}

impl Default for DockerConfig {
    fn default() -> Self {
        let machine = MachineConfig::default();
        Self {
            base: BaseDriver::default(),
            image: DEFAULT_IMAGE.to_string(),
            cpus: machine.cpus,
            memory: machine.memory,
        }
    }
}

impl DockerConfig {
    #[must_use]
    pub fn from_machine(config: &MachineConfig, base: BaseDriver) -> Self {
        Self {
            base,
            image: config
                .image
                .clone()
                .unwrap_or_else(|| DEFAULT_IMAGE.to_string()),
            cpus: config.cpus,
            memory: config.memory,
        }
    }
}

/// Maps `docker inspect` container states. Anything unrecognised is `None`.
#[must_use]
pub fn parse_state(status: &str) -> MachineState {
    match status.trim() {
        "running" => MachineState::Running,
        "created" | "restarting" => MachineState::Starting,
        "removing" => MachineState::Stopping,
        "exited" | "dead" => MachineState::Stopped,
        "paused" => MachineState::Paused,
        _ => MachineState::None,
    }
}

/// Host port from `docker port` output such as `127.0.0.1:32771`.
///
/// # Errors
///
/// Returns [`DriverError::UnexpectedOutput`] when no port can be found.
pub fn parse_published_port(output: &str) -> Result<u16, DriverError> {
    output
        .lines()
        .next()
        .and_then(|line| line.trim().rsplit(':').next())
        .and_then(|port| port.parse().ok())
        .ok_or_else(|| DriverError::UnexpectedOutput {
            driver: DRIVER_NAME,
            command: "docker port".to_string(),
            output: output.trim().to_string(),
        })
}

/// `docker run` arguments for a new machine container.
#[must_use]
pub fn run_args(config: &DockerConfig) -> Vec<String> {
    let name = &config.base.machine_name;
    let mut args: Vec<String> = [
        "run",
        "-d",
        "-t",
        "--privileged",
        "--security-opt",
        "seccomp=unconfined",
        "--tmpfs",
        "/tmp",
        "--tmpfs",
        "/run",
        "-v",
        "/lib/modules:/lib/modules:ro",
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect();
    args.extend([
        "--hostname".to_string(),
        name.clone(),
        "--name".to_string(),
        name.clone(),
        "--label".to_string(),
        format!("created_by.kmachine={name}"),
        format!("--cpus={}", config.cpus),
        format!("--memory={}m", config.memory),
        "-p".to_string(),
        format!("{SSH_HOST}::22"),
        "-p".to_string(),
        format!("{SSH_HOST}::{DEFAULT_ENGINE_PORT}"),
        config.image.clone(),
    ]);
    args
}

pub struct DockerDriver<R> {
    config: DockerConfig,
    runner: R,
}

impl<R: CommandRunner> DockerDriver<R> {
    pub fn new(config: DockerConfig, runner: R) -> Self {
        Self { config, runner }
    }

    #[must_use]
    pub fn config(&self) -> &DockerConfig {
        &self.config
    }

    fn name(&self) -> &str {
        &self.config.base.machine_name
    }

    async fn docker(&self, args: &[&str]) -> Result<String> {
        let command = format!("docker {}", args.first().copied().unwrap_or_default());
        let output = self
            .runner
            .run("docker", args)
            .await
            .with_context(|| command.clone())?;
        command_stdout(&command, output)
    }

    async fn inspect(&self, format: &str) -> Result<String> {
        let out = self.docker(&["inspect", "-f", format, self.name()]).await?;
        Ok(out.trim().to_string())
    }

    async fn authorize_key(&self, public_key: &str) -> Result<()> {
        let output = self
            .runner
            .run_with_stdin(
                "docker",
                &["exec", "-i", self.name(), "sh", "-c", AUTHORIZE_KEY],
                public_key.as_bytes(),
            )
            .await
            .context("docker exec")?;
        command_stdout("docker exec", output).map(drop)
    }
}

impl<R: CommandRunner> Driver for DockerDriver<R> {
    fn driver_name(&self) -> &'static str {
        DRIVER_NAME
    }
    fn machine_name(&self) -> &str {
        self.name()
    }
    fn store_path(&self) -> &str {
        &self.config.base.store_path
    }
    fn ssh_username(&self) -> String {
        if self.config.base.ssh_user.is_empty() {
            return SSH_USER.to_string();
        }
        self.config.base.ssh_user.clone()
    }
    fn ssh_key_path(&self) -> String {
        self.config.base.ssh_key_path.clone()
    }

    async fn create(&mut self) -> Result<()> {
        let key_path = self.config.base.resolve_store_path(KEY_FILE);
        let public_key = ensure_ssh_key(&self.runner, &key_path).await?;

        let args = run_args(&self.config);
        let refs: Vec<&str> = args.iter().map(String::as_str).collect();
        tracing::info!(machine = %self.name(), image = %self.config.image, "creating container");
        let output = self
            .runner
            .run_with_timeout("docker", &refs, CREATE_TIMEOUT)
            .await
            .context("docker run")?;
        command_stdout("docker run", output)?;

        self.authorize_key(&public_key).await?;
        self.config.base.ssh_user = SSH_USER.to_string();
        self.config.base.ssh_key_path = key_path.to_string_lossy().into_owned();
        self.config.base.ssh_port = self.ssh_port().await?;
        self.config.base.ip_address = self.ip().await?;
        Ok(())
    }

    async fn start(&mut self) -> Result<()> {
        self.docker(&["start", self.name()]).await?;
        // Published ports are reassigned on every start.
        self.config.base.ssh_port = self.ssh_port().await?;
        self.config.base.ip_address = self.ip().await?;
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.docker(&["stop", self.name()]).await.map(drop)
    }

    async fn restart(&mut self) -> Result<()> {
        self.docker(&["restart", self.name()]).await?;
        self.config.base.ssh_port = self.ssh_port().await?;
        Ok(())
    }

    async fn kill(&self) -> Result<()> {
        self.docker(&["kill", self.name()]).await.map(drop)
    }

    async fn remove(&self) -> Result<()> {
        self.docker(&["rm", "-f", "-v", self.name()]).await.map(drop)
    }

    async fn ip(&self) -> Result<String> {
        self.inspect("{{range .NetworkSettings.Networks}}{{.IPAddress}}{{end}}")
            .await
    }

    async fn state(&self) -> Result<MachineState> {
        Ok(parse_state(&self.inspect("{{.State.Status}}").await?))
    }

    async fn ssh_hostname(&self) -> Result<String> {
        Ok(SSH_HOST.to_string())
    }

    async fn ssh_port(&self) -> Result<u16> {
        let out = self.docker(&["port", self.name(), "22/tcp"]).await?;
        Ok(parse_published_port(&out)?)
    }

    async fn url(&self) -> Result<String> {
        let ip = self.ip().await?;
        if ip.is_empty() {
            return Ok(String::new());
        }
        Ok(format!("tcp://{ip}:{DEFAULT_ENGINE_PORT}"))
    }

    fn to_payload(&self) -> Result<Box<RawValue>> {
        Ok(serde_json::value::to_raw_value(&self.config)?)
    }
}
