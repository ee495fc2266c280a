//! Multipass VM driver. Every `multipass` invocation goes through a
//! [`CommandRunner`] so tests can script the CLI.

use anyhow::{Context, Result};
use kmachine_common::{MachineConfig, MachineState};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::application::ports::{CommandRunner, Driver};
use crate::domain::error::DriverError;
use crate::domain::host::BaseDriver;
use crate::infra::command_runner::CREATE_TIMEOUT;
use crate::infra::drivers::ensure_ssh_key;
use crate::infra::ssh::command_stdout;
use crate::infra::fs::write_atomic;

pub const DRIVER_NAME: &str = "multipass";

const MULTIPASS_MIN_VERSION: semver::Version = semver::Version::new(1, 16, 0);
const SSH_USER: &str = "ubuntu";
const KEY_FILE: &str = "id_ed25519";
const CLOUD_INIT_FILE: &str = "cloud-init.yaml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MultipassConfig {
    #[serde(flatten)]
    pub base: BaseDriver,
    #[serde(rename = "CPUs")]
    pub cpus: u32,
    /// MB.
    pub memory: u32,
    /// MB.
    pub disk_size: u32,
    /// Release or alias; empty means the multipass default.
    pub image: String,
}

impl Default for MultipassConfig {
    fn default() -> Self {
        let machine = MachineConfig::default();
        Self {
            base: BaseDriver::default(),
            cpus: machine.cpus,
            memory: machine.memory,
            disk_size: machine.disk_size,
            image: String::new(),
        }
    }
}

impl MultipassConfig {
    #[must_use]
    pub fn from_machine(config: &MachineConfig, base: BaseDriver) -> Self {
        Self {
            base,
            cpus: config.cpus,
            memory: config.memory,
            disk_size: config.disk_size,
            image: config.image.clone().unwrap_or_default(),
        }
    }
}

/// Maps `multipass info` states. Anything unrecognised is `None`.
#[must_use]
pub fn parse_state(state: &str) -> MachineState {
    match state {
        "Running" => MachineState::Running,
        "Starting" | "Restarting" => MachineState::Starting,
        "Delayed Shutdown" | "Suspending" => MachineState::Stopping,
        "Stopped" => MachineState::Stopped,
        "Suspended" => MachineState::Paused,
        _ => MachineState::None,
    }
}

/// `#cloud-config` that authorises `public_key` for the default user and
/// installs the container engine the provisioner configures.
#[must_use]
pub fn cloud_init(public_key: &str) -> String {
    format!(
        "#cloud-config\n\
         users:\n  - default\n  - name: {SSH_USER}\n    ssh_authorized_keys:\n      - {}\n\
         package_update: true\n\
         packages:\n  - docker.io\n  - net-tools\n\
         runcmd:\n  - systemctl enable --now docker\n  - usermod -aG docker {SSH_USER}\n",
        public_key.trim()
    )
}

pub struct MultipassDriver<R> {
    config: MultipassConfig,
    runner: R,
}

impl<R: CommandRunner> MultipassDriver<R> {
    pub fn new(config: MultipassConfig, runner: R) -> Self {
        Self { config, runner }
    }

    #[must_use]
    pub fn config(&self) -> &MultipassConfig {
        &self.config
    }

    async fn multipass(&self, args: &[&str]) -> Result<String> {
        let command = format!("multipass {}", args.first().copied().unwrap_or_default());
        let output = self
            .runner
            .run("multipass", args)
            .await
            .with_context(|| command.clone())?;
        command_stdout(&command, output)
    }

    async fn check_version(&self) -> Result<()> {
        let stdout = self
            .multipass(&["version"])
            .await
            .context("multipass is not available")?;
        if let Some(ver_str) = stdout
            .lines()
            .next()
            .and_then(|l| l.split_whitespace().nth(1))
            && let Ok(v) = semver::Version::parse(ver_str)
            && v < MULTIPASS_MIN_VERSION
        {
            anyhow::bail!("multipass {v} is too old, {MULTIPASS_MIN_VERSION} or newer is required");
        }
        Ok(())
    }

    async fn info(&self) -> Result<serde_json::Value> {
        let name = &self.config.base.machine_name;
        let stdout = self
            .multipass(&["info", name.as_str(), "--format", "json"])
            .await?;
        let json: serde_json::Value =
            serde_json::from_str(&stdout).context("parsing multipass info")?;
        json.get("info")
            .and_then(|i| i.get(name))
            .cloned()
            .ok_or_else(|| {
                DriverError::UnexpectedOutput {
                    driver: DRIVER_NAME,
                    command: "multipass info".to_string(),
                    output: stdout.trim().to_string(),
                }
                .into()
            })
    }

    async fn refresh_ip(&mut self) -> Result<()> {
        self.config.base.ip_address = self.ip().await?;
        Ok(())
    }
}

impl<R: CommandRunner> Driver for MultipassDriver<R> {
    fn driver_name(&self) -> &'static str {
        DRIVER_NAME
    }
    fn machine_name(&self) -> &str {
        &self.config.base.machine_name
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
        self.check_version().await?;

        let key_path = self.config.base.resolve_store_path(KEY_FILE);
        let public_key = ensure_ssh_key(&self.runner, &key_path).await?;
        let cloud_init_path = self.config.base.resolve_store_path(CLOUD_INIT_FILE);
        let document = cloud_init(&public_key);
        let target = cloud_init_path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&target, document.as_bytes()))
            .await
            .context("cloud-init write task panicked")??;

        let name = self.config.base.machine_name.clone();
        let cpus = self.config.cpus.to_string();
        let memory = format!("{}M", self.config.memory);
        let disk = format!("{}M", self.config.disk_size);
        let cloud_init = cloud_init_path.to_string_lossy().into_owned();
        let timeout = CREATE_TIMEOUT.as_secs().to_string();

        let mut args = vec!["launch"];
        if !self.config.image.is_empty() {
            args.push(self.config.image.as_str());
        }
        args.extend([
            "--name",
            name.as_str(),
            "--cpus",
            cpus.as_str(),
            "--memory",
            memory.as_str(),
            "--disk",
            disk.as_str(),
            "--cloud-init",
            cloud_init.as_str(),
            "--timeout",
            timeout.as_str(),
        ]);
        tracing::info!(machine = %name, %cpus, %memory, %disk, "launching multipass instance");
        let output = self
            .runner
            .run_with_timeout("multipass", &args, CREATE_TIMEOUT)
            .await
            .context("multipass launch")?;
        command_stdout("multipass launch", output)?;

        self.config.base.ssh_user = SSH_USER.to_string();
        self.config.base.ssh_port = 22;
        self.config.base.ssh_key_path = key_path.to_string_lossy().into_owned();
        self.refresh_ip().await
    }

    async fn start(&mut self) -> Result<()> {
        let name = self.config.base.machine_name.clone();
        self.multipass(&["start", name.as_str()]).await?;
        self.refresh_ip().await
    }

    async fn stop(&self) -> Result<()> {
        self.multipass(&["stop", self.config.base.machine_name.as_str()])
            .await
            .map(drop)
    }

    async fn restart(&mut self) -> Result<()> {
        let name = self.config.base.machine_name.clone();
        self.multipass(&["restart", name.as_str()]).await?;
        self.refresh_ip().await
    }

    async fn kill(&self) -> Result<()> {
        self.multipass(&["stop", "--force", self.config.base.machine_name.as_str()])
            .await
            .map(drop)
    }

    async fn remove(&self) -> Result<()> {
        self.multipass(&["delete", "--purge", self.config.base.machine_name.as_str()])
            .await
            .map(drop)
    }

    async fn ip(&self) -> Result<String> {
        let info = self.info().await?;
        Ok(info
            .get("ipv4")
            .and_then(|v| v.get(0))
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    async fn state(&self) -> Result<MachineState> {
        let info = self.info().await?;
        Ok(parse_state(
            info.get("state")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default(),
        ))
    }

    async fn ssh_hostname(&self) -> Result<String> {
        self.ip().await
    }

    async fn ssh_port(&self) -> Result<u16> {
        Ok(match self.config.base.ssh_port {
            0 => 22,
            port => port,
        })
    }

    async fn url(&self) -> Result<String> {
        let ip = self.ip().await?;
        if ip.is_empty() {
            return Ok(String::new());
        }
        Ok(format!("tcp://{ip}:2376"))
    }

    fn to_payload(&self) -> Result<Box<RawValue>> {
        Ok(serde_json::value::to_raw_value(&self.config)?)
    }
}
