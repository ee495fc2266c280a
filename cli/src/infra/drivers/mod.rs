//! Driver registry. A host record names its driver; the payload is decoded
//! into that driver's config once the name is known.

pub mod docker;
pub mod multipass;
pub mod none;
pub mod unsupported;

use std::path::Path;

use anyhow::{Context, Result};
use kmachine_common::{MachineConfig, MachineState};
use serde::de::DeserializeOwned;
use serde_json::value::RawValue;

use crate::application::ports::{CommandRunner, Driver};
use crate::domain::error::{DriverError, HostError};
use crate::domain::host::BaseDriver;
use crate::infra::ssh::command_stdout;

pub use docker::{DockerConfig, DockerDriver};
pub use multipass::{MultipassConfig, MultipassDriver};
pub use none::{NoneConfig, NoneDriver};
pub use unsupported::UnsupportedDriver;

/// Drivers known by name but not runnable on this platform.
pub const UNSUPPORTED_DRIVERS: [&str; 4] = ["parallels", "hyperkit", "hyperv", "vmwarefusion"];

/// A resolved driver of any kind.
pub enum AnyDriver<R> {
    None(NoneDriver),
    Multipass(MultipassDriver<R>),
    Docker(DockerDriver<R>),
    Unsupported(UnsupportedDriver),
}

macro_rules! dispatch {
    ($self:expr, $d:ident => $body:expr) => {
        match $self {
            AnyDriver::None($d) => $body,
            AnyDriver::Multipass($d) => $body,
            AnyDriver::Docker($d) => $body,
            AnyDriver::Unsupported($d) => $body,
        }
    };
}

fn decode<T: DeserializeOwned + Default>(driver: &str, payload: Option<&RawValue>) -> Result<T> {
    match payload {
        Some(raw) => serde_json::from_str(raw.get()).map_err(|source| {
            HostError::DriverPayload {
                driver: driver.to_string(),
                source,
            }
            .into()
        }),
        None => Ok(T::default()),
    }
}

/// The base fields are never empty after this: a record without a payload
/// (or a payload from an older release) inherits the name and store root.
fn fill_base(base: &mut BaseDriver, machine_name: &str, store_path: &Path) {
    if base.machine_name.is_empty() {
        base.machine_name = machine_name.to_string();
    }
    if base.store_path.is_empty() {
        base.store_path = store_path.to_string_lossy().into_owned();
    }
}

impl<R: CommandRunner> AnyDriver<R> {
    /// Driver for a persisted host. `store_path` is the global store root
    /// recovered from the record's metadata.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Unknown`] for unregistered names and
    /// [`HostError::DriverPayload`] when the payload does not decode.
    pub fn resolve(
        driver_name: &str,
        machine_name: &str,
        payload: Option<&RawValue>,
        store_path: &Path,
        runner: R,
    ) -> Result<Self> {
        match driver_name {
            none::DRIVER_NAME => {
                let mut config: NoneConfig = decode(driver_name, payload)?;
                fill_base(&mut config.base, machine_name, store_path);
                Ok(Self::None(NoneDriver::new(config)))
            }
            multipass::DRIVER_NAME => {
                let mut config: MultipassConfig = decode(driver_name, payload)?;
                fill_base(&mut config.base, machine_name, store_path);
                Ok(Self::Multipass(MultipassDriver::new(config, runner)))
            }
            docker::DRIVER_NAME => {
                let mut config: DockerConfig = decode(driver_name, payload)?;
                fill_base(&mut config.base, machine_name, store_path);
                Ok(Self::Docker(DockerDriver::new(config, runner)))
            }
            other => {
                let name = UNSUPPORTED_DRIVERS
                    .into_iter()
                    .find(|n| *n == other)
                    .ok_or_else(|| DriverError::Unknown(other.to_string()))?;
                // Foreign payloads only need to yield the shared fields.
                let mut base: BaseDriver = decode(name, payload)?;
                fill_base(&mut base, machine_name, store_path);
                Ok(Self::Unsupported(UnsupportedDriver::new(
                    name,
                    base,
                    payload.map(ToOwned::to_owned),
                )))
            }
        }
    }

    /// Driver for a machine that does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Unknown`] for unregistered names.
    pub fn for_new_machine(config: &MachineConfig, store_path: &Path, runner: R) -> Result<Self> {
        let base = BaseDriver::new(&config.machine_name, store_path);
        match config.driver.as_str() {
            none::DRIVER_NAME => Ok(Self::None(NoneDriver::new(NoneConfig {
                base,
                url: String::new(),
            }))),
            multipass::DRIVER_NAME => Ok(Self::Multipass(MultipassDriver::new(
                MultipassConfig::from_machine(config, base),
                runner,
            ))),
            docker::DRIVER_NAME => Ok(Self::Docker(DockerDriver::new(
                DockerConfig::from_machine(config, base),
                runner,
            ))),
            other => Self::resolve(other, &config.machine_name, None, store_path, runner),
        }
    }

    /// True for the passthrough driver, whose commands run locally.
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self, Self::None(_))
    }
}

impl<R: CommandRunner> Driver for AnyDriver<R> {
    fn driver_name(&self) -> &'static str {
        dispatch!(self, d => d.driver_name())
    }
    fn machine_name(&self) -> &str {
        dispatch!(self, d => d.machine_name())
    }
    fn store_path(&self) -> &str {
        dispatch!(self, d => d.store_path())
    }
    fn ssh_username(&self) -> String {
        dispatch!(self, d => d.ssh_username())
    }
    fn ssh_key_path(&self) -> String {
        dispatch!(self, d => d.ssh_key_path())
    }

    async fn create(&mut self) -> Result<()> {
        dispatch!(self, d => d.create().await)
    }
    async fn start(&mut self) -> Result<()> {
        dispatch!(self, d => d.start().await)
    }
    async fn stop(&self) -> Result<()> {
        dispatch!(self, d => d.stop().await)
    }
    async fn restart(&mut self) -> Result<()> {
        dispatch!(self, d => d.restart().await)
    }
    async fn kill(&self) -> Result<()> {
        dispatch!(self, d => d.kill().await)
    }
    async fn remove(&self) -> Result<()> {
        dispatch!(self, d => d.remove().await)
    }

    async fn ip(&self) -> Result<String> {
        dispatch!(self, d => d.ip().await)
    }
    async fn state(&self) -> Result<MachineState> {
        dispatch!(self, d => d.state().await)
    }
    async fn ssh_hostname(&self) -> Result<String> {
        dispatch!(self, d => d.ssh_hostname().await)
    }
    async fn ssh_port(&self) -> Result<u16> {
        dispatch!(self, d => d.ssh_port().await)
    }
    async fn url(&self) -> Result<String> {
        dispatch!(self, d => d.url().await)
    }

    fn to_payload(&self) -> Result<Box<RawValue>> {
        dispatch!(self, d => d.to_payload())
    }
}

/// Generates an ed25519 key pair at `key_path` unless one exists, and
/// returns the public key. File access runs on `spawn_blocking`.
///
/// # Errors
///
/// Returns an error if `ssh-keygen` fails or the public key is unreadable.
pub async fn ensure_ssh_key(runner: &impl CommandRunner, key_path: &Path) -> Result<String> {
    let dir = key_path.parent().map(Path::to_path_buf);
    let key = key_path.to_path_buf();
    let key_exists = tokio::task::spawn_blocking(move || -> Result<bool> {
        if key.exists() {
            return Ok(true);
        }
        if let Some(dir) = dir {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("creating directory {}", dir.display()))?;
        }
        Ok(false)
    })
    .await
    .context("ssh key check task panicked")??;

    if !key_exists {
        let path = key_path.to_string_lossy();
        tracing::debug!(path = %path, "generating machine SSH key");
        let output = runner
            .run(
                "ssh-keygen",
                &["-q", "-t", "ed25519", "-N", "", "-C", "kmachine", "-f", path.as_ref()],
            )
            .await
            .context("ssh-keygen")?;
        command_stdout("ssh-keygen", output)?;
    }

    let public_path = key_path.with_extension("pub");
    tokio::task::spawn_blocking(move || {
        std::fs::read_to_string(&public_path)
            .with_context(|| format!("reading {}", public_path.display()))
    })
    .await
    .context("ssh key read task panicked")?
}
