//! Passthrough driver: the local host is the machine.

use anyhow::Result;
use kmachine_common::MachineState;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::application::ports::Driver;
use crate::domain::error::DriverError;
use crate::domain::host::BaseDriver;

pub const DRIVER_NAME: &str = "none";

const LOCAL_IP: &str = "127.0.0.1";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NoneConfig {
    #[serde(flatten)]
    pub base: BaseDriver,
    #[serde(rename = "URL")]
    pub url: String,
}

/// Always running; cannot be started, stopped or killed by this process.
/// Commands run locally, so there is no SSH identity.
#[derive(Debug, Clone)]
pub struct NoneDriver {
    config: NoneConfig,
}

impl NoneDriver {
    #[must_use]
    pub fn new(config: NoneConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &NoneConfig {
        &self.config
    }
}

impl Driver for NoneDriver {
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
        String::new()
    }
    fn ssh_key_path(&self) -> String {
        String::new()
    }

    async fn create(&mut self) -> Result<()> {
        if self.config.base.ip_address.is_empty() {
            self.config.base.ip_address = LOCAL_IP.to_string();
        }
        Ok(())
    }
    async fn start(&mut self) -> Result<()> {
        Err(DriverError::NoLifecycle("started").into())
    }
    async fn stop(&self) -> Result<()> {
        Err(DriverError::NoLifecycle("stopped").into())
    }
    async fn restart(&mut self) -> Result<()> {
        Err(DriverError::NoLifecycle("restarted").into())
    }
    async fn kill(&self) -> Result<()> {
        Err(DriverError::NoLifecycle("killed").into())
    }
    async fn remove(&self) -> Result<()> {
        Ok(())
    }

    async fn ip(&self) -> Result<String> {
        if self.config.base.ip_address.is_empty() {
            return Ok(LOCAL_IP.to_string());
        }
        Ok(self.config.base.ip_address.clone())
    }
    async fn state(&self) -> Result<MachineState> {
        Ok(MachineState::Running)
    }
    async fn ssh_hostname(&self) -> Result<String> {
        Err(DriverError::NoSsh(DRIVER_NAME).into())
    }
    async fn ssh_port(&self) -> Result<u16> {
        Err(DriverError::NoSsh(DRIVER_NAME).into())
    }
    async fn url(&self) -> Result<String> {
        Ok(self.config.url.clone())
    }

    fn to_payload(&self) -> Result<Box<RawValue>> {
        Ok(serde_json::value::to_raw_value(&self.config)?)
    }
}
