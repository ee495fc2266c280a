//! Placeholder for drivers that exist in the registry but cannot run on
//! this platform. Lifecycle calls fail; queries answer with neutral values
//! so listing and status commands keep working.

use anyhow::Result;
use kmachine_common::MachineState;
use serde_json::value::RawValue;

use crate::application::ports::Driver;
use crate::domain::error::DriverError;
use crate::domain::host::BaseDriver;

pub struct UnsupportedDriver {
    name: &'static str,
    base: BaseDriver,
    /// Original payload, written back untouched.
    payload: Option<Box<RawValue>>,
}

impl UnsupportedDriver {
    #[must_use]
    pub fn new(name: &'static str, base: BaseDriver, payload: Option<Box<RawValue>>) -> Self {
        Self {
            name,
            base,
            payload,
        }
    }

    fn not_supported(&self) -> anyhow::Error {
        DriverError::NotSupported {
            driver: self.name.to_string(),
            os: std::env::consts::OS,
        }
        .into()
    }
}

impl Driver for UnsupportedDriver {
    fn driver_name(&self) -> &'static str {
        self.name
    }
    fn machine_name(&self) -> &str {
        &self.base.machine_name
    }
    fn store_path(&self) -> &str {
        &self.base.store_path
    }
    fn ssh_username(&self) -> String {
        self.base.ssh_user.clone()
    }
    fn ssh_key_path(&self) -> String {
        self.base.ssh_key_path.clone()
    }

    async fn create(&mut self) -> Result<()> {
        Err(self.not_supported())
    }
    async fn start(&mut self) -> Result<()> {
        Err(self.not_supported())
    }
    async fn stop(&self) -> Result<()> {
        Err(self.not_supported())
    }
    async fn restart(&mut self) -> Result<()> {
        Err(self.not_supported())
    }
    async fn kill(&self) -> Result<()> {
        Err(self.not_supported())
    }
    async fn remove(&self) -> Result<()> {
        Err(self.not_supported())
    }

    async fn ip(&self) -> Result<String> {
        Ok(String::new())
    }
    async fn state(&self) -> Result<MachineState> {
        Ok(MachineState::Error)
    }
    async fn ssh_hostname(&self) -> Result<String> {
        Err(self.not_supported())
    }
    async fn ssh_port(&self) -> Result<u16> {
        Err(self.not_supported())
    }
    async fn url(&self) -> Result<String> {
        Ok(String::new())
    }

    fn to_payload(&self) -> Result<Box<RawValue>> {
        match &self.payload {
            Some(raw) => Ok(raw.clone()),
            None => Ok(serde_json::value::to_raw_value(&self.base)?),
        }
    }
}
