//! Shared fakes for service tests.

use std::cell::RefCell;

use anyhow::Result;
use kmachine_common::MachineState;
use serde_json::value::RawValue;

use crate::application::ports::{Driver, ProgressReporter, ShellExecutor};

/// Build an `ExitStatus` from a logical exit code (cross-platform).
#[cfg(unix)]
pub fn exit_status(code: i32) -> std::process::ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    std::process::ExitStatus::from_raw(code << 8)
}

#[cfg(windows)]
pub fn exit_status(code: i32) -> std::process::ExitStatus {
    use std::os::windows::process::ExitStatusExt;
    #[allow(clippy::cast_sign_loss)]
    std::process::ExitStatus::from_raw(code as u32)
}

/// Command channel that records every command and answers from a closure.
pub struct ScriptedShell<F> {
    pub calls: RefCell<Vec<String>>,
    respond: F,
}

impl<F: Fn(&str) -> Result<String>> ScriptedShell<F> {
    pub fn new(respond: F) -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            respond,
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl<F: Fn(&str) -> Result<String>> ShellExecutor for ScriptedShell<F> {
    async fn exec(&self, command: &str) -> Result<String> {
        self.calls.borrow_mut().push(command.to_string());
        (self.respond)(command)
    }
}

/// Reporter that keeps every message for assertions.
#[derive(Default)]
pub struct RecordingReporter {
    pub messages: RefCell<Vec<String>>,
}

impl ProgressReporter for RecordingReporter {
    fn step(&self, message: &str) {
        self.messages.borrow_mut().push(message.to_string());
    }
    fn success(&self, message: &str) {
        self.messages.borrow_mut().push(message.to_string());
    }
    fn warn(&self, message: &str) {
        self.messages.borrow_mut().push(message.to_string());
    }
}

/// Driver with a fixed address and state; lifecycle calls are counted.
#[derive(Debug, Clone)]
pub struct StubDriver {
    pub name: String,
    pub ip: String,
    pub url: String,
    pub state: MachineState,
}

impl StubDriver {
    pub fn running(name: &str, ip: &str) -> Self {
        Self {
            name: name.to_string(),
            ip: ip.to_string(),
            url: format!("tcp://{ip}:2376"),
            state: MachineState::Running,
        }
    }
}

impl Driver for StubDriver {
    fn driver_name(&self) -> &'static str {
        "stub"
    }
    fn machine_name(&self) -> &str {
        &self.name
    }
    fn store_path(&self) -> &str {
        "/store"
    }
    fn ssh_username(&self) -> String {
        "docker".to_string()
    }
    fn ssh_key_path(&self) -> String {
        String::new()
    }
    async fn create(&mut self) -> Result<()> {
        Ok(())
    }
    async fn start(&mut self) -> Result<()> {
        self.state = MachineState::Running;
        Ok(())
    }
    async fn stop(&self) -> Result<()> {
        Ok(())
    }
    async fn restart(&mut self) -> Result<()> {
        Ok(())
    }
    async fn kill(&self) -> Result<()> {
        Ok(())
    }
    async fn remove(&self) -> Result<()> {
        Ok(())
    }
    async fn ip(&self) -> Result<String> {
        Ok(self.ip.clone())
    }
    async fn state(&self) -> Result<MachineState> {
        Ok(self.state)
    }
    async fn ssh_hostname(&self) -> Result<String> {
        Ok(self.ip.clone())
    }
    async fn ssh_port(&self) -> Result<u16> {
        Ok(22)
    }
    async fn url(&self) -> Result<String> {
        Ok(self.url.clone())
    }
    fn to_payload(&self) -> Result<Box<RawValue>> {
        Ok(serde_json::value::to_raw_value(&serde_json::json!({
            "MachineName": self.name,
            "IPAddress": self.ip,
        }))?)
    }
}
