//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain` and the shared data model,
//! never from `crate::infra`, `crate::commands`, or `crate::output`.

use std::path::{Path, PathBuf};
use std::process::Output;

use anyhow::Result;
use kmachine_common::{ClusterConfig, KubernetesConfig, MachineConfig, MachineState};
use serde_json::value::RawValue;

use crate::domain::certs::ServerCertRequest;
use crate::domain::{Host, KmachineConfig};

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts local process execution so infrastructure can be swapped or mocked.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a program and capture its output.
    ///
    /// Implementations should delegate to `run_with_timeout` using the
    /// instance's configured default timeout.
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output>;
    /// Run a program with a custom timeout override.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exceeds `timeout`.
    /// On timeout, the child process must be killed (not left orphaned).
    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: std::time::Duration,
    ) -> Result<Output>;
    /// Run a program with stdin piped from `stdin`.
    async fn run_with_stdin(&self, program: &str, args: &[&str], stdin: &[u8]) -> Result<Output>;
    /// Run a program with inherited stdio and return only its exit status.
    async fn run_status(&self, program: &str, args: &[&str]) -> Result<std::process::ExitStatus>;
}

// ── Driver Port ───────────────────────────────────────────────────────────────

/// A machine backend: hypervisor VM, container, or the local host.
///
/// Every variant implements the full set. Variants that cannot perform a
/// mutating operation fail it immediately; read-only queries return benign
/// defaults instead of failing.
#[allow(async_fn_in_trait)]
pub trait Driver {
    /// Registry name, e.g. `"multipass"`.
    fn driver_name(&self) -> &'static str;
    fn machine_name(&self) -> &str;
    /// Global store root.
    fn store_path(&self) -> &str;
    fn ssh_username(&self) -> String;
    fn ssh_key_path(&self) -> String;

    async fn create(&mut self) -> Result<()>;
    async fn start(&mut self) -> Result<()>;
    async fn stop(&self) -> Result<()>;
    async fn restart(&mut self) -> Result<()>;
    async fn kill(&self) -> Result<()>;
    async fn remove(&self) -> Result<()>;

    async fn ip(&self) -> Result<String>;
    async fn state(&self) -> Result<MachineState>;
    async fn ssh_hostname(&self) -> Result<String>;
    async fn ssh_port(&self) -> Result<u16>;
    /// Daemon URL, e.g. `tcp://192.168.64.2:2376`.
    async fn url(&self) -> Result<String>;

    /// Serialized driver fields for the host record.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver state cannot be serialized.
    fn to_payload(&self) -> Result<Box<RawValue>>;
}

// ── Command Channel Port ──────────────────────────────────────────────────────

/// Runs a shell command on a machine, locally or over SSH.
#[allow(async_fn_in_trait)]
pub trait ShellExecutor {
    /// Execute `command` and return its stdout. A non-zero exit is an error
    /// carrying the command and its stderr.
    async fn exec(&self, command: &str) -> Result<String>;
}

// ── Machine API Port ──────────────────────────────────────────────────────────

/// Loads, creates and persists hosts.
#[allow(async_fn_in_trait)]
pub trait MachineApi {
    type Driver: Driver;
    type Runner: ShellExecutor;

    async fn exists(&self, name: &str) -> Result<bool>;
    /// Loads the host record and resolves its driver.
    async fn load(&self, name: &str) -> Result<Host<Self::Driver>>;
    /// Starts the machine described by `config`, creating it first when it
    /// does not exist. The returned host is running and provisioned.
    async fn start_host(&self, config: &MachineConfig) -> Result<Host<Self::Driver>>;
    async fn save(&self, host: &Host<Self::Driver>) -> Result<()>;
    async fn remove(&self, name: &str) -> Result<()>;
    /// Command channel for `host`: local execution for the passthrough
    /// driver, SSH otherwise.
    async fn runner(&self, host: &Host<Self::Driver>) -> Result<Self::Runner>;
}

// ── Certificate Port ──────────────────────────────────────────────────────────

/// Issues TLS material from the local certificate authority.
pub trait CertGenerator {
    /// Write a server certificate and key signed by the CA named in `request`.
    ///
    /// # Errors
    ///
    /// Returns an error if the CA cannot be read or the files cannot be written.
    fn generate_server_cert(&self, request: &ServerCertRequest) -> Result<()>;
}

// ── Filesystem Port ───────────────────────────────────────────────────────────

/// Local file operations the provisioning protocol needs.
pub trait LocalFs {
    /// Copy `from` to `to`, creating the destination directory.
    ///
    /// # Errors
    ///
    /// Returns an error if either file cannot be accessed.
    fn copy_file(&self, from: &Path, to: &Path) -> Result<()>;
    /// Read a file as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or not valid UTF-8.
    fn read_to_string(&self, path: &Path) -> Result<String>;
}

// ── Store Ports ───────────────────────────────────────────────────────────────

/// Per-cluster profile persistence.
pub trait ProfileStore {
    /// # Errors
    ///
    /// Returns `ProfileError::NotFound` when no profile exists, a parse error
    /// when it is malformed.
    fn load(&self, cluster: &str) -> Result<ClusterConfig>;
    /// # Errors
    ///
    /// Returns an error if the profile cannot be written atomically.
    fn save(&self, cluster: &str, config: &ClusterConfig) -> Result<()>;
    /// Every readable profile, sorted by name. Entries that fail to load
    /// are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the profiles directory exists but cannot be read.
    fn list(&self) -> Result<Vec<(String, ClusterConfig)>>;
    fn path(&self, cluster: &str) -> PathBuf;
}

/// Settings persistence.
pub trait ConfigStore {
    /// Load settings, returning defaults if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    fn load(&self) -> Result<KmachineConfig>;
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    fn save(&self, config: &KmachineConfig) -> Result<()>;
    fn path(&self) -> PathBuf;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait; no async needed.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}

// ── Cluster Node Ports ────────────────────────────────────────────────────────

/// A cluster member whose IP and command channel can be resolved.
#[allow(async_fn_in_trait)]
pub trait ClusterNode {
    type Runner: ShellExecutor;

    fn machine_name(&self) -> String;
    async fn ip(&self) -> Result<String>;
    async fn runner(&self) -> Result<Self::Runner>;
}

/// Resolved connection to a node for the join protocol.
pub struct NodeTarget<'a, E> {
    pub machine_name: &'a str,
    pub ip: &'a str,
    pub runner: &'a E,
}

/// The three stages of joining a node to a control plane.
#[allow(async_fn_in_trait)]
pub trait NodeSetup {
    /// Move binaries, certificates and manifests onto the node.
    async fn update_node<E: ShellExecutor>(
        &self,
        node: &NodeTarget<'_, E>,
        config: &KubernetesConfig,
    ) -> Result<()>;
    /// Install the node's cluster certificates.
    async fn setup_certs<E: ShellExecutor>(
        &self,
        node: &NodeTarget<'_, E>,
        config: &KubernetesConfig,
    ) -> Result<()>;
    /// Run the join against the control plane.
    async fn join_node<E: ShellExecutor>(
        &self,
        node: &NodeTarget<'_, E>,
        config: &KubernetesConfig,
    ) -> Result<()>;
}
