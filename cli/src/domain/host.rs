//! Persisted host records and their schema migration.
//!
//! A host record binds a machine name to a driver payload. The payload is
//! kept as raw JSON so that a record written by a newer driver version
//! survives a load/save cycle byte-for-byte; it is decoded into a concrete
//! driver only once the driver name is known.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::domain::error::HostError;

/// Schema version written by this release.
pub const CURRENT_CONFIG_VERSION: u32 = 3;

// ── Driver payload ────────────────────────────────────────────────────────────

/// Fields every driver persists, whatever the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct BaseDriver {
    #[serde(rename = "IPAddress")]
    pub ip_address: String,
    pub machine_name: String,
    #[serde(rename = "SSHUser")]
    pub ssh_user: String,
    #[serde(rename = "SSHPort")]
    pub ssh_port: u16,
    #[serde(rename = "SSHKeyPath")]
    pub ssh_key_path: String,
    pub store_path: String,
}

impl BaseDriver {
    #[must_use]
    pub fn new(machine_name: &str, store_path: &Path) -> Self {
        Self {
            machine_name: machine_name.to_string(),
            store_path: store_path.to_string_lossy().into_owned(),
            ..Self::default()
        }
    }

    /// `<store>/machines/<name>`.
    #[must_use]
    pub fn machine_dir(&self) -> PathBuf {
        Path::new(&self.store_path)
            .join("machines")
            .join(&self.machine_name)
    }

    /// A file inside the machine directory.
    #[must_use]
    pub fn resolve_store_path(&self, file: &str) -> PathBuf {
        self.machine_dir().join(file)
    }
}

// ── Host options ──────────────────────────────────────────────────────────────

/// Local and remote locations of the TLS material for one machine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AuthOptions {
    pub cert_dir: PathBuf,
    pub ca_cert_path: PathBuf,
    pub ca_private_key_path: PathBuf,
    pub ca_cert_remote_path: String,
    pub server_cert_path: PathBuf,
    pub server_key_path: PathBuf,
    pub client_key_path: PathBuf,
    pub server_cert_remote_path: String,
    pub server_key_remote_path: String,
    pub client_cert_path: PathBuf,
    #[serde(rename = "ServerCertSANs")]
    pub server_cert_sans: Vec<String>,
    /// Machine directory the local client reads its credentials from.
    pub store_path: PathBuf,
}

impl AuthOptions {
    /// Default layout: shared CA and client material under `certs_dir`,
    /// per-machine server material under `machine_dir`.
    #[must_use]
    pub fn new(certs_dir: &Path, machine_dir: &Path) -> Self {
        Self {
            cert_dir: certs_dir.to_path_buf(),
            ca_cert_path: certs_dir.join("ca.pem"),
            ca_private_key_path: certs_dir.join("ca-key.pem"),
            ca_cert_remote_path: "/etc/docker/ca.pem".to_string(),
            server_cert_path: machine_dir.join("server.pem"),
            server_key_path: machine_dir.join("server-key.pem"),
            client_key_path: certs_dir.join("key.pem"),
            server_cert_remote_path: "/etc/docker/server.pem".to_string(),
            server_key_remote_path: "/etc/docker/server-key.pem".to_string(),
            client_cert_path: certs_dir.join("cert.pem"),
            server_cert_sans: Vec::new(),
            store_path: machine_dir.to_path_buf(),
        }
    }
}

/// Remote container daemon settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct EngineOptions {
    pub arbitrary_flags: Vec<String>,
    pub dns: Vec<String>,
    pub graph_dir: String,
    pub env: Vec<String>,
    pub ipv6: bool,
    pub insecure_registry: Vec<String>,
    pub labels: Vec<String>,
    pub log_level: String,
    pub storage_driver: String,
    pub selinux_enabled: bool,
    pub tls_verify: bool,
    pub registry_mirror: Vec<String>,
    #[serde(rename = "InstallURL")]
    pub install_url: String,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            arbitrary_flags: Vec::new(),
            dns: Vec::new(),
            graph_dir: String::new(),
            env: Vec::new(),
            ipv6: false,
            insecure_registry: Vec::new(),
            labels: Vec::new(),
            log_level: String::new(),
            storage_driver: String::new(),
            selinux_enabled: false,
            tls_verify: true,
            registry_mirror: Vec::new(),
            install_url: "https://get.docker.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct HostOptions {
    pub driver: String,
    pub memory: u32,
    pub disk: u32,
    pub engine_options: EngineOptions,
    pub auth_options: AuthOptions,
}

// ── Metadata (first decoding pass) ────────────────────────────────────────────

/// The oldest record layout: only what is needed to place a driver.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MetadataV0 {
    pub config_version: u32,
    pub driver_name: String,
    pub host_options: HostOptionsV0,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct HostOptionsV0 {
    pub auth_options: AuthOptionsV0,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AuthOptionsV0 {
    pub store_path: PathBuf,
}

/// Current metadata shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub config_version: u32,
    pub driver_name: String,
    /// Global store root, i.e. the directory holding `machines/`.
    pub store_path: PathBuf,
}

/// Upgrades version-0 metadata. The auth store path points at
/// `<store>/machines/<name>`, so the global store is two levels up.
#[must_use]
pub fn migrate_metadata_v0(v0: MetadataV0) -> Metadata {
    let machine_dir = v0.host_options.auth_options.store_path;
    Metadata {
        config_version: v0.config_version,
        driver_name: v0.driver_name,
        store_path: dir(&dir(&machine_dir)),
    }
}

/// `dirname` semantics: the parent, or `.` when there is none.
fn dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ if path.has_root() => path.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

// ── Live host ─────────────────────────────────────────────────────────────────

/// A machine bound to its resolved driver.
#[derive(Debug, Clone)]
pub struct Host<D> {
    pub name: String,
    pub config_version: u32,
    pub driver: D,
    pub host_options: HostOptions,
}

impl<D> Host<D> {
    #[must_use]
    pub fn new(name: &str, driver: D, host_options: HostOptions) -> Self {
        Self {
            name: name.to_string(),
            config_version: CURRENT_CONFIG_VERSION,
            driver,
            host_options,
        }
    }
}

// ── Full record ───────────────────────────────────────────────────────────────

/// On-disk host record. `driver` is captured verbatim.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostRecord {
    #[serde(default)]
    pub config_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<Box<RawValue>>,
    #[serde(default)]
    pub driver_name: String,
    #[serde(default)]
    pub host_options: HostOptions,
    pub name: String,
}

impl HostRecord {
    /// Raw driver payload, if the record carries one.
    #[must_use]
    pub fn raw_driver(&self) -> Option<&str> {
        self.driver.as_deref().map(RawValue::get)
    }

    /// # Errors
    ///
    /// Returns an error if the record cannot be serialized.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }
}

/// Result of loading a record through migration.
#[derive(Debug)]
pub struct MigratedHost {
    pub record: HostRecord,
    pub metadata: Metadata,
    /// Loading never rewrites the record; callers decide when to save.
    pub migration_performed: bool,
}

/// Decodes a persisted record in two passes: metadata first (to learn the
/// store path and driver name), then the full record with the driver payload
/// captured raw for a later, driver-specific decode.
///
/// # Errors
///
/// Returns [`HostError::Metadata`] or [`HostError::Record`] on malformed JSON.
pub fn migrate_host(data: &[u8]) -> Result<MigratedHost, HostError> {
    let v0: MetadataV0 = serde_json::from_slice(data).map_err(HostError::Metadata)?;
    let metadata = migrate_metadata_v0(v0);
    let mut record: HostRecord = serde_json::from_slice(data).map_err(HostError::Record)?;
    if record.driver_name.is_empty() {
        record.driver_name.clone_from(&metadata.driver_name);
    }
    Ok(MigratedHost {
        record,
        metadata,
        migration_performed: false,
    })
}
