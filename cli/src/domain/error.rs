//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use thiserror::Error;

// ── Driver errors ─────────────────────────────────────────────────────────────

/// Errors raised by machine drivers.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("driver \"{driver}\" is not supported on {os}")]
    NotSupported { driver: String, os: &'static str },

    #[error("hosts without a driver cannot be {0}")]
    NoLifecycle(&'static str),

    #[error("{0} driver has no SSH access")]
    NoSsh(&'static str),

    #[error("unknown driver \"{0}\"")]
    Unknown(String),

    #[error("{driver}: unexpected output from {command}: {output}")]
    UnexpectedOutput {
        driver: &'static str,
        command: String,
        output: String,
    },
}

// ── Host record errors ────────────────────────────────────────────────────────

/// Errors reading or writing persisted host records.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("machine \"{0}\" does not exist")]
    NotFound(String),

    #[error("decoding host metadata")]
    Metadata(#[source] serde_json::Error),

    #[error("decoding most recent host version")]
    Record(#[source] serde_json::Error),

    #[error("decoding {driver} driver payload")]
    DriverPayload {
        driver: String,
        #[source]
        source: serde_json::Error,
    },
}

// ── Node errors ───────────────────────────────────────────────────────────────

/// Driver states that have no cluster-facing node status.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Error state {0} from driver")]
    ErrorState(kmachine_common::MachineState),

    #[error("Unknown state {0:?} from driver")]
    UnknownState(String),
}

// ── Command channel errors ────────────────────────────────────────────────────

/// A command run on a machine (remote or local) did not succeed.
#[derive(Debug, Error)]
#[error("command `{command}` exited with {status}: {stderr}")]
pub struct CommandError {
    pub command: String,
    pub status: String,
    pub stderr: String,
}

// ── Provisioning errors ───────────────────────────────────────────────────────

/// Errors specific to the secure-daemon provisioning protocol.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error(
        "daemon did not become available on port {port} after {attempts} attempts.\n\
         Check the daemon logs on the machine (journalctl -u docker) and re-run provisioning."
    )]
    DaemonUnavailable {
        port: u16,
        attempts: u32,
        #[source]
        last: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("invalid daemon URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("cannot parse client version from {0:?}")]
    ClientVersion(String),
}

// ── Profile errors ────────────────────────────────────────────────────────────

/// Errors loading or saving a cluster profile.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("profile name cannot be empty")]
    EmptyName,

    #[error("profile \"{0}\" not found. Run 'kmachine start -p {0}' to create it.")]
    NotFound(String),
}

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors related to configuration key/value validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown setting: {key}\n\nValid settings: {valid}")]
    UnknownKey { key: String, valid: String },

    #[error("Invalid value for {key}: {value}\n\n{expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: String,
    },

    #[error("invalid size {value:?}: {reason}")]
    InvalidSize { value: String, reason: &'static str },
}
