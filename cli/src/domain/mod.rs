//! Domain layer: pure logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod certs;
pub mod config;
pub mod engine;
pub mod error;
pub mod host;
pub mod node;

pub use config::{KmachineConfig, validate_config_key, validate_config_value};
pub use error::{
    CommandError, ConfigError, DriverError, HostError, NodeError, ProfileError, ProvisionError,
};
pub use host::{AuthOptions, BaseDriver, EngineOptions, Host, HostOptions, HostRecord};
