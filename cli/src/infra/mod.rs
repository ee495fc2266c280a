//! Infrastructure layer: concrete implementations of application port traits.
//!
//! This module contains all I/O-performing code: process execution, machine
//! drivers, SSH and local command channels, certificates and the on-disk
//! stores under the kmachine home.
//!
//! Imports from `crate::domain` and `crate::application::ports` are allowed.
//! Imports from `crate::commands` or `crate::output` are forbidden.

pub mod certs;
pub mod command_runner;
pub mod config;
pub mod drivers;
pub mod fs;
pub mod home;
pub mod kubeadm;
pub mod machine;
pub mod profile;
pub mod ssh;
pub mod store;
