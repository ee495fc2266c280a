//! Integration tests for the kmachine CLI
//!
//! These tests spawn the actual binary with `KMACHINE_HOME` pointed at a
//! temporary directory.

mod cli_tests;
mod config_command;
mod node_command;
mod profile_command;
