//! Unit tests for the kmachine CLI
//!
//! These tests use mocked dependencies and a temporary store; they never
//! spawn processes or touch `~/.kmachine`.

mod architecture;
mod machine_lifecycle;
mod mocks;
mod property_tests;
mod readiness;
mod store_migration;
