//! Command implementations

pub mod build;
pub mod config;
pub mod node;
pub mod profile;
pub mod start;
