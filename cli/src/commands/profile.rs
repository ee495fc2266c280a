//! `kmachine profile`: inspect cluster profiles.

use std::process::ExitCode;

use anyhow::Result;
use clap::Subcommand;
use kmachine_common::ClusterConfig;

use crate::app::AppContext;
use crate::application::ports::ProfileStore;

#[derive(Subcommand, Debug)]
pub enum ProfileCommand {
    /// List profiles with their machine settings
    List,
}

fn summary(config: &ClusterConfig) -> String {
    let machine = &config.machine_config;
    format!(
        "driver={} cpus={} memory={}MB disk={}MB nodes={}",
        machine.driver,
        machine.cpus,
        machine.memory,
        machine.disk_size,
        config.nodes.len()
    )
}

/// # Errors
///
/// Returns an error if the profiles directory cannot be read.
pub fn run(app: &AppContext, cmd: ProfileCommand) -> Result<ExitCode> {
    match cmd {
        ProfileCommand::List => {
            let profiles = app.profiles.list()?;
            if profiles.is_empty() {
                app.output
                    .warn("No profiles found. Run 'kmachine start' to create one.");
                return Ok(ExitCode::SUCCESS);
            }
            app.output.header("Profiles");
            for (name, config) in &profiles {
                let marker = if *name == app.profile { "*" } else { " " };
                app.output.kv(&format!("{marker} {name}"), &summary(config));
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}
