//! `kmachine config`: show, get and set settings.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::app::AppContext;
use crate::application::ports::ConfigStore;
use crate::domain::config::{VALID_CONFIG_KEYS, validate_config_key, validate_config_value};

/// Config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show current settings
    Show,
    /// Print one setting
    Get {
        /// Setting key
        key: String,
    },
    /// Change one setting
    Set {
        /// Setting key
        key: String,
        /// New value
        value: String,
    },
}

/// # Errors
///
/// Returns an error if the key or value is invalid or the settings file
/// cannot be written.
pub fn run(app: &AppContext, cmd: ConfigCommand) -> Result<ExitCode> {
    match cmd {
        ConfigCommand::Show => {
            app.output
                .header(&format!("Settings ({})", app.config_store.path().display()));
            for key in VALID_CONFIG_KEYS {
                app.output
                    .kv(key, &app.settings.get(key).unwrap_or_default());
            }
        }
        ConfigCommand::Get { key } => {
            validate_config_key(&key)?;
            println!("{}", app.settings.get(&key).unwrap_or_default());
        }
        ConfigCommand::Set { key, value } => {
            validate_config_key(&key)?;
            validate_config_value(&key, &value)?;
            let mut settings = app.settings.clone();
            settings.set(&key, &value)?;
            app.config_store
                .save(&settings)
                .context("saving settings")?;
            app.output.success(&format!("Set {key} = {value}"));
        }
    }
    Ok(ExitCode::SUCCESS)
}
