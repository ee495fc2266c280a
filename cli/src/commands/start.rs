//! `kmachine start`: create or start the profile's machine and its workers.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use kmachine_common::{ClusterConfig, parse_kubernetes_version};

use crate::app::AppContext;
use crate::application::ports::{MachineApi, ProfileStore};
use crate::application::services::node::start_nodes;
use crate::domain::config::{parse_size_mb, validate_config_value};
use crate::domain::error::ProfileError;

#[derive(Args, Debug, Default)]
pub struct StartArgs {
    /// Number of worker machines to create after the primary one
    #[arg(long, default_value_t = 0)]
    pub nodes: usize,

    /// Driver for new machines (overrides settings)
    #[arg(long)]
    pub driver: Option<String>,

    #[arg(long)]
    pub cpus: Option<u32>,

    /// Memory, in MB or with a unit (e.g. 4g)
    #[arg(long, value_parser = parse_size_mb)]
    pub memory: Option<u32>,

    /// Disk size, in MB or with a unit (e.g. 20000mb, 40g)
    #[arg(long, value_parser = parse_size_mb)]
    pub disk_size: Option<u32>,

    /// Base image (multipass release or container image)
    #[arg(long)]
    pub image: Option<String>,

    /// Kubernetes version, e.g. v1.16.2
    #[arg(long)]
    pub kubernetes_version: Option<String>,
}

/// Existing profile, or a fresh one seeded from settings.
fn load_or_init(app: &AppContext) -> Result<ClusterConfig> {
    match app.profiles.load(&app.profile) {
        Ok(config) => Ok(config),
        Err(e) if matches!(e.downcast_ref::<ProfileError>(), Some(ProfileError::NotFound(_))) => {
            tracing::info!(profile = %app.profile, "creating profile");
            let mut config = ClusterConfig::default();
            config.machine_config = app.settings.machine_defaults();
            Ok(config)
        }
        Err(e) => Err(e),
    }
}

fn apply_overrides(config: &mut ClusterConfig, args: &StartArgs) -> Result<()> {
    let machine = &mut config.machine_config;
    if let Some(driver) = &args.driver {
        validate_config_value("driver", driver)?;
        machine.driver.clone_from(driver);
    }
    if let Some(cpus) = args.cpus {
        machine.cpus = cpus;
    }
    if let Some(memory) = args.memory {
        machine.memory = memory;
    }
    if let Some(disk) = args.disk_size {
        machine.disk_size = disk;
    }
    if args.image.is_some() {
        machine.image.clone_from(&args.image);
    }
    if let Some(version) = &args.kubernetes_version {
        parse_kubernetes_version(version)?;
        config.kubernetes_config.kubernetes_version.clone_from(version);
    }
    Ok(())
}

/// # Errors
///
/// Returns an error if the profile cannot be saved or any machine fails to
/// start. Worker creation stops at the first failure.
pub async fn run(app: &AppContext, args: &StartArgs) -> Result<ExitCode> {
    let mut config = load_or_init(app)?;
    apply_overrides(&mut config, args)?;
    config.machine_config.machine_name.clone_from(&app.profile);
    app.profiles
        .save(&app.profile, &config)
        .context("Error saving profile cluster configuration")?;

    let api = app.machines();
    let reporter = app.reporter();
    let primary = &config.machine_config;
    api.start_host(primary)
        .await
        .with_context(|| format!("Error starting machine {}", primary.machine_name))?;
    app.output
        .success(&format!("{} is running", primary.machine_name));

    if args.nodes > 0 {
        let started = start_nodes(&api, primary, args.nodes, &reporter).await?;
        app.output
            .success(&format!("{} worker machine(s) running", started.len()));
    }
    Ok(ExitCode::SUCCESS)
}
