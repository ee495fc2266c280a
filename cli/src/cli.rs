//! CLI argument parsing with clap derive

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::app::{AppContext, AppFlags, DEFAULT_PROFILE};
use crate::commands;

/// Local Kubernetes nodes on VMs, containers, or the bare host
#[derive(Parser, Debug)]
#[command(
    name = "kmachine",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output (also disabled by any `NO_COLOR` value)
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Debug logging on stderr (overridden by `RUST_LOG`)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Cluster profile to operate on
    #[arg(short, long, global = true, default_value = DEFAULT_PROFILE)]
    pub profile: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create or start the profile's machine
    Start(commands::start::StartArgs),

    /// Manage cluster nodes
    #[command(subcommand)]
    Node(commands::node::NodeCommand),

    /// Run a container build against a machine's daemon
    Build(commands::build::BuildArgs),

    /// Inspect cluster profiles
    #[command(subcommand)]
    Profile(commands::profile::ProfileCommand),

    /// Manage settings
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the context cannot be built or the command fails.
    pub async fn run(self) -> Result<ExitCode> {
        let Cli {
            quiet,
            no_color,
            profile,
            command,
            ..
        } = self;
        let app = AppContext::new(&AppFlags {
            no_color,
            quiet,
            profile,
        })?;
        match command {
            Command::Start(args) => commands::start::run(&app, &args).await,
            Command::Node(cmd) => commands::node::run(&app, cmd).await,
            Command::Build(args) => commands::build::run(&app, &args).await,
            Command::Profile(cmd) => commands::profile::run(&app, cmd),
            Command::Config(cmd) => commands::config::run(&app, cmd),
        }
    }
}
