//! `kmachine build`: run the container build client against a machine.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::build::run_build;

const DEFAULT_BUILD_BINARY: &str = "docker";

#[derive(Args, Debug, Default)]
pub struct BuildArgs {
    /// Build client to run (default: `docker` from PATH)
    #[arg(long)]
    pub docker_binary: Option<PathBuf>,

    /// Machine whose daemon receives the build (default: the profile's)
    #[arg(long)]
    pub machine: Option<String>,

    /// Arguments passed to `build`
    #[arg(last = true)]
    pub args: Vec<String>,
}

/// Build client path: an explicit path must exist, otherwise `docker` is
/// looked up on PATH at spawn time.
fn build_binary(args: &BuildArgs) -> Result<String> {
    match &args.docker_binary {
        Some(path) => {
            anyhow::ensure!(
                path.exists(),
                "build client {} does not exist",
                path.display()
            );
            Ok(path.to_string_lossy().into_owned())
        }
        None => Ok(DEFAULT_BUILD_BINARY.to_string()),
    }
}

/// Exit status of the child, clamped into a process exit code.
fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

/// # Errors
///
/// Returns an error if the machine cannot be reached or the build client
/// cannot be spawned. A failing build is reported through the exit code.
pub async fn run(app: &AppContext, args: &BuildArgs) -> Result<ExitCode> {
    let binary = build_binary(args)?;
    let machine = args.machine.as_deref().unwrap_or(&app.profile);
    let api = app.machines();
    let code = run_build(&api, &app.runner, machine, &binary, &args.args).await?;
    Ok(exit_code(code))
}
