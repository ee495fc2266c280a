//! Application context: unified state passed to every command handler.
//!
//! Built once in `Cli::run()`. Holds the output context, the home layout,
//! the stores and the process runner configured from settings.

use std::time::Duration;

use anyhow::{Context, Result};

use crate::application::ports::ConfigStore;
use crate::domain::config::KmachineConfig;
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::config::YamlConfigStore;
use crate::infra::home::KmachineHome;
use crate::infra::machine::{LocalMachineClient, local_username};
use crate::infra::profile::JsonProfileStore;
use crate::output::{OutputContext, TerminalReporter};

/// Profile used when `--profile` is not given.
pub const DEFAULT_PROFILE: &str = "kmachine";

/// Flags passed from the top-level CLI to `AppContext::new`.
pub struct AppFlags {
    pub no_color: bool,
    pub quiet: bool,
    pub profile: String,
}

pub struct AppContext {
    pub output: OutputContext,
    pub home: KmachineHome,
    pub config_store: YamlConfigStore,
    pub profiles: JsonProfileStore,
    /// Active cluster profile.
    pub profile: String,
    pub settings: KmachineConfig,
    pub runner: TokioCommandRunner,
}

impl AppContext {
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined or the
    /// settings file is malformed.
    pub fn new(flags: &AppFlags) -> Result<Self> {
        let home = KmachineHome::from_env()?;
        let config_store = YamlConfigStore::new(home.config_path());
        let settings = config_store.load().context("loading settings")?;
        let runner = TokioCommandRunner::new(Duration::from_secs(settings.command_timeout));
        tracing::debug!(home = %home.root().display(), profile = %flags.profile, "app context ready");

        Ok(Self {
            output: OutputContext::new(flags.no_color, flags.quiet),
            profiles: JsonProfileStore::new(home.profiles_dir()),
            home,
            config_store,
            profile: flags.profile.clone(),
            settings,
            runner,
        })
    }

    #[must_use]
    pub fn reporter(&self) -> TerminalReporter<'_> {
        TerminalReporter::new(&self.output)
    }

    /// Machine API reporting progress to the terminal.
    #[must_use]
    pub fn machines(&self) -> LocalMachineClient<TokioCommandRunner, TerminalReporter<'_>> {
        LocalMachineClient::new(
            self.home.clone(),
            self.runner.clone(),
            self.reporter(),
            local_username(),
        )
    }
}
