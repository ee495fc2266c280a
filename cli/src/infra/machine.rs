//! Local machine client: the production `MachineApi`.
//!
//! Ties the host store, driver registry, certificate authority and
//! provisioner together. Everything runs in-process; drivers shell out to
//! their backend CLIs through the shared `CommandRunner`.

use std::path::Path;

use anyhow::{Context, Result};
use kmachine_common::{MachineConfig, MachineState};

use crate::application::ports::{CommandRunner, Driver, MachineApi, ProgressReporter};
use crate::application::services::provision::Provisioner;
use crate::domain::host::{
    AuthOptions, CURRENT_CONFIG_VERSION, EngineOptions, Host, HostOptions, HostRecord,
};
use crate::infra::certs::{CaPaths, RcgenCertGenerator, ensure_ca};
use crate::infra::drivers::AnyDriver;
use crate::infra::fs::StdFs;
use crate::infra::home::KmachineHome;
use crate::infra::ssh::{LocalExecutor, NodeRunner, SshExecutor, SshTarget};
use crate::infra::store::HostStore;

/// Local user name for certificate organisations: `$USER`, `$USERNAME`,
/// or `kmachine` when neither is set.
#[must_use]
pub fn local_username() -> String {
    ["USER", "USERNAME"]
        .into_iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| "kmachine".to_string())
}

/// Host options for a new machine.
#[must_use]
pub fn host_options(config: &MachineConfig, certs_dir: &Path, machine_dir: &Path) -> HostOptions {
    HostOptions {
        driver: config.driver.clone(),
        memory: config.memory,
        disk: config.disk_size,
        engine_options: EngineOptions {
            env: config.docker_env.clone(),
            insecure_registry: config.insecure_registry.clone(),
            registry_mirror: config.registry_mirror.clone(),
            labels: vec![format!("provider={}", config.driver)],
            ..EngineOptions::default()
        },
        auth_options: AuthOptions::new(certs_dir, machine_dir),
    }
}

pub struct LocalMachineClient<R, P> {
    home: KmachineHome,
    store: HostStore,
    runner: R,
    reporter: P,
    username: String,
}

impl<R, P> LocalMachineClient<R, P>
where
    R: CommandRunner + Clone,
    P: ProgressReporter,
{
    pub fn new(home: KmachineHome, runner: R, reporter: P, username: String) -> Self {
        let store = HostStore::new(home.machines_dir());
        Self {
            home,
            store,
            runner,
            reporter,
            username,
        }
    }

    async fn create_host(&self, config: &MachineConfig) -> Result<Host<AnyDriver<R>>> {
        let name = &config.machine_name;
        let machine_dir = self.home.machine_dir(name);
        let mut driver = AnyDriver::for_new_machine(config, self.home.root(), self.runner.clone())?;
        let options = host_options(config, &self.home.certs_dir(), &machine_dir);

        self.reporter
            .step(&format!("Creating {} machine {name}...", config.driver));
        driver
            .create()
            .await
            .with_context(|| format!("Error creating machine {name}"))?;
        let host = Host::new(name, driver, options);
        // Saved before provisioning so a half-provisioned machine can still
        // be found, stopped and removed.
        self.save(&host).await?;

        if !host.driver.is_local() {
            self.provision(&host).await?;
        }
        Ok(host)
    }

    async fn provision(&self, host: &Host<AnyDriver<R>>) -> Result<()> {
        let org = self.username.clone();
        let ca = CaPaths::in_dir(&self.home.certs_dir());
        tokio::task::spawn_blocking(move || ensure_ca(&ca, &org))
            .await
            .context("CA task panicked")??;

        let shell = self.runner(host).await?;
        let provisioner = Provisioner::new(&shell, &RcgenCertGenerator, &StdFs);
        self.reporter.step("Provisioning the container daemon...");
        provisioner
            .configure_auth(
                &host.driver,
                &host.host_options,
                &self.username,
                &self.reporter,
            )
            .await
            .with_context(|| format!("Error provisioning {}", host.name))?;
        Ok(())
    }
}

impl<R, P> MachineApi for LocalMachineClient<R, P>
where
    R: CommandRunner + Clone,
    P: ProgressReporter,
{
    type Driver = AnyDriver<R>;
    type Runner = NodeRunner<R>;

    async fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.store.exists(name))
    }

    async fn load(&self, name: &str) -> Result<Host<AnyDriver<R>>> {
        let migrated = self.store.load(name).await?;
        let record = migrated.record;
        let driver = AnyDriver::resolve(
            &record.driver_name,
            &record.name,
            record.driver.as_deref(),
            &migrated.metadata.store_path,
            self.runner.clone(),
        )
        .with_context(|| format!("loading driver for {name}"))?;
        Ok(Host::new(&record.name, driver, record.host_options))
    }

    async fn start_host(&self, config: &MachineConfig) -> Result<Host<AnyDriver<R>>> {
        let name = &config.machine_name;
        if !self.store.exists(name) {
            return self.create_host(config).await;
        }

        tracing::info!(machine = %name, "machine exists, starting it");
        let mut host = self.load(name).await?;
        let state = host.driver.state().await?;
        if state == MachineState::Running {
            self.reporter.success(&format!("{name} is already running"));
            return Ok(host);
        }
        self.reporter.step(&format!("Starting machine {name}..."));
        host.driver
            .start()
            .await
            .with_context(|| format!("Error starting machine {name}"))?;
        self.save(&host).await?;
        Ok(host)
    }

    async fn save(&self, host: &Host<AnyDriver<R>>) -> Result<()> {
        let record = HostRecord {
            config_version: CURRENT_CONFIG_VERSION,
            driver: Some(host.driver.to_payload()?),
            driver_name: host.driver.driver_name().to_string(),
            host_options: host.host_options.clone(),
            name: host.name.clone(),
        };
        self.store.save(record).await
    }

    async fn remove(&self, name: &str) -> Result<()> {
        let host = self.load(name).await?;
        host.driver
            .remove()
            .await
            .with_context(|| format!("Error removing machine {name}"))?;
        self.store.remove(name).await
    }

    async fn runner(&self, host: &Host<AnyDriver<R>>) -> Result<NodeRunner<R>> {
        if host.driver.is_local() {
            return Ok(NodeRunner::Local(LocalExecutor::new(self.runner.clone())));
        }
        let target = SshTarget {
            host: host.driver.ssh_hostname().await?,
            port: host.driver.ssh_port().await?,
            user: host.driver.ssh_username(),
            key_path: host.driver.ssh_key_path(),
        };
        Ok(NodeRunner::Ssh(SshExecutor::new(self.runner.clone(), target)))
    }
}
