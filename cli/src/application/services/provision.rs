//! Application service: secure-daemon provisioning.
//!
//! Turns a running machine's daemon into a TLS-authenticated one listening on
//! a known port, using nothing but the command channel. Steps run strictly in
//! order; the first failure aborts and nothing is rolled back.

use anyhow::{Context, Result};
use kmachine_common::ServiceAction;

use crate::application::ports::{CertGenerator, Driver, LocalFs, ProgressReporter, ShellExecutor};
use crate::application::services::retry::{RetryPolicy, wait_for};
use crate::domain::certs::ServerCertRequest;
use crate::domain::engine::{
    CLIENT_VERSION_COMMAND, DAEMON_SERVICE, LISTENING_SOCKETS_COMMAND, REMOVE_BRIDGE_COMMAND,
    daemon_listening, engine_options_command, engine_port, generate_docker_options,
    parse_client_version, service_command, transfer_command,
};
use crate::domain::error::ProvisionError;
use crate::domain::host::HostOptions;

/// Runs the provisioning protocol over one machine's command channel.
pub struct Provisioner<'a, E, C, F> {
    shell: &'a E,
    certs: &'a C,
    fs: &'a F,
    readiness: RetryPolicy,
}

impl<'a, E, C, F> Provisioner<'a, E, C, F>
where
    E: ShellExecutor,
    C: CertGenerator,
    F: LocalFs,
{
    pub fn new(shell: &'a E, certs: &'a C, fs: &'a F) -> Self {
        Self {
            shell,
            certs,
            fs,
            readiness: RetryPolicy::DAEMON_READY,
        }
    }

    /// Overrides the readiness budget.
    #[must_use]
    pub fn with_readiness(mut self, policy: RetryPolicy) -> Self {
        self.readiness = policy;
        self
    }

    /// Applies `action` to `service` through systemctl.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote command fails.
    pub async fn service(&self, service: &str, action: ServiceAction) -> Result<()> {
        self.shell
            .exec(&service_command(service, action))
            .await
            .with_context(|| format!("{action} {service} service"))?;
        Ok(())
    }

    /// Provisions TLS for the daemon on `driver`'s machine and waits until it
    /// listens. `username` is the local user placed in the certificate
    /// organisation. Returns the daemon port. The client version is logged
    /// once the daemon listens; failing to read it only warns.
    ///
    /// # Errors
    ///
    /// Returns the first failing step's error, or
    /// [`ProvisionError::DaemonUnavailable`] if the daemon never listens.
    pub async fn configure_auth(
        &self,
        driver: &impl Driver,
        options: &HostOptions,
        username: &str,
        reporter: &impl ProgressReporter,
    ) -> Result<u16> {
        let machine = driver.machine_name();
        let auth = &options.auth_options;

        self.service(DAEMON_SERVICE, ServiceAction::Stop).await?;

        self.shell
            .exec(REMOVE_BRIDGE_COMMAND)
            .await
            .context("removing default bridge interface")?;

        let ip = driver.ip().await.context("getting machine IP")?;
        let request = ServerCertRequest::new(auth, &ip, username, machine);
        tracing::debug!(
            machine,
            cert = %request.cert_file.display(),
            org = %request.org,
            san = ?request.hosts,
            "generating server cert"
        );
        self.certs
            .generate_server_cert(&request)
            .context("generating server cert")?;

        reporter.step("Copying certs to the local machine directory...");
        for (source, file) in [
            (&auth.ca_cert_path, "ca.pem"),
            (&auth.client_cert_path, "cert.pem"),
            (&auth.client_key_path, "key.pem"),
        ] {
            self.fs
                .copy_file(source, &auth.store_path.join(file))
                .with_context(|| format!("copying {file} to machine dir"))?;
        }

        let ca_cert = self.fs.read_to_string(&auth.ca_cert_path)?;
        let server_cert = self.fs.read_to_string(&auth.server_cert_path)?;
        let server_key = self.fs.read_to_string(&auth.server_key_path)?;

        reporter.step("Copying certs to the remote machine...");
        for (content, remote) in [
            (&ca_cert, &auth.ca_cert_remote_path),
            (&server_cert, &auth.server_cert_remote_path),
            (&server_key, &auth.server_key_remote_path),
        ] {
            self.shell
                .exec(&transfer_command(content, remote))
                .await
                .with_context(|| format!("transferring {remote}"))?;
        }

        let url = driver.url().await.context("getting daemon URL")?;
        let port = engine_port(&url)?;

        let docker_options =
            generate_docker_options(&options.engine_options, auth, port, driver.driver_name());
        reporter.step("Setting Docker configuration on the remote daemon...");
        self.shell
            .exec(&engine_options_command(&docker_options))
            .await
            .context("writing engine options")?;

        self.service(DAEMON_SERVICE, ServiceAction::Start).await?;

        self.wait_for_daemon(port).await?;
        match self.client_version().await {
            Ok(version) => tracing::info!(machine, port, %version, "daemon provisioned"),
            Err(e) => {
                tracing::warn!(machine, error = %e, "client version unavailable");
                reporter.warn(&format!("Could not read the Docker version on {machine}: {e:#}"));
                tracing::info!(machine, port, "daemon provisioned");
            }
        }
        Ok(port)
    }

    /// Polls the socket listing until something listens on `port`.
    /// Returns the number of attempts used.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::DaemonUnavailable`] once the budget is spent.
    pub async fn wait_for_daemon(&self, port: u16) -> Result<u32> {
        let shell = self.shell;
        wait_for(self.readiness, |_| async move {
            let listing = shell.exec(LISTENING_SOCKETS_COMMAND).await?;
            Ok::<_, anyhow::Error>(daemon_listening(&listing, port))
        })
        .await
        .map_err(|exhausted| {
            ProvisionError::DaemonUnavailable {
                port,
                attempts: exhausted.attempts,
                last: exhausted.last.map(Into::into),
            }
            .into()
        })
    }

    /// Version of the daemon client installed on the machine.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails or prints something unexpected.
    pub async fn client_version(&self) -> Result<String> {
        let output = self.shell.exec(CLIENT_VERSION_COMMAND).await?;
        Ok(parse_client_version(&output)?)
    }
}
