//! Remote daemon configuration: engine options, service control and the
//! shell templates the provisioning protocol sends over the command channel.

use kmachine_common::ServiceAction;
use regex::Regex;

use crate::domain::error::ProvisionError;
use crate::domain::host::{AuthOptions, EngineOptions};

/// Port the TLS-secured daemon listens on when the driver URL names none.
pub const DEFAULT_ENGINE_PORT: u16 = 2376;

/// Service unit managed during provisioning.
pub const DAEMON_SERVICE: &str = "docker";

/// systemd drop-in holding the daemon flags.
pub const ENGINE_OPTIONS_PATH: &str = "/etc/systemd/system/docker.service.d/10-machine.conf";

/// Deletes the default bridge interface when present; exits 0 either way.
pub const REMOVE_BRIDGE_COMMAND: &str =
    r#"if [ ! -z "$(ip link show docker0)" ]; then sudo ip link delete docker0; fi"#;

/// Lists listening TCP sockets, preferring netstat and falling back to ss.
pub const LISTENING_SOCKETS_COMMAND: &str =
    "if ! type netstat 1>/dev/null; then ss -tln; else netstat -tln; fi";

/// Reports the daemon client version.
pub const CLIENT_VERSION_COMMAND: &str = "docker --version";

/// Generated daemon configuration: where it goes and what it says.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerOptions {
    pub engine_options: String,
    pub engine_options_path: String,
}

/// Extracts the listen port from the driver's daemon URL.
///
/// An empty URL or one without an explicit port yields [`DEFAULT_ENGINE_PORT`].
///
/// # Errors
///
/// Returns [`ProvisionError::InvalidUrl`] if the URL cannot be parsed.
pub fn engine_port(daemon_url: &str) -> Result<u16, ProvisionError> {
    if daemon_url.is_empty() {
        return Ok(DEFAULT_ENGINE_PORT);
    }
    let parsed = url::Url::parse(daemon_url).map_err(|e| ProvisionError::InvalidUrl {
        url: daemon_url.to_string(),
        reason: e.to_string(),
    })?;
    Ok(parsed.port().unwrap_or(DEFAULT_ENGINE_PORT))
}

/// Builds the systemd drop-in for the daemon.
#[must_use]
pub fn generate_docker_options(
    engine: &EngineOptions,
    auth: &AuthOptions,
    port: u16,
    driver_name: &str,
) -> DockerOptions {
    let mut flags = vec![
        format!("-H tcp://0.0.0.0:{port}"),
        "-H unix:///var/run/docker.sock".to_string(),
        "--default-ulimit=nofile=1048576:1048576".to_string(),
    ];
    if engine.tls_verify {
        flags.push("--tlsverify".to_string());
    }
    flags.push(format!("--tlscacert {}", auth.ca_cert_remote_path));
    flags.push(format!("--tlscert {}", auth.server_cert_remote_path));
    flags.push(format!("--tlskey {}", auth.server_key_remote_path));
    flags.push(format!("--label provider={driver_name}"));
    flags.extend(engine.labels.iter().map(|l| format!("--label {l}")));
    flags.extend(
        engine
            .insecure_registry
            .iter()
            .map(|r| format!("--insecure-registry {r}")),
    );
    flags.extend(
        engine
            .registry_mirror
            .iter()
            .map(|m| format!("--registry-mirror {m}")),
    );
    if !engine.storage_driver.is_empty() {
        flags.push(format!("--storage-driver {}", engine.storage_driver));
    }
    flags.extend(engine.arbitrary_flags.iter().map(|f| format!("--{f}")));

    let mut lines = vec![
        "[Unit]".to_string(),
        "After=network.target".to_string(),
        String::new(),
        "[Service]".to_string(),
        "ExecStart=".to_string(),
        format!("ExecStart=/usr/bin/dockerd {}", flags.join(" ")),
    ];
    lines.extend(engine.env.iter().map(|e| format!("Environment={e}")));
    lines.push(String::new());

    DockerOptions {
        engine_options: lines.join("\n"),
        engine_options_path: ENGINE_OPTIONS_PATH.to_string(),
    }
}

/// Wraps `value` in single quotes for a POSIX shell. Embedded quotes are
/// closed, escaped and reopened, so nothing inside is expanded.
#[must_use]
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Pipes `content` verbatim into a privileged write at `remote_path`.
#[must_use]
pub fn transfer_command(content: &str, remote_path: &str) -> String {
    format!("printf '%s' {} | sudo tee {remote_path}", shell_quote(content))
}

/// Creates the drop-in directory, then writes the options file.
#[must_use]
pub fn engine_options_command(options: &DockerOptions) -> String {
    let dir = std::path::Path::new(&options.engine_options_path)
        .parent()
        .map_or_else(|| "/".to_string(), |p| p.to_string_lossy().into_owned());
    format!(
        "sudo mkdir -p {dir} && {}",
        transfer_command(&options.engine_options, &options.engine_options_path)
    )
}

/// systemctl invocation for `action` on `service`. Start and restart
/// reload unit files first so a fresh drop-in is picked up.
#[must_use]
pub fn service_command(service: &str, action: ServiceAction) -> String {
    match action {
        ServiceAction::Start | ServiceAction::Restart => {
            format!("sudo systemctl daemon-reload && sudo systemctl -f {action} {service}")
        }
        ServiceAction::Stop => format!("sudo systemctl -f {action} {service}"),
    }
}

/// True when any non-empty line of a socket listing shows `:<port>`
/// followed by a listening address.
#[must_use]
pub fn daemon_listening(listing: &str, port: u16) -> bool {
    let Ok(pattern) = Regex::new(&format!(r":{port}\s+.*:.*")) else {
        return false;
    };
    listing
        .lines()
        .any(|line| !line.is_empty() && pattern.is_match(line))
}

/// Parses `Docker version 1.12.1, build 7a86f89` into `1.12.1`.
///
/// # Errors
///
/// Returns [`ProvisionError::ClientVersion`] for any other shape.
pub fn parse_client_version(output: &str) -> Result<String, ProvisionError> {
    let words: Vec<&str> = output.split_whitespace().collect();
    match words.as_slice() {
        ["Docker", "version", version, ..] => Ok(version.trim_end_matches(',').to_string()),
        _ => Err(ProvisionError::ClientVersion(output.to_string())),
    }
}
