//! Daemon readiness polling: attempt counts and elapsed time with a paused
//! clock.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::cell::Cell;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use kmachine_cli::application::ports::{CertGenerator, LocalFs, ShellExecutor};
use kmachine_cli::application::services::provision::Provisioner;
use kmachine_cli::domain::certs::ServerCertRequest;
use kmachine_cli::domain::engine::LISTENING_SOCKETS_COMMAND;
use kmachine_cli::domain::error::ProvisionError;

/// Socket listing that shows the daemon from attempt `ready_at` onwards.
struct Listing {
    ready_at: Option<u32>,
    calls: Cell<u32>,
}

impl Listing {
    fn ready_at(attempt: u32) -> Self {
        Self {
            ready_at: Some(attempt),
            calls: Cell::new(0),
        }
    }

    fn never() -> Self {
        Self {
            ready_at: None,
            calls: Cell::new(0),
        }
    }
}

impl ShellExecutor for Listing {
    async fn exec(&self, command: &str) -> Result<String> {
        assert_eq!(command, LISTENING_SOCKETS_COMMAND);
        let n = self.calls.get() + 1;
        self.calls.set(n);
        match self.ready_at {
            Some(at) if n >= at => Ok("tcp 0 0 0.0.0.0:2376 0.0.0.0:* LISTEN\n".to_string()),
            _ => Ok("tcp 0 0 127.0.0.1:22 0.0.0.0:* LISTEN\n".to_string()),
        }
    }
}

struct NoCerts;

impl CertGenerator for NoCerts {
    fn generate_server_cert(&self, _: &ServerCertRequest) -> Result<()> {
        anyhow::bail!("not used")
    }
}

struct NoFs;

impl LocalFs for NoFs {
    fn copy_file(&self, _: &Path, _: &Path) -> Result<()> {
        anyhow::bail!("not used")
    }
    fn read_to_string(&self, _: &Path) -> Result<String> {
        anyhow::bail!("not used")
    }
}

#[tokio::test(start_paused = true)]
async fn ready_after_k_failures_uses_k_plus_one_attempts() {
    for k in [0u32, 1, 4, 9] {
        let shell = Listing::ready_at(k + 1);
        let used = Provisioner::new(&shell, &NoCerts, &NoFs)
            .wait_for_daemon(2376)
            .await
            .expect("ready");
        assert_eq!(used, k + 1);
        assert_eq!(shell.calls.get(), k + 1);
    }
}

#[tokio::test(start_paused = true)]
async fn never_ready_gives_up_after_ten_attempts_and_thirty_seconds() {
    let shell = Listing::never();
    let start = tokio::time::Instant::now();
    let err = Provisioner::new(&shell, &NoCerts, &NoFs)
        .wait_for_daemon(2376)
        .await
        .unwrap_err();

    assert_eq!(shell.calls.get(), 10);
    assert_eq!(start.elapsed(), Duration::from_secs(30));
    match err.downcast_ref::<ProvisionError>() {
        Some(ProvisionError::DaemonUnavailable { port, attempts, last }) => {
            assert_eq!(*port, 2376);
            assert_eq!(*attempts, 10);
            assert!(last.is_none());
        }
        other => panic!("expected DaemonUnavailable, got {other:?}"),
    }
}
