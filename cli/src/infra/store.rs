//! Host record persistence at `<home>/machines/<name>/config.json`.
//!
//! Loads go through the two-pass migration; saves use an atomic write
//! (temp file + rename). Blocking file I/O runs on `spawn_blocking`.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::domain::error::HostError;
use crate::domain::host::{HostRecord, MigratedHost, migrate_host};
use crate::infra::fs::write_atomic;

const RECORD_FILE: &str = "config.json";

/// Filesystem store of host records, rooted at the machines directory.
#[derive(Debug, Clone)]
pub struct HostStore {
    machines_dir: PathBuf,
}

impl HostStore {
    #[must_use]
    pub fn new(machines_dir: PathBuf) -> Self {
        Self { machines_dir }
    }

    #[must_use]
    pub fn record_path(&self, name: &str) -> PathBuf {
        self.machines_dir.join(name).join(RECORD_FILE)
    }

    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        self.record_path(name).exists()
    }

    fn load_sync(&self, name: &str) -> Result<MigratedHost> {
        let path = self.record_path(name);
        if !path.exists() {
            return Err(HostError::NotFound(name.to_string()).into());
        }
        let data =
            std::fs::read(&path).with_context(|| format!("reading host {}", path.display()))?;
        let migrated =
            migrate_host(&data).with_context(|| format!("loading host {}", path.display()))?;
        tracing::debug!(
            machine = name,
            driver = %migrated.record.driver_name,
            config_version = migrated.record.config_version,
            "loaded host record"
        );
        Ok(migrated)
    }

    fn save_sync(&self, record: &HostRecord) -> Result<()> {
        let path = self.record_path(&record.name);
        let content = record.encode().context("serializing host record")?;
        write_atomic(&path, &content)
    }

    fn remove_sync(&self, name: &str) -> Result<()> {
        let dir = self.machines_dir.join(name);
        if dir.exists() {
            std::fs::remove_dir_all(&dir)
                .with_context(|| format!("removing {}", dir.display()))?;
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`HostError::NotFound`] when no record exists, or a decode
    /// error when it is malformed.
    pub async fn load(&self, name: &str) -> Result<MigratedHost> {
        let store = self.clone();
        let name = name.to_string();
        tokio::task::spawn_blocking(move || store.load_sync(&name))
            .await
            .context("host load task panicked")?
    }

    /// # Errors
    ///
    /// Returns an error if the record cannot be written.
    pub async fn save(&self, record: HostRecord) -> Result<()> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.save_sync(&record))
            .await
            .context("host save task panicked")?
    }

    /// Deletes the machine directory, record and credentials included.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be removed.
    pub async fn remove(&self, name: &str) -> Result<()> {
        let store = self.clone();
        let name = name.to_string();
        tokio::task::spawn_blocking(move || store.remove_sync(&name))
            .await
            .context("host remove task panicked")?
    }
}
