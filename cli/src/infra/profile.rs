//! Per-cluster profiles at `<home>/profiles/<cluster>/config.json`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use kmachine_common::ClusterConfig;

use crate::application::ports::ProfileStore;
use crate::domain::error::ProfileError;
use crate::infra::fs::write_atomic;

const PROFILE_FILE: &str = "config.json";

pub struct JsonProfileStore {
    profiles_dir: PathBuf,
}

impl JsonProfileStore {
    #[must_use]
    pub fn new(profiles_dir: PathBuf) -> Self {
        Self { profiles_dir }
    }
}

impl ProfileStore for JsonProfileStore {
    fn load(&self, cluster: &str) -> Result<ClusterConfig> {
        if cluster.is_empty() {
            return Err(ProfileError::EmptyName.into());
        }
        let path = self.path(cluster);
        if !path.exists() {
            return Err(ProfileError::NotFound(cluster.to_string()).into());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("reading profile {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("parsing profile {}", path.display()))
    }

    fn save(&self, cluster: &str, config: &ClusterConfig) -> Result<()> {
        if cluster.is_empty() {
            return Err(ProfileError::EmptyName.into());
        }
        let content = serde_json::to_vec_pretty(config).context("serializing profile")?;
        let path = self.path(cluster);
        tracing::debug!(profile = cluster, path = %path.display(), "saving profile");
        write_atomic(&path, &content)
    }

    fn list(&self) -> Result<Vec<(String, ClusterConfig)>> {
        let entries = match std::fs::read_dir(&self.profiles_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("reading {}", self.profiles_dir.display()));
            }
        };

        let mut profiles = Vec::new();
        for entry in entries.flatten() {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if !self.path(&name).is_file() {
                continue;
            }
            match self.load(&name) {
                Ok(config) => profiles.push((name, config)),
                Err(e) => {
                    tracing::warn!(profile = %name, error = %format!("{e:#}"), "skipping unreadable profile");
                }
            }
        }
        profiles.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(profiles)
    }

    fn path(&self, cluster: &str) -> PathBuf {
        self.profiles_dir.join(cluster).join(PROFILE_FILE)
    }
}
