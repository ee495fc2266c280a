//! Infrastructure implementation of the `ConfigStore` port.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::application::ports::ConfigStore;
use crate::domain::config::KmachineConfig;
use crate::infra::fs::write_atomic;

/// Settings kept as YAML on disk.
pub struct YamlConfigStore {
    path: PathBuf,
}

impl YamlConfigStore {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl ConfigStore for YamlConfigStore {
    fn load(&self) -> Result<KmachineConfig> {
        if !self.path.exists() {
            return Ok(KmachineConfig::default());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("cannot read {}", self.path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("cannot parse {}", self.path.display()))
    }

    fn save(&self, config: &KmachineConfig) -> Result<()> {
        let content = serde_yaml::to_string(config).context("cannot serialize config")?;
        write_atomic(&self.path, content.as_bytes())
    }

    fn path(&self) -> PathBuf {
        self.path.clone()
    }
}
