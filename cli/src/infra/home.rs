//! Local store layout under `~/.kmachine`.

use std::path::{Path, PathBuf};

use anyhow::Result;

/// Root of all local state: settings, profiles, machines and certificates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KmachineHome {
    root: PathBuf,
}

impl KmachineHome {
    /// `$KMACHINE_HOME`, or `~/.kmachine`.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn from_env() -> Result<Self> {
        if let Some(val) = std::env::var_os("KMACHINE_HOME").filter(|v| !v.is_empty()) {
            return Ok(Self::new(PathBuf::from(val)));
        }
        let home =
            dirs::home_dir().ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
        Ok(Self::new(home.join(".kmachine")))
    }

    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn machines_dir(&self) -> PathBuf {
        self.root.join("machines")
    }

    #[must_use]
    pub fn machine_dir(&self, name: &str) -> PathBuf {
        self.machines_dir().join(name)
    }

    #[must_use]
    pub fn profiles_dir(&self) -> PathBuf {
        self.root.join("profiles")
    }

    #[must_use]
    pub fn certs_dir(&self) -> PathBuf {
        self.root.join("certs")
    }

    /// Settings file, `$KMACHINE_CONFIG` when set.
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        match std::env::var_os("KMACHINE_CONFIG").filter(|v| !v.is_empty()) {
            Some(val) => PathBuf::from(val),
            None => self.root.join("config.yaml"),
        }
    }
}
