//! Domain types and validators for kmachine settings.
//!
//! Pure functions only. No I/O or async.

use std::sync::LazyLock;

use anyhow::Result;
use kmachine_common::MachineConfig;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;

// ── Constants ────────────────────────────────────────────────────────────────

pub const VALID_CONFIG_KEYS: &[&str] = &["driver", "cpus", "memory", "disk-size", "command-timeout"];

/// Drivers that can be selected as the default.
pub const SELECTABLE_DRIVERS: &[&str] = &["none", "multipass", "docker"];

const MIB: u64 = 1024 * 1024;

/// A number with an optional binary unit: `4g`, `1.5GiB`, `20000mb`, `512 MB`.
static SIZE_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"(?i)^(\d+)(?:\.(\d+))? ?([kmgtp])?i?b?$").expect("valid regex")
});

// ── Config schema ────────────────────────────────────────────────────────────

/// Settings stored in `~/.kmachine/config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct KmachineConfig {
    /// Default driver for new machines.
    pub driver: String,
    pub cpus: u32,
    /// Memory in MB.
    pub memory: u32,
    /// Disk size in MB.
    pub disk_size: u32,
    /// Timeout for driver CLI calls, in seconds.
    pub command_timeout: u64,
}

impl Default for KmachineConfig {
    fn default() -> Self {
        let machine = MachineConfig::default();
        Self {
            driver: machine.driver,
            cpus: machine.cpus,
            memory: machine.memory,
            disk_size: machine.disk_size,
            command_timeout: 60,
        }
    }
}

impl KmachineConfig {
    /// Current value of `key`, or `None` if the key is unknown.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "driver" => Some(self.driver.clone()),
            "cpus" => Some(self.cpus.to_string()),
            "memory" => Some(self.memory.to_string()),
            "disk-size" => Some(self.disk_size.to_string()),
            "command-timeout" => Some(self.command_timeout.to_string()),
            _ => None,
        }
    }

    /// Validates and applies `key = value`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value is invalid.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        validate_config_key(key)?;
        validate_config_value(key, value)?;
        match key {
            "driver" => self.driver = value.to_string(),
            "cpus" => self.cpus = parse_positive(key, value)?,
            "memory" => self.memory = parse_size(key, value)?,
            "disk-size" => self.disk_size = parse_size(key, value)?,
            "command-timeout" => self.command_timeout = u64::from(parse_positive(key, value)?),
            _ => {}
        }
        Ok(())
    }

    /// Machine template seeded from these settings.
    #[must_use]
    pub fn machine_defaults(&self) -> MachineConfig {
        MachineConfig {
            driver: self.driver.clone(),
            cpus: self.cpus,
            memory: self.memory,
            disk_size: self.disk_size,
            ..MachineConfig::default()
        }
    }
}

// ── Validators ───────────────────────────────────────────────────────────────

/// Validates a configuration key against the whitelist.
///
/// # Errors
///
/// Returns an error if the key is not in the allowed list.
pub fn validate_config_key(key: &str) -> Result<()> {
    if !VALID_CONFIG_KEYS.contains(&key) {
        return Err(ConfigError::UnknownKey {
            key: key.to_string(),
            valid: VALID_CONFIG_KEYS.join(", "),
        }
        .into());
    }
    Ok(())
}

/// Validates a configuration value for the given key.
///
/// # Errors
///
/// Returns an error if the value is not valid for the key.
pub fn validate_config_value(key: &str, value: &str) -> Result<()> {
    match key {
        "driver" if !SELECTABLE_DRIVERS.contains(&value) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            expected: format!("Valid drivers: {}", SELECTABLE_DRIVERS.join(", ")),
        }
        .into()),
        "cpus" | "command-timeout" => parse_positive(key, value).map(|_| ()),
        "memory" | "disk-size" => parse_size(key, value).map(|_| ()),
        _ => Ok(()),
    }
}

fn parse_positive(key: &str, value: &str) -> Result<u32> {
    match value.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            expected: "Expected a positive integer.".to_string(),
        }
        .into()),
    }
}

/// Parses a human-readable size into whole MB.
///
/// A bare integer is taken as MB. Otherwise units are binary and
/// case-insensitive (`k`, `m`, `g`, `t`, `p`, each optionally followed by
/// `i` and `b`); a number with no unit is bytes. Fractions are allowed and
/// the result is truncated to whole MB.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidSize`] for malformed input, a size below
/// 1 MB, or one that does not fit in `u32` MB.
pub fn parse_size_mb(value: &str) -> Result<u32, ConfigError> {
    let invalid = |reason| ConfigError::InvalidSize {
        value: value.to_string(),
        reason,
    };
    let trimmed = value.trim();
    if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return match trimmed.parse::<u32>() {
            Ok(0) => Err(invalid("must be at least 1 MB")),
            Ok(mb) => Ok(mb),
            Err(_) => Err(invalid("too large")),
        };
    }

    let caps = SIZE_RE
        .captures(trimmed)
        .ok_or_else(|| invalid("expected a number with an optional unit, e.g. 4g or 20000mb"))?;
    let exponent = match caps.get(3).map(|m| m.as_str().to_ascii_lowercase()).as_deref() {
        None => 0,
        Some("k") => 1,
        Some("m") => 2,
        Some("g") => 3,
        Some("t") => 4,
        _ => 5,
    };
    let multiplier = 1024u64.pow(exponent);

    let whole: u64 = caps[1].parse().map_err(|_| invalid("too large"))?;
    let mut bytes = whole.checked_mul(multiplier).ok_or_else(|| invalid("too large"))?;
    if let Some(fraction) = caps.get(2) {
        // Digits beyond 1024^5 precision cannot change the truncated result.
        let digits = &fraction.as_str()[..fraction.as_str().len().min(15)];
        let scale = 10u64.pow(u32::try_from(digits.len()).unwrap_or(15));
        let numerator: u64 = digits.parse().map_err(|_| invalid("too large"))?;
        let part = u128::from(numerator) * u128::from(multiplier) / u128::from(scale);
        bytes = u64::try_from(part)
            .ok()
            .and_then(|part| bytes.checked_add(part))
            .ok_or_else(|| invalid("too large"))?;
    }

    match u32::try_from(bytes / MIB) {
        Ok(0) => Err(invalid("must be at least 1 MB")),
        Ok(mb) => Ok(mb),
        Err(_) => Err(invalid("too large")),
    }
}

fn parse_size(key: &str, value: &str) -> Result<u32> {
    parse_size_mb(value).map_err(|_| {
        ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            expected: "Expected MB or a size such as 4g or 20000mb.".to_string(),
        }
        .into()
    })
}

// ── Unit tests ───────────────────────────────────────────────────────────────
