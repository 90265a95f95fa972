//! Persisted CLI settings

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use ik_comm::ConnectionSpec;
use ik_protocol::Cc1Limits;
use ik_sim::VirtualCc1Config;
use serde::{Deserialize, Serialize};

/// Settings read from `instrumentkit/settings.json`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Instrument used when `--connect` is not given
    pub connection: Option<ConnectionSpec>,
    /// Read timeout in seconds, transport default when unset
    pub timeout_secs: Option<f64>,
    /// Bounds applied to CC1 settings
    pub cc1_limits: Cc1Limits,
    /// Virtual counter used by `--simulate`; the firmware is taken from the flag
    pub simulator: VirtualCc1Config,
}

impl Settings {
    /// Platform config directory, e.g. `~/.config/instrumentkit` on Linux
    fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("instrumentkit"))
    }

    /// Get the settings file path
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.json"))
    }

    /// Load settings from disk, falling back to defaults
    ///
    /// A missing file is not an error; a malformed one is.
    pub fn load() -> anyhow::Result<Self> {
        match Self::settings_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Malformed settings in {}", path.display()))
    }

    /// Save settings to the platform config directory
    pub fn save(&self) -> anyhow::Result<PathBuf> {
        let path = Self::settings_path().context("Could not determine settings path")?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write settings to {}", path.display()))?;
        Ok(())
    }

    /// Configured timeout, if any
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs
            .filter(|s| s.is_finite() && *s > 0.0)
            .map(Duration::from_secs_f64)
    }
}
