use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::GuardError;

/// Engine configuration: thresholds, poll interval, and target process name.
///
/// Loaded from the settings store at startup and immutable for the lifetime
/// of one engine instance; changes go through an explicit reconfigure that
/// replaces the whole value between cycles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardianConfig {
    /// CPU utilization (%) at or above which the target gets throttled
    #[serde(default = "default_cpu_throttle")]
    pub cpu_throttle_threshold: f32,
    /// CPU utilization (%) at or below which a throttled target recovers
    #[serde(default = "default_cpu_recovery")]
    pub cpu_recovery_threshold: f32,
    /// GPU utilization (%) at or above which the target gets throttled
    #[serde(default = "default_gpu_throttle")]
    pub gpu_throttle_threshold: f32,
    /// GPU utilization (%) at or below which a throttled target recovers
    #[serde(default = "default_gpu_recovery")]
    pub gpu_recovery_threshold: f32,
    /// Poll interval for the sampling/decision loop
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Name of the process under management (first case-insensitive substring match)
    #[serde(default = "default_target")]
    pub target_process_name: String,
}

fn default_cpu_throttle() -> f32 {
    90.0
}

fn default_cpu_recovery() -> f32 {
    75.0
}

fn default_gpu_throttle() -> f32 {
    90.0
}

fn default_gpu_recovery() -> f32 {
    75.0
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_target() -> String {
    "vivaldi".to_string()
}

impl Default for GuardianConfig {
    fn default() -> Self {
        Self {
            cpu_throttle_threshold: default_cpu_throttle(),
            cpu_recovery_threshold: default_cpu_recovery(),
            gpu_throttle_threshold: default_gpu_throttle(),
            gpu_recovery_threshold: default_gpu_recovery(),
            poll_interval_ms: default_poll_interval(),
            target_process_name: default_target(),
        }
    }
}

impl GuardianConfig {
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(GuardianConfig::default());
        }

        let data = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        // If the file is empty or corrupted, return default config
        // (this can happen when the config format changes)
        if data.trim().is_empty() {
            return Ok(GuardianConfig::default());
        }

        Ok(serde_json::from_str(&data).unwrap_or_default())
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;
        self.save_to(&config_path)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let data =
            serde_json::to_string_pretty(self).with_context(|| "Failed to serialize config")?;

        fs::write(config_path, data)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        Ok(())
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().with_context(|| "Could not determine config directory")?;

        Ok(config_dir.join("resguard").join("config.json"))
    }

    /// Validate the hysteresis gap and loop parameters.
    ///
    /// Recovery thresholds must sit strictly below their throttle thresholds,
    /// otherwise the state machine would oscillate at the boundary. Only
    /// startup (or an explicit reconfigure) calls this; a running loop never
    /// sees an invalid config.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.cpu_recovery_threshold >= self.cpu_throttle_threshold {
            return Err(GuardError::invalid_config(format!(
                "CPU recovery threshold ({}) must be strictly below throttle threshold ({})",
                self.cpu_recovery_threshold, self.cpu_throttle_threshold
            )));
        }
        if self.gpu_recovery_threshold >= self.gpu_throttle_threshold {
            return Err(GuardError::invalid_config(format!(
                "GPU recovery threshold ({}) must be strictly below throttle threshold ({})",
                self.gpu_recovery_threshold, self.gpu_throttle_threshold
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(GuardError::invalid_config(
                "Poll interval must be positive",
            ));
        }
        if self.target_process_name.trim().is_empty() {
            return Err(GuardError::invalid_config(
                "Target process name must not be empty",
            ));
        }
        Ok(())
    }
}
