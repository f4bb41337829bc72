use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::platform::common::{atomic_write, restrict_to_owner};
use crate::screen_time::core::EngineSettings;
use crate::screen_time::profile::DEFAULT_RESTRICTED_PROFILE;

/// Enforcer configuration (TOML)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub enforcement: EnforcementConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the profile, usage and session tables live
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Usage accrues one minute per tick
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,

    /// Countdown between a violation and the device lock
    #[serde(default = "default_countdown")]
    pub countdown_secs: u32,

    /// Profile the device falls back to on startup and display off
    #[serde(default = "default_profile_name")]
    pub default_profile: String,

    /// Assume the display is on until told otherwise
    #[serde(default = "default_true")]
    pub assume_display_on: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EnforcementConfig {
    #[serde(default)]
    pub action: LockAction,
}

/// Action taken when a countdown completes
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LockAction {
    /// Lock the session
    #[default]
    Lock,
    /// Log out the user
    Logout,
    /// Power off the device
    Shutdown,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_tick_interval() -> u64 {
    60
}

fn default_countdown() -> u32 {
    10
}

fn default_profile_name() -> String {
    DEFAULT_RESTRICTED_PROFILE.to_string()
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval(),
            countdown_secs: default_countdown(),
            default_profile: default_profile_name(),
            assume_display_on: default_true(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl EngineConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn settings(&self) -> EngineSettings {
        EngineSettings {
            countdown_secs: self.countdown_secs,
            default_profile: self.default_profile.clone(),
            initial_display_on: self.assume_display_on,
        }
    }
}

impl StorageConfig {
    /// Configured data directory, or the platform default
    pub fn resolve_data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => get_default_data_dir(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: AppConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration, using defaults if the file does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        Self::load(path)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let toml = toml::to_string_pretty(self).context("Failed to serialize config")?;

        atomic_write(path, toml.as_bytes())
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        restrict_to_owner(path)?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.engine.tick_interval_secs == 0 {
            anyhow::bail!("Tick interval must be at least 1 second");
        }

        if !(1..=60).contains(&self.engine.countdown_secs) {
            anyhow::bail!(
                "Countdown must be between 1 and 60 seconds (got: {})",
                self.engine.countdown_secs
            );
        }

        if self.engine.default_profile.trim().is_empty() {
            anyhow::bail!("Default profile name cannot be empty");
        }

        if self.engine.tick_interval_secs != 60 {
            tracing::warn!(
                "Tick interval is {}s; usage is still counted in whole minutes per tick",
                self.engine.tick_interval_secs
            );
        }

        Ok(())
    }
}

/// Get the platform-specific config file path
pub fn get_config_path() -> Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        Ok(PathBuf::from("/etc/screen-limit/config.toml"))
    }

    #[cfg(target_os = "macos")]
    {
        Ok(PathBuf::from(
            "/Library/Application Support/screen-limit/config.toml",
        ))
    }

    #[cfg(target_os = "windows")]
    {
        let mut path = PathBuf::from(
            std::env::var("ProgramData").unwrap_or_else(|_| "C:\\ProgramData".to_string()),
        );
        path.push("screen-limit");
        path.push("config.toml");
        Ok(path)
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        anyhow::bail!("Unsupported operating system");
    }
}

/// Get the platform-specific data directory
pub fn get_default_data_dir() -> Result<PathBuf> {
    #[cfg(target_os = "linux")]
    let system_dir = PathBuf::from("/var/lib/screen-limit");

    #[cfg(target_os = "macos")]
    let system_dir = PathBuf::from("/Library/Application Support/screen-limit");

    #[cfg(target_os = "windows")]
    let system_dir = {
        let mut path = PathBuf::from(
            std::env::var("ProgramData").unwrap_or_else(|_| "C:\\ProgramData".to_string()),
        );
        path.push("screen-limit");
        path
    };

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    let system_dir = PathBuf::from("screen-limit");

    // System location if it is set up, otherwise a per-user directory
    if system_dir.exists() {
        return Ok(system_dir);
    }

    if let Some(dirs) = directories::ProjectDirs::from("", "", "screen-limit") {
        return Ok(dirs.data_local_dir().to_path_buf());
    }

    Ok(system_dir)
}
