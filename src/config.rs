//! Configuration loading with a fallback chain.
//!
//! Explicit path -> `~/.config/punchr/punchr.yml` -> `./punchr.yml` ->
//! built-in defaults.

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub work: WorkConfig,
    pub reminders: ReminderConfig,
    pub portal: PortalConfig,
    pub storage: StorageConfig,
}

/// Work-hours policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkConfig {
    /// Required EFFECTIVE work hours per day (actual work time, not gross).
    pub required_hours: u32,
    /// Extra minutes after required hours before the auto clock-out fires.
    pub auto_clockout_buffer_minutes: u32,
}

impl WorkConfig {
    /// Required effective work time in minutes.
    pub fn required_minutes(&self) -> u32 {
        self.required_hours * 60
    }
}

impl Default for WorkConfig {
    fn default() -> Self {
        Self {
            required_hours: 8,
            auto_clockout_buffer_minutes: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReminderConfig {
    /// How often to re-notify after an early clock-out (minutes).
    pub early_interval_minutes: f64,
    /// How often to remind a clocked-out user to clock back in (minutes).
    pub idle_interval_minutes: f64,
    /// Interval of the low-frequency reconciliation tick (minutes).
    pub periodic_check_minutes: f64,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            early_interval_minutes: 3.0,
            idle_interval_minutes: 2.0,
            periodic_check_minutes: 5.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// URL pattern used to locate open portal pages.
    pub url_pattern: String,
    /// URL opened when an auto clock-out finds no portal page.
    pub open_url: String,
    /// Pause between clock-out step 1 and step 2 (milliseconds).
    pub settle_delay_ms: u64,
    /// How long a freshly opened page gets to load before the retry
    /// (milliseconds).
    pub page_load_delay_ms: u64,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            url_pattern: "https://*.hrportal.example/*".to_string(),
            open_url: "https://app.hrportal.example/#/me/attendance/logs".to_string(),
            settle_delay_ms: 2000,
            page_load_delay_ms: 3000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the sqlite store.
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("punchr"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            work: WorkConfig::default(),
            reminders: ReminderConfig::default(),
            portal: PortalConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path)
                .context(format!("Failed to load config from {}", path.display()));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let project_name = env!("CARGO_PKG_NAME");
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.work.required_hours, 8);
        assert_eq!(config.work.required_minutes(), 480);
        assert_eq!(config.work.auto_clockout_buffer_minutes, 1);
        assert_eq!(config.reminders.early_interval_minutes, 3.0);
        assert_eq!(config.reminders.idle_interval_minutes, 2.0);
    }

    #[test]
    fn test_required_minutes_derived_from_hours() {
        let work = WorkConfig { required_hours: 9, ..Default::default() };
        assert_eq!(work.required_minutes(), 540);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config: Config = serde_yaml::from_str("work:\n  required_hours: 10\n").unwrap();
        assert_eq!(config.work.required_minutes(), 600);
        // Untouched sections keep defaults
        assert_eq!(config.reminders.periodic_check_minutes, 5.0);
        assert_eq!(config.portal.settle_delay_ms, 2000);
    }

    #[test]
    fn test_load_missing_file_is_error() {
        let path = PathBuf::from("/nonexistent/punchr.yml");
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_config_round_trips_through_yaml() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let back: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.work.required_hours, config.work.required_hours);
        assert_eq!(back.portal.url_pattern, config.portal.url_pattern);
    }
}
