//! Application configuration

use anyhow::{bail, Result};
use openair_core::{MetricKind, TemperatureUnit, ThresholdConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application-wide configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Version of the config format
    pub version: u32,
    pub poll: PollConfig,
    pub display: DisplayConfig,
    /// Severity thresholds per metric
    pub thresholds: ThresholdConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if absent
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            return Ok(Self::default());
        }

        Self::load_from_path(&config_path)
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_path()?)
    }

    /// Directory holding the config and the persisted selection
    pub fn config_dir() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("org", "openair", "openair")
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        Ok(dirs.config_dir().to_path_buf())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Load configuration from a specific file path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a specific file path
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll.interval_secs == 0 {
            bail!("poll.interval_secs must be greater than zero");
        }
        if self.poll.read_timeout_ms == 0 {
            bail!("poll.read_timeout_ms must be greater than zero");
        }
        if let Err(message) = self.thresholds.validate() {
            bail!("invalid thresholds: {}", message);
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: 1,
            poll: PollConfig::default(),
            display: DisplayConfig::default(),
            thresholds: ThresholdConfig::default(),
        }
    }
}

/// Poll schedule configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub interval_secs: u64,
    /// Per-characteristic read timeout
    pub read_timeout_ms: u64,
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: openair_core::DEFAULT_POLL_INTERVAL.as_secs(),
            read_timeout_ms: openair_core::DEFAULT_READ_TIMEOUT.as_millis() as u64,
        }
    }
}

/// Presentation settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub temperature_unit: TemperatureUnit,
    /// Metrics hidden at startup
    pub hidden_metrics: Vec<MetricKind>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use openair_core::Threshold;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.poll.interval(), Duration::from_secs(5));
        assert_eq!(config.poll.read_timeout(), Duration::from_secs(10));
        assert_eq!(config.display.temperature_unit, TemperatureUnit::Fahrenheit);
        assert!(config.display.hidden_metrics.is_empty());
        assert_eq!(
            config.thresholds.get(MetricKind::Co2),
            Some(Threshold::new(800.0, 1500.0))
        );
    }

    #[test]
    fn test_partial_file_takes_defaults() {
        let config: AppConfig = serde_json::from_str(
            r#"{ "display": { "temperature_unit": "celsius", "hidden_metrics": ["pm2_5"] } }"#,
        )
        .unwrap();

        assert_eq!(config.version, 1);
        assert_eq!(config.poll, PollConfig::default());
        assert_eq!(config.display.temperature_unit, TemperatureUnit::Celsius);
        assert_eq!(config.display.hidden_metrics, vec![MetricKind::Pm2_5]);
        assert_eq!(config.thresholds, ThresholdConfig::default());
    }

    #[test]
    fn test_save_and_load_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = AppConfig::default();
        config.poll.interval_secs = 30;
        config.thresholds.set(MetricKind::Humidity, Threshold::new(60.0, 70.0));
        config.save_to_path(&path).unwrap();

        assert_eq!(AppConfig::load_from_path(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_files_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        std::fs::write(&path, r#"{ "poll": { "interval_secs": 0 } }"#).unwrap();
        assert!(AppConfig::load_from_path(&path).is_err());

        std::fs::write(&path, r#"{ "poll": { "read_timeout_ms": 0 } }"#).unwrap();
        assert!(AppConfig::load_from_path(&path).is_err());

        std::fs::write(&path, r#"{ "thresholds": { "co2": { "lower": 900, "upper": 100 } } }"#)
            .unwrap();
        assert!(AppConfig::load_from_path(&path).is_err());

        std::fs::write(&path, "not json").unwrap();
        assert!(AppConfig::load_from_path(&path).is_err());
    }

    #[test]
    fn test_zero_read_timeout_is_rejected() {
        let mut config = AppConfig::default();
        assert!(config.validate().is_ok());

        config.poll.read_timeout_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("read_timeout_ms"), "{}", err);

        config.poll.read_timeout_ms = 1;
        assert!(config.validate().is_ok());
    }
}
