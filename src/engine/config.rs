//! VitalDash Configuration Module
//! Handles loading and validating vitaldash.config.json

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = "vitaldash.config.json";
/// Longest accumulation window accepted, one year
pub const MAX_WINDOW_HOURS: u32 = 8760;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
    #[error("Failed to read config: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Invalid config format: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Invalid config value: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Length of the accumulation window
    #[serde(default = "default_window_hours")]
    pub window_hours: u32,
    /// Serve records from this JSON fixture instead of the platform service
    #[serde(default)]
    pub fixture: Option<PathBuf>,
    /// tracing filter directive, overridden by RUST_LOG
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_window_hours() -> u32 {
    24
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            window_hours: default_window_hours(),
            fixture: None,
            log_filter: default_log_filter(),
        }
    }
}

impl DashboardConfig {
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        Self::load_file(&dir.join(CONFIG_FILE_NAME))
    }

    pub fn load_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::NotFound(config_path.to_path_buf()));
        }
        let content = std::fs::read_to_string(config_path)?;
        let config: DashboardConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the per-user config directory, falling back to defaults
    pub fn load_user() -> Result<Self, ConfigError> {
        match Self::user_config_path() {
            Some(path) if path.exists() => Self::load_file(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("vitaldash").join(CONFIG_FILE_NAME))
    }

    pub fn save(&self, dir: &Path) -> Result<(), ConfigError> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_hours == 0 || self.window_hours > MAX_WINDOW_HOURS {
            return Err(ConfigError::Invalid(format!(
                "window_hours must be between 1 and {}, got {}",
                MAX_WINDOW_HOURS, self.window_hours
            )));
        }
        Ok(())
    }

    pub fn default_for_fixture(path: &Path) -> Self {
        Self {
            fixture: Some(path.to_path_buf()),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_save_load() {
        let dir = tempdir().unwrap();
        let config = DashboardConfig::default_for_fixture(Path::new("health.json"));
        config.save(dir.path()).unwrap();

        let loaded = DashboardConfig::load(dir.path()).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.window_hours, 24);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "{}").unwrap();

        let loaded = DashboardConfig::load(dir.path()).unwrap();
        assert_eq!(loaded, DashboardConfig::default());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let err = DashboardConfig::load(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_zero_window_rejected() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), r#"{ "window_hours": 0 }"#).unwrap();

        let err = DashboardConfig::load(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_oversized_window_rejected() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), r#"{ "window_hours": 4294967295 }"#).unwrap();
        let err = DashboardConfig::load(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let year = DashboardConfig {
            window_hours: MAX_WINDOW_HOURS,
            ..Default::default()
        };
        assert!(year.validate().is_ok());
    }
}
