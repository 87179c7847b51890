//! `jobs.toml` loading.

use anatomist::PassSelection;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File looked up in the workspace root when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "jobs.toml";

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Write the document to disk after an accepted job is applied.
    pub save_on_accept: bool,
    /// Fallback filter when `RUST_LOG` is unset.
    pub log_level: String,
    pub passes: PassSelection,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            save_on_accept: true,
            log_level: "warn".to_string(),
            passes: PassSelection::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    /// Returns an error if the TOML is invalid or `log_level` is not a level
    /// name.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        if !LOG_LEVELS.contains(&config.log_level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "unknown log_level `{}` (expected one of {})",
                config.log_level,
                LOG_LEVELS.join(", ")
            )));
        }
        Ok(config)
    }

    /// `explicit` must exist when given; otherwise `jobs.toml` under `root`
    /// is used if present, and the defaults if not.
    pub fn load(explicit: Option<&Path>, root: &Path) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let path = root.join(DEFAULT_CONFIG_FILE);
                if path.is_file() {
                    Self::from_file(&path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
    }

    #[test]
    fn test_partial_config() {
        let config = Config::from_toml("save_on_accept = false\n[passes]\nrepair = false\n").unwrap();
        assert!(!config.save_on_accept);
        assert!(config.passes.reorder);
        assert!(!config.passes.repair);
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_invalid_log_level() {
        let err = Config::from_toml("log_level = \"loud\"").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_load_prefers_root_file() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(Config::load(None, tmp.path()).unwrap(), Config::default());

        std::fs::write(tmp.path().join(DEFAULT_CONFIG_FILE), "log_level = \"debug\"\n").unwrap();
        assert_eq!(Config::load(None, tmp.path()).unwrap().log_level, "debug");

        let missing = tmp.path().join("other.toml");
        assert!(matches!(
            Config::load(Some(&missing), tmp.path()),
            Err(ConfigError::Io(_))
        ));
    }
}
