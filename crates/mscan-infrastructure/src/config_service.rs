//! Configuration loading.
//!
//! Reads `~/.config/mscan/config.toml` (or an explicit path) and layers
//! environment overrides on top. A missing file yields the defaults.

use std::path::{Path, PathBuf};

use mscan_core::config::AppConfig;
use mscan_core::error::{Result, ScanError};

use crate::paths::ScanPaths;

/// Environment variables consulted by [`ConfigService::apply_overrides`].
pub const ENV_API_KEY: &str = "GOOGLE_API_KEY";
pub const ENV_API_KEY_FALLBACK: &str = "GEMINI_API_KEY";
pub const ENV_SERVER_HOST: &str = "SERVER_HOST";
pub const ENV_SERVER_PORT: &str = "SERVER_PORT";
pub const ENV_DATA_DIR: &str = "MSCAN_DATA_DIR";
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";

pub struct ConfigService;

impl ConfigService {
    /// Loads the configuration file and applies process environment overrides.
    pub fn load(path: Option<&Path>) -> Result<AppConfig> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => ScanPaths::config_file().map_err(|e| ScanError::config(e.to_string()))?,
        };

        let mut config = Self::load_file(&path)?;
        Self::apply_overrides(&mut config, |key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parses a config file; missing or blank files give the defaults.
    pub fn load_file(path: &Path) -> Result<AppConfig> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(AppConfig::default());
        }

        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(AppConfig::default());
        }

        toml::from_str(&content).map_err(|e| {
            ScanError::config(format!("Invalid config file '{}': {}", path.display(), e))
        })
    }

    /// Applies overrides from `lookup` (normally `std::env::var`).
    ///
    /// Blank values are ignored so an exported but empty variable doesn't
    /// wipe a configured setting.
    pub fn apply_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(key) = get(ENV_API_KEY).or_else(|| get(ENV_API_KEY_FALLBACK)) {
            config.gemini.api_key = key;
        }
        if let Some(host) = get(ENV_SERVER_HOST) {
            config.server.host = host;
        }
        if let Some(port) = get(ENV_SERVER_PORT) {
            config.server.port = port.trim().parse().map_err(|_| {
                ScanError::config(format!("{ENV_SERVER_PORT} must be a port number, got '{port}'"))
            })?;
        }
        if let Some(dir) = get(ENV_DATA_DIR) {
            config.storage.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(level) = get(ENV_LOG_LEVEL) {
            config.log_level = level.to_lowercase();
        }
        Ok(())
    }

    /// Resolves file locations for a loaded configuration.
    pub fn paths(config: &AppConfig) -> Result<ScanPaths> {
        ScanPaths::new(config.storage.data_dir.as_deref())
            .map_err(|e| ScanError::config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = ConfigService::load_file(&temp_dir.path().join("config.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_file_values_are_read() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[workflow]\nmax_duration_secs = 60\n\n[gemini]\nmodel = \"gemini-2.5-flash\"\n",
        )
        .unwrap();

        let config = ConfigService::load_file(&path).unwrap();
        assert_eq!(config.workflow.max_duration_secs, 60);
        assert_eq!(config.gemini.model, "gemini-2.5-flash");
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[server\nport = ").unwrap();
        assert!(ConfigService::load_file(&path).unwrap_err().is_config());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        ConfigService::apply_overrides(
            &mut config,
            env(&[
                ("GEMINI_API_KEY", "fallback"),
                ("SERVER_PORT", "9100"),
                ("MSCAN_DATA_DIR", "/tmp/mscan"),
                ("LOG_LEVEL", "DEBUG"),
                ("SERVER_HOST", "  "),
            ]),
        )
        .unwrap();

        assert_eq!(config.gemini.api_key, "fallback");
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.storage.data_dir, Some(PathBuf::from("/tmp/mscan")));
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_google_key_wins_over_fallback() {
        let mut config = AppConfig::default();
        ConfigService::apply_overrides(
            &mut config,
            env(&[("GOOGLE_API_KEY", "primary"), ("GEMINI_API_KEY", "fallback")]),
        )
        .unwrap();
        assert_eq!(config.gemini.api_key, "primary");
    }

    #[test]
    fn test_bad_port_is_rejected() {
        let mut config = AppConfig::default();
        let err = ConfigService::apply_overrides(&mut config, env(&[("SERVER_PORT", "http")]))
            .unwrap_err();
        assert!(err.is_config());
    }
}
