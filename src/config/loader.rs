//! Configuration loader for jobsync
//!
//! Handles loading configuration from layered sources with proper
//! precedence.

use std::path::PathBuf;

use config::{Config, Environment, File, FileFormat};

use crate::config::error::ConfigError;
use crate::config::settings::Settings;

/// Environment variable for a specific configuration file
const CONFIG_FILE_ENV: &str = "JOBSYNC_CONFIG_FILE";

/// Environment variable for the configuration directory
const CONFIG_DIR_ENV: &str = "JOBSYNC_CONFIG_DIR";

/// Default configuration directory
const DEFAULT_CONFIG_DIR: &str = "config";

/// Environment variable prefix for configuration overrides
const ENV_PREFIX: &str = "JOBSYNC";

/// Separator for nested configuration keys in environment variables
const ENV_SEPARATOR: &str = "__";

/// Configuration loader with layered sources (in order of priority):
/// 1. `{config_dir}/default.toml` (optional; built-in defaults apply)
/// 2. `{config_dir}/local.toml` (optional overrides)
/// 3. `JOBSYNC__*` environment variables (highest priority)
///
/// Setting `JOBSYNC_CONFIG_FILE` (or passing an explicit path) skips the
/// layered directory and loads that single file, which must exist.
#[derive(Debug)]
pub struct ConfigLoader {
    config_dir: PathBuf,
    config_file: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        let config_dir = std::env::var(CONFIG_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_DIR));
        let config_file = std::env::var(CONFIG_FILE_ENV).ok().map(PathBuf::from);

        Self {
            config_dir,
            config_file,
        }
    }

    /// Uses a specific configuration file instead of layered loading.
    pub fn with_file(mut self, path: PathBuf) -> Self {
        self.config_file = Some(path);
        self
    }

    /// Loads and validates configuration from all sources.
    pub fn load(&self) -> Result<Settings, ConfigError> {
        let config = self.build_config()?;
        let settings: Settings = config.try_deserialize().map_err(|e| {
            ConfigError::ParseError(format!("Failed to deserialize configuration: {e}"))
        })?;

        settings.validate()?;
        Ok(settings)
    }

    fn build_config(&self) -> Result<Config, ConfigError> {
        let mut builder = Config::builder();

        if let Some(config_file) = &self.config_file {
            if !config_file.exists() {
                return Err(ConfigError::FileNotFound(
                    config_file.display().to_string(),
                ));
            }
            builder = builder.add_source(File::from(config_file.clone()));
        } else {
            builder = builder
                .add_source(
                    File::from(self.config_dir.join("default.toml"))
                        .format(FileFormat::Toml)
                        .required(false),
                )
                .add_source(
                    File::from(self.config_dir.join("local.toml"))
                        .format(FileFormat::Toml)
                        .required(false),
                );
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator(ENV_SEPARATOR)
                .try_parsing(true),
        );

        builder.build().map_err(ConfigError::from)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_layered_files_fall_back_to_defaults() {
        let loader = ConfigLoader {
            config_dir: PathBuf::from("/nonexistent/config-dir"),
            config_file: None,
        };
        let settings = loader.load().expect("defaults should load");
        assert_eq!(settings.queue.concurrency, 5);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let loader = ConfigLoader {
            config_dir: PathBuf::from(DEFAULT_CONFIG_DIR),
            config_file: Some(PathBuf::from("/nonexistent/jobsync.toml")),
        };
        let result = loader.load();
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn explicit_file_overrides_defaults() {
        let dir = std::env::temp_dir().join("jobsync-config-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("explicit.toml");
        std::fs::write(
            &path,
            "[import]\nrun_timeout_secs = 60\n\n[feeds]\nurls = [\"https://feeds.test/a\"]\n",
        )
        .unwrap();

        let loader = ConfigLoader::new().with_file(path.clone());
        let settings = loader.load().unwrap();
        assert_eq!(settings.import.run_timeout_secs, 60);
        assert_eq!(settings.feeds.urls, vec!["https://feeds.test/a"]);

        std::fs::remove_file(path).ok();
    }
}
