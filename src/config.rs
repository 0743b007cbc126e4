//! Configuration loading helpers.

use std::env;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::queue::QueueConfig;

/// Environment variable naming a TOML configuration file.
pub const CONFIG_PATH_ENV: &str = "ATOMKIT_CONFIG";

/// Prefix of `ATOMKIT__section__field` override variables.
pub const ENV_OVERRIDE_PREFIX: &str = "ATOMKIT__";

/// Errors returned by configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error while reading config files.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parse error.
    #[error("toml parse error: {0}")]
    Toml(#[from] toml::de::Error),
    /// Invalid value for a key.
    #[error("invalid value for {key}: {value}")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Raw value string.
        value: String,
    },
    /// Unknown configuration key.
    #[error("unknown config key: {0}")]
    UnknownKey(String),
}

/// Top-level configuration schema.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AtomkitConfig {
    /// Queue configuration.
    pub queue: Option<QueueConfigSpec>,
}

impl AtomkitConfig {
    /// Load configuration from a TOML file.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;
        if tracing::enabled!(tracing::Level::DEBUG) {
            tracing::debug!(path = %path.display(), "loaded configuration file");
        }
        Ok(config)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Load configuration from the `ATOMKIT_CONFIG` env var (if set),
    /// then apply `ATOMKIT__section__field` overrides.
    pub fn load_from_env() -> Result<Self, ConfigError> {
        let config_path = env::var(CONFIG_PATH_ENV).ok();
        let mut config = match config_path {
            Some(path) => Self::load_from_path(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply environment overrides in-place.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(env::vars())
    }

    /// Apply `ATOMKIT__section__field = value` pairs; other keys are ignored.
    pub fn apply_overrides<I, K, V>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let key = key.as_ref();
            let Some(path) = key.strip_prefix(ENV_OVERRIDE_PREFIX) else {
                continue;
            };
            let path = path.to_ascii_lowercase();
            let parts: Vec<&str> = path.split("__").collect();
            let value = value.as_ref().trim();

            match parts.as_slice() {
                ["queue", "retire_threshold"] => {
                    self.queue_mut().retire_threshold = Some(parse_value(key, value)?);
                }
                ["queue", "local_cache_limit"] => {
                    self.queue_mut().local_cache_limit = Some(parse_value(key, value)?);
                }
                _ => return Err(ConfigError::UnknownKey(key.to_string())),
            }
            if tracing::enabled!(tracing::Level::DEBUG) {
                tracing::debug!(key, value, "applied configuration override");
            }
        }

        Ok(())
    }

    /// Build a validated `QueueConfig` using defaults plus overrides.
    pub fn to_queue_config(&self) -> Result<QueueConfig, ConfigError> {
        let mut config = QueueConfig::default();
        if let Some(queue) = &self.queue {
            queue.apply_to(&mut config);
        }
        config.validate()?;
        Ok(config)
    }

    fn queue_mut(&mut self) -> &mut QueueConfigSpec {
        self.queue.get_or_insert_with(QueueConfigSpec::default)
    }
}

/// Queue configuration overrides.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfigSpec {
    /// Retired nodes before a reclamation scan.
    pub retire_threshold: Option<usize>,
    /// Thread-local free list spill limit.
    pub local_cache_limit: Option<usize>,
}

impl QueueConfigSpec {
    fn apply_to(&self, config: &mut QueueConfig) {
        if let Some(value) = self.retire_threshold {
            config.retire_threshold = value;
        }
        if let Some(value) = self.local_cache_limit {
            config.local_cache_limit = value;
        }
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}
