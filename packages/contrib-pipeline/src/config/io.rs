//! Configuration I/O (YAML/Env loading)

use super::error::{ConfigError, ConfigResult};
use super::validation::Validatable;
use super::{GithubConfig, PipelineConfig, StorageConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable overriding `retry_interval_secs`
pub const ENV_RETRY_INTERVAL: &str = "CONTRIB_PIPELINE_RETRY_INTERVAL";
/// Environment variable overriding `github.user_name`
pub const ENV_GITHUB_USER: &str = "CONTRIB_PIPELINE_GITHUB_USER";
/// Environment variable carrying the GitHub API token
pub const ENV_GITHUB_TOKEN: &str = "GITHUB_TOKEN";
/// Environment variable overriding `storage.data_dir`
pub const ENV_DATA_DIR: &str = "CONTRIB_PIPELINE_DATA_DIR";

/// YAML Schema v1
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileV1 {
    /// Schema version (always 1 for v1)
    pub version: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_interval_secs: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_capacity: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<GithubConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageConfig>,
}

impl PipelineConfig {
    /// Load configuration from a YAML file on top of the defaults.
    pub fn from_yaml(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        let file: ConfigFileV1 = serde_yaml::from_str(content)?;

        if file.version != 1 {
            return Err(ConfigError::UnsupportedVersion {
                found: file.version,
                supported: vec![1],
            });
        }

        let mut config = Self::default();
        if let Some(retry) = file.retry_interval_secs {
            config.retry_interval_secs = retry;
        }
        if let Some(capacity) = file.buffer_capacity {
            config.buffer_capacity = capacity;
        }
        if let Some(github) = file.github {
            config.github = github;
        }
        if let Some(storage) = file.storage {
            config.storage = storage;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> ConfigResult<String> {
        let file = ConfigFileV1 {
            version: 1,
            retry_interval_secs: Some(self.retry_interval_secs),
            buffer_capacity: Some(self.buffer_capacity),
            github: Some(GithubConfig {
                // never write the token back out
                token: None,
                ..self.github.clone()
            }),
            storage: Some(self.storage.clone()),
        };
        Ok(serde_yaml::to_string(&file)?)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> ConfigResult<()> {
        self.apply_env_from(|var| std::env::var(var).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_RETRY_INTERVAL) {
            self.retry_interval_secs = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: ENV_RETRY_INTERVAL.to_string(),
                value: value.clone(),
            })?;
        }
        if let Some(user) = lookup(ENV_GITHUB_USER) {
            self.github.user_name = user;
        }
        if let Some(token) = lookup(ENV_GITHUB_TOKEN) {
            if !token.is_empty() {
                self.github.token = Some(token);
            }
        }
        if let Some(dir) = lookup(ENV_DATA_DIR) {
            self.storage.data_dir = dir.into();
        }

        self.validate()
    }
}
