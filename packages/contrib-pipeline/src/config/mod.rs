//! Pipeline configuration
//!
//! Defaults, then an optional YAML file, then environment overrides, then
//! CLI flags. The running service keeps the result behind a [`ConfigHandle`]
//! so it can be patched at runtime; every attempt reads a fresh snapshot.

pub mod error;
pub mod io;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use io::ConfigFileV1;
pub use validation::Validatable;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// GitHub identity and API settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GithubConfig {
    /// User or organisation whose repositories are fetched
    pub user_name: String,
    pub api_base_url: String,
    pub user_agent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Page size for the repository listing
    pub per_page: u32,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            user_name: "Algolia".to_string(),
            api_base_url: "https://api.github.com".to_string(),
            user_agent: concat!("contrib-pipeline/", env!("CARGO_PKG_VERSION")).to_string(),
            token: None,
            per_page: 100,
        }
    }
}

/// Where the journal and the output CSV live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub journal_file: PathBuf,
    pub output_file: PathBuf,
    /// Start every FIRST attempt from an empty journal
    pub truncate_journal_on_first_run: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            journal_file: PathBuf::from("checkpoint.jsonl"),
            output_file: PathBuf::from("result.csv"),
            truncate_journal_on_first_run: true,
        }
    }
}

impl StorageConfig {
    pub fn journal_path(&self) -> PathBuf {
        self.data_dir.join(&self.journal_file)
    }

    pub fn output_path(&self) -> PathBuf {
        self.data_dir.join(&self.output_file)
    }
}

/// Complete pipeline configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Delay before a failed attempt is retried
    pub retry_interval_secs: u64,
    /// Capacity of every stage-to-stage channel
    pub buffer_capacity: usize,
    pub github: GithubConfig,
    pub storage: StorageConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            // GitHub's unauthenticated rate limit resets hourly
            retry_interval_secs: 3600,
            buffer_capacity: 1,
            github: GithubConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

/// Runtime-adjustable subset of the configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigPatch {
    #[serde(default)]
    pub retry_interval_secs: Option<u64>,
    #[serde(default)]
    pub github_user_name: Option<String>,
}

impl ConfigPatch {
    pub fn is_empty(&self) -> bool {
        self.retry_interval_secs.is_none() && self.github_user_name.is_none()
    }
}

/// Shared, runtime-mutable configuration
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    inner: Arc<RwLock<PipelineConfig>>,
}

impl ConfigHandle {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Copy of the current configuration
    pub fn snapshot(&self) -> PipelineConfig {
        self.inner.read().clone()
    }

    pub fn retry_interval_secs(&self) -> u64 {
        self.inner.read().retry_interval_secs
    }

    /// Apply a patch; the stored configuration only changes if the result validates.
    pub fn apply(&self, patch: &ConfigPatch) -> ConfigResult<()> {
        if patch.is_empty() {
            return Ok(());
        }

        let mut guard = self.inner.write();
        let old = guard.clone();
        let mut next = old.clone();

        if let Some(retry) = patch.retry_interval_secs {
            next.retry_interval_secs = retry;
        }
        if let Some(user) = &patch.github_user_name {
            next.github.user_name = user.clone();
        }
        next.validate()?;

        info!(
            "Config changed: retry_interval_secs {} -> {}, github user {} -> {}",
            old.retry_interval_secs,
            next.retry_interval_secs,
            old.github.user_name,
            next.github.user_name
        );
        *guard = next;
        Ok(())
    }
}

impl Default for ConfigHandle {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}
