//! Configuration validation

use super::error::{ConfigError, ConfigResult};
use super::{GithubConfig, PipelineConfig, StorageConfig};

/// Trait for validatable configuration objects
pub trait Validatable {
    /// Returns `Ok(())` if valid, `Err(ConfigError)` with details if invalid.
    fn validate(&self) -> ConfigResult<()>;

    /// Get the configuration name for error messages
    fn config_name(&self) -> &'static str {
        "Config"
    }
}

/// Largest page size the GitHub REST API accepts
pub const MAX_PER_PAGE: u32 = 100;

impl Validatable for GithubConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.user_name.trim().is_empty() {
            return Err(ConfigError::Empty("github.user_name".to_string()));
        }
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::Empty("github.api_base_url".to_string()));
        }
        if self.per_page == 0 || self.per_page > MAX_PER_PAGE {
            return Err(ConfigError::range_with_hint(
                "github.per_page",
                self.per_page,
                1,
                MAX_PER_PAGE,
                "GitHub caps page size at 100",
            ));
        }
        Ok(())
    }

    fn config_name(&self) -> &'static str {
        "GithubConfig"
    }
}

impl Validatable for StorageConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.journal_file.as_os_str().is_empty() {
            return Err(ConfigError::Empty("storage.journal_file".to_string()));
        }
        if self.output_file.as_os_str().is_empty() {
            return Err(ConfigError::Empty("storage.output_file".to_string()));
        }
        Ok(())
    }

    fn config_name(&self) -> &'static str {
        "StorageConfig"
    }
}

impl Validatable for PipelineConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.retry_interval_secs == 0 {
            return Err(ConfigError::range_with_hint(
                "retry_interval_secs",
                self.retry_interval_secs,
                1,
                u64::MAX,
                "Keep it above the upstream rate-limit window (3600 by default)",
            ));
        }
        if self.buffer_capacity == 0 {
            return Err(ConfigError::range_with_hint(
                "buffer_capacity",
                self.buffer_capacity,
                1,
                usize::MAX,
                "Stage channels need room for at least one record",
            ));
        }
        self.github.validate()?;
        self.storage.validate()?;
        Ok(())
    }

    fn config_name(&self) -> &'static str {
        "PipelineConfig"
    }
}
