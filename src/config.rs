use crate::domain::organization::Organization;
use crate::error::{FareError, Result};
use crate::infrastructure::retrying_directory::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Service configuration, loaded from a TOML file. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub scheduler: SchedulerConfig,
    pub directory: DirectoryConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    /// Organizations served by the in-memory directory.
    pub organizations: Vec<Organization>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub interval_seconds: u64,
    pub run_on_start: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 3600,
            run_on_start: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    pub max_retries: u32,
    pub initial_backoff_millis: u64,
    pub attempt_timeout_millis: u64,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_retries: policy.max_retries,
            initial_backoff_millis: policy.initial_backoff.as_millis() as u64,
            attempt_timeout_millis: policy.attempt_timeout.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub verbose: bool,
    pub json: bool,
}

impl ServiceConfig {
    /// Loads and validates a configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// Parses and validates configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| FareError::ConfigError(format!("TOML parsing error: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validate_range("scheduler.interval_seconds", self.scheduler.interval_seconds, 1, 7 * 24 * 3600)?;
        validate_range("directory.max_retries", self.directory.max_retries, 0, 10)?;
        validate_range(
            "directory.attempt_timeout_millis",
            self.directory.attempt_timeout_millis,
            1,
            300_000,
        )?;

        if let Some(org) = self.organizations.iter().find(|org| org.id.trim().is_empty()) {
            return Err(FareError::ConfigError(format!(
                "organizations: entry {:?} has an empty id",
                org.name
            )));
        }
        Ok(())
    }

    pub fn scheduler_period(&self) -> Duration {
        Duration::from_secs(self.scheduler.interval_seconds)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.directory.max_retries,
            initial_backoff: Duration::from_millis(self.directory.initial_backoff_millis),
            attempt_timeout: Duration::from_millis(self.directory.attempt_timeout_millis),
        }
    }
}

fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(FareError::ConfigError(format!(
            "{field_name}: value {value} must be between {min} and {max}"
        )));
    }
    Ok(())
}
