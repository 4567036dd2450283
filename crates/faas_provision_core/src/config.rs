//! Provisioning configuration, built once per invocation and passed down explicitly.
//!
//! Layering is defaults, then an optional YAML file, then caller overrides
//! (the CLI applies profile and region flags on top).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::contract::{Architecture, RepositorySettings, DEFAULT_TIMEOUT_SECONDS};

pub const DEFAULT_ARTIFACT_BUCKET: &str = "example-lambda-apps";
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 5;
/// Hard ceiling the platform puts on function timeouts.
pub const MAX_TIMEOUT_SECONDS: i32 = 900;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Bounded retry of the create-function call while the role propagates.
///
/// The defaults give a fixed 5 second pause between up to 3 retries. Setting
/// `multiplier` above 1 turns this into exponential backoff capped at
/// `max_delay_secs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay_secs: u64,
    pub multiplier: u32,
    pub max_delay_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            delay_secs: DEFAULT_RETRY_DELAY_SECS,
            multiplier: 1,
            max_delay_secs: DEFAULT_RETRY_DELAY_SECS,
        }
    }
}

impl RetryPolicy {
    pub fn fixed(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries,
            delay_secs: delay.as_secs(),
            multiplier: 1,
            max_delay_secs: delay.as_secs(),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Pause before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1);
        let factor = u64::from(self.multiplier.max(1)).saturating_pow(exponent);
        let secs = self
            .delay_secs
            .saturating_mul(factor)
            .min(self.max_delay_secs.max(self.delay_secs));
        Duration::from_secs(secs)
    }

    /// Worst-case time spent pausing when every retry is used.
    pub fn worst_case_wait(&self) -> Duration {
        (1..=self.max_retries).map(|retry| self.delay_for(retry)).sum()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.multiplier == 0 {
            return Err(ConfigError::Invalid(
                "retry.multiplier must be a positive integer".to_string(),
            ));
        }
        if self.max_delay_secs < self.delay_secs {
            return Err(ConfigError::Invalid(
                "retry.max_delay_secs must not be smaller than retry.delay_secs".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    /// Shared-config profile used to resolve credentials.
    pub profile: Option<String>,
    pub region: Option<String>,
    /// Bucket holding the example deployment zips.
    pub artifact_bucket: String,
    pub timeout_seconds: i32,
    pub architecture: Architecture,
    pub retry: RetryPolicy,
    pub repository: RepositorySettings,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            profile: None,
            region: None,
            artifact_bucket: DEFAULT_ARTIFACT_BUCKET.to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            architecture: Architecture::default(),
            retry: RetryPolicy::default(),
            repository: RepositorySettings::default(),
        }
    }
}

impl ProvisionConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Loads `path` when given, otherwise falls back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn with_profile(mut self, profile: Option<String>) -> Self {
        if let Some(profile) = profile.filter(|value| !value.trim().is_empty()) {
            self.profile = Some(profile);
        }
        self
    }

    pub fn with_region(mut self, region: Option<String>) -> Self {
        if let Some(region) = region.filter(|value| !value.trim().is_empty()) {
            self.region = Some(region);
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.artifact_bucket.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "artifact_bucket cannot be empty".to_string(),
            ));
        }
        if !(1..=MAX_TIMEOUT_SECONDS).contains(&self.timeout_seconds) {
            return Err(ConfigError::Invalid(format!(
                "timeout_seconds must be between 1 and {MAX_TIMEOUT_SECONDS}"
            )));
        }
        if self.repository.name_suffix.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "repository.name_suffix cannot be empty".to_string(),
            ));
        }
        if self.repository.provision_function.trim().is_empty()
            || self.repository.deprovision_function.trim().is_empty()
        {
            return Err(ConfigError::Invalid(
                "repository provisioning function names cannot be empty".to_string(),
            ));
        }
        self.retry.validate()
    }
}
