//! Configuration for the review scheduler.
//!
//! Loaded from a camelCase JSON file; every field has a default so a
//! missing file or a partial file both work.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::SchedulingPolicy;

/// The default config file name.
pub const CONFIG_FILE_NAME: &str = "review-scheduler.json";

fn default_database_path() -> PathBuf {
    PathBuf::from("db.sqlite3")
}

fn default_learner_id() -> String {
    "local".to_string()
}

/// Default number of compare-and-swap attempts per review write.
const fn default_max_write_attempts() -> u32 {
    5
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in config file '{path}': {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerConfig {
    /// SQLite database holding review state.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Learner whose reviews the front-end works on.
    #[serde(default = "default_learner_id")]
    pub learner_id: String,

    /// Optional lesson catalog (JSON); the built-in sample is used otherwise.
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,

    #[serde(default = "default_max_write_attempts")]
    pub max_write_attempts: u32,

    #[serde(default)]
    pub policy: SchedulingPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            learner_id: default_learner_id(),
            catalog_path: None,
            max_write_attempts: default_max_write_attempts(),
            policy: SchedulingPolicy::default(),
        }
    }
}

impl SchedulerConfig {
    /// Loads and validates the config at `path`, falling back to defaults
    /// when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let policy = &self.policy;

        if self.max_write_attempts == 0 {
            return Err(ConfigError::Invalid(
                "maxWriteAttempts must be at least 1".to_string(),
            ));
        }
        if self.learner_id.trim().is_empty() {
            return Err(ConfigError::Invalid("learnerId must not be empty".to_string()));
        }
        if !(policy.min_ease.is_finite() && policy.min_ease > 1.0) {
            return Err(ConfigError::Invalid(format!(
                "policy.minEase must be greater than 1.0, got {}",
                policy.min_ease
            )));
        }
        if !(policy.initial_ease.is_finite() && policy.initial_ease >= policy.min_ease) {
            return Err(ConfigError::Invalid(format!(
                "policy.initialEase ({}) must not be below policy.minEase ({})",
                policy.initial_ease, policy.min_ease
            )));
        }
        let deltas = [policy.lapse_penalty, policy.easy_bonus, policy.hard_penalty];
        if deltas.iter().any(|delta| !delta.is_finite() || *delta < 0.0) {
            return Err(ConfigError::Invalid(
                "ease adjustments must be non-negative numbers".to_string(),
            ));
        }
        if policy.first_interval_days == 0 || policy.second_interval_days < policy.first_interval_days {
            return Err(ConfigError::Invalid(format!(
                "intervals must satisfy 0 < firstIntervalDays ({}) <= secondIntervalDays ({})",
                policy.first_interval_days, policy.second_interval_days
            )));
        }
        if policy.max_interval_days < policy.second_interval_days {
            return Err(ConfigError::Invalid(format!(
                "policy.maxIntervalDays ({}) must not be below secondIntervalDays ({})",
                policy.max_interval_days, policy.second_interval_days
            )));
        }
        if policy.mastery_repetitions == 0 {
            return Err(ConfigError::Invalid(
                "policy.masteryRepetitions must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
