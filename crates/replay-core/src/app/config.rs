//! QueueConfig - tunables for retry, backoff and persistence.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::queue::{DEFAULT_STORAGE_KEY, RetryPolicy};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("base_delay_ms ({base}) must not exceed max_delay_ms ({max})")]
    DelayRange { base: u64, max: u64 },

    #[error("storage_key must not be empty")]
    EmptyStorageKey,
}

/// Every field is optional in the JSON form; missing ones take the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Longest backoff a drain pass will sleep through instead of deferring
    /// the record to a later pass.
    pub max_inline_wait_ms: u64,
    pub check_conflicts: bool,
    /// The metadata lives under `"{storage_key}_metadata"`.
    pub storage_key: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
            max_inline_wait_ms: 0,
            check_conflicts: true,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
        }
    }
}

impl QueueConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_delay_ms > self.max_delay_ms {
            return Err(ConfigError::DelayRange {
                base: self.base_delay_ms,
                max: self.max_delay_ms,
            });
        }
        if self.storage_key.is_empty() {
            return Err(ConfigError::EmptyStorageKey);
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            max_retries: self.max_retries,
        }
    }

    pub fn max_inline_wait(&self) -> Duration {
        Duration::from_millis(self.max_inline_wait_ms)
    }
}
