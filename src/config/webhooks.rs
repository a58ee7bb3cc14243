//! Webhook processing configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Webhook processing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WebhooksConfig {
    /// Upper bound on handling one webhook, in milliseconds
    #[serde(default = "default_processing_budget")]
    pub processing_budget_ms: u64,

    /// Days processed-event records are kept
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,

    /// Seconds between retention sweeps
    #[serde(default = "default_prune_interval")]
    pub prune_interval_secs: u64,

    /// Largest accepted request body
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl WebhooksConfig {
    pub fn processing_budget(&self) -> Duration {
        Duration::from_millis(self.processing_budget_ms)
    }

    pub fn prune_interval(&self) -> Duration {
        Duration::from_secs(self.prune_interval_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.processing_budget_ms == 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        if self.retention_days < 1 {
            return Err(ValidationError::InvalidRetention);
        }
        if self.prune_interval_secs == 0 {
            return Err(ValidationError::InvalidInterval("webhooks.prune_interval_secs"));
        }
        Ok(())
    }
}

impl Default for WebhooksConfig {
    fn default() -> Self {
        Self {
            processing_budget_ms: default_processing_budget(),
            retention_days: default_retention_days(),
            prune_interval_secs: default_prune_interval(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_processing_budget() -> u64 {
    10_000
}

fn default_retention_days() -> i64 {
    30
}

fn default_prune_interval() -> u64 {
    3600
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}
