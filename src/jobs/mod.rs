pub mod scheduler;
pub mod usage_reset;

use crate::error::AppError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use scheduler::JobScheduler;
pub use usage_reset::UsageResetJob;

/// Configuration for the job system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Enable/disable internal job scheduler
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Monthly usage counter reset
    #[serde(default)]
    pub usage_reset: UsageResetConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageResetConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Cron schedule expression (sec min hour day month dow)
    #[serde(default = "default_usage_reset_schedule")]
    pub schedule: String,
}

fn default_enabled() -> bool {
    true
}

fn default_usage_reset_schedule() -> String {
    "0 0 0 1 * *".to_string() // Midnight UTC on the 1st of each month
}

impl Default for UsageResetConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            schedule: default_usage_reset_schedule(),
        }
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            usage_reset: UsageResetConfig::default(),
        }
    }
}

/// Result of job execution
#[derive(Debug, Clone)]
pub struct JobResult {
    pub success: bool,
    pub message: String,
    pub items_processed: u64,
}

impl JobResult {
    pub fn success_with_count(count: u64) -> Self {
        Self {
            success: true,
            message: format!("Successfully processed {count} items"),
            items_processed: count,
        }
    }

    pub fn failure(message: String) -> Self {
        Self {
            success: false,
            message,
            items_processed: 0,
        }
    }
}

/// Trait for executable jobs
#[async_trait]
pub trait Job: Send + Sync {
    /// Get the job name for logging and identification
    fn name(&self) -> &str;

    /// Execute the job and return the result
    async fn execute(&self) -> Result<JobResult, AppError>;
}
