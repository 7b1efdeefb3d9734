use super::{Job, JobResult};
use crate::entitlement::EntitlementLedger;
use crate::error::AppError;
use async_trait::async_trait;
use tracing::info;

/// Opens a new usage period for every account
pub struct UsageResetJob {
    ledger: EntitlementLedger,
}

impl UsageResetJob {
    pub fn new(ledger: EntitlementLedger) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl Job for UsageResetJob {
    fn name(&self) -> &str {
        "usage_reset"
    }

    async fn execute(&self) -> Result<JobResult, AppError> {
        info!("Resetting monthly usage counters");
        let count = self.ledger.reset_all().await?;
        Ok(JobResult::success_with_count(count))
    }
}
