use super::{Entitlement, EntitlementState, PlanLimits};
use crate::database::entities::{GenerationRecord, Plan, UserRecord};
use crate::database::{DatabaseError, DatabaseManager, DatabaseResult, GenerationsDao, UsersDao};
use chrono::{DateTime, Utc};
use sea_orm::TransactionTrait;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

/// How many times a conditional increment is retried when the plan changed under it
const PLAN_CHANGE_RETRIES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    Consumed,
    Exhausted,
}

/// Usage report for one account
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UsageSummary {
    pub plan: Plan,
    pub used: u32,
    /// `null` for unbounded plans
    pub limit: Option<u32>,
    /// `null` for unbounded plans
    pub remaining: Option<u32>,
    pub period_start: DateTime<Utc>,
    pub state: EntitlementState,
}

/// Persistent entitlement ledger backed by the `users` table
#[derive(Clone)]
pub struct EntitlementLedger {
    db: Arc<dyn DatabaseManager>,
    limits: PlanLimits,
}

impl EntitlementLedger {
    pub fn new(db: Arc<dyn DatabaseManager>, limits: PlanLimits) -> Self {
        Self { db, limits }
    }

    pub fn limits(&self) -> &PlanLimits {
        &self.limits
    }

    /// Fresh read of an account's entitlement
    pub async fn entitlement(&self, user_id: i32) -> DatabaseResult<Entitlement> {
        let user = self
            .db
            .users()
            .find_by_id(user_id)
            .await?
            .ok_or(DatabaseError::NotFound)?;
        Ok(Entitlement::from_user(&user))
    }

    pub async fn can_consume(&self, user_id: i32) -> DatabaseResult<bool> {
        Ok(self.entitlement(user_id).await?.can_consume(&self.limits))
    }

    /// Unconditional increment. Callers are expected to have checked `can_consume`.
    pub async fn record_consumption(&self, user_id: i32) -> DatabaseResult<()> {
        self.db.users().increment_usage(user_id).await
    }

    /// Atomic check-and-increment against the current row
    pub async fn try_consume(&self, user_id: i32) -> DatabaseResult<ConsumeOutcome> {
        for attempt in 0..PLAN_CHANGE_RETRIES {
            let Some((plan, limit)) = self.open_quota(user_id).await? else {
                return Ok(ConsumeOutcome::Exhausted);
            };

            if UsersDao::increment_usage_if_below(self.db.connection(), user_id, plan, limit)
                .await?
            {
                return Ok(ConsumeOutcome::Consumed);
            }

            // Either the counter caught up with the limit or the plan changed; re-read decides
            debug!(user_id, attempt, "Conditional usage increment did not apply, re-reading");
        }

        warn!(user_id, "Giving up on usage increment after repeated plan changes");
        Ok(ConsumeOutcome::Exhausted)
    }

    /// Plan and limit to increment against, or `None` when the account has no quota left.
    ///
    /// Reads through the pool, never inside a transaction.
    async fn open_quota(&self, user_id: i32) -> DatabaseResult<Option<(Plan, Option<u32>)>> {
        let entitlement = self.entitlement(user_id).await?;
        if !entitlement.can_consume(&self.limits) {
            return Ok(None);
        }
        Ok(Some((
            entitlement.plan,
            entitlement.limit(&self.limits).as_option(),
        )))
    }

    /// Consume one generation and append its record in a single transaction.
    ///
    /// Returns `None` without writing anything when the account has no quota left.
    pub async fn commit_generation(
        &self,
        user_id: i32,
        record: &GenerationRecord,
    ) -> DatabaseResult<Option<GenerationRecord>> {
        for attempt in 0..PLAN_CHANGE_RETRIES {
            let Some((plan, limit)) = self.open_quota(user_id).await? else {
                return Ok(None);
            };

            let txn = self
                .db
                .connection()
                .begin()
                .await
                .map_err(|e| DatabaseError::Database(e.to_string()))?;

            // The conditional update must be the first statement: SQLite then takes the
            // write lock up front instead of failing to upgrade a read lock.
            if !UsersDao::increment_usage_if_below(&txn, user_id, plan, limit).await? {
                txn.rollback()
                    .await
                    .map_err(|e| DatabaseError::Database(e.to_string()))?;
                debug!(user_id, attempt, "Conditional usage increment did not apply, re-reading");
                continue;
            }

            let stored = GenerationsDao::insert_in(&txn, record).await?;

            txn.commit()
                .await
                .map_err(|e| DatabaseError::Database(e.to_string()))?;

            return Ok(Some(stored));
        }

        warn!(user_id, "Giving up on generation commit after repeated plan changes");
        Ok(None)
    }

    /// Change the plan; the counter carries over
    pub async fn change_plan(&self, user_id: i32, plan: Plan) -> DatabaseResult<UserRecord> {
        let user = self.db.users().update_plan(user_id, plan).await?;
        info!(user_id, plan = %plan, "Plan changed");
        Ok(user)
    }

    pub async fn reset_period(&self, user_id: i32) -> DatabaseResult<UserRecord> {
        let user = self.db.users().reset_usage(user_id).await?;
        info!(user_id, "Usage period reset");
        Ok(user)
    }

    /// Reset every account's counter, returning how many were touched
    pub async fn reset_all(&self) -> DatabaseResult<u64> {
        let count = self.db.users().reset_all_usage().await?;
        info!(accounts = count, "Usage period reset for all accounts");
        Ok(count)
    }

    pub async fn summary(&self, user_id: i32) -> DatabaseResult<UsageSummary> {
        Ok(self.summarize(&self.entitlement(user_id).await?))
    }

    pub fn summarize(&self, entitlement: &Entitlement) -> UsageSummary {
        let limit = entitlement.limit(&self.limits);
        UsageSummary {
            plan: entitlement.plan,
            used: entitlement.used,
            limit: limit.as_option(),
            remaining: limit.remaining(entitlement.used),
            period_start: entitlement.period_start,
            state: entitlement.state(&self.limits),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::database::DatabaseManagerImpl;
    use crate::entitlement::PlanLimit;

    async fn ledger_with_user(plan: Plan, used: i32) -> (EntitlementLedger, Arc<dyn DatabaseManager>, i32) {
        ledger_on("sqlite::memory:", plan, used).await
    }

    /// Pooled connections to a real database file, as in the default configuration
    async fn file_ledger_with_user(
        dir: &tempfile::TempDir,
        plan: Plan,
        used: i32,
    ) -> (EntitlementLedger, Arc<dyn DatabaseManager>, i32) {
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("ledger.db").display());
        ledger_on(&url, plan, used).await
    }

    async fn ledger_on(
        url: &str,
        plan: Plan,
        used: i32,
    ) -> (EntitlementLedger, Arc<dyn DatabaseManager>, i32) {
        let mut config = Config::default();
        config.database.url = url.to_string();
        let db = DatabaseManagerImpl::new_from_config(&config).await.unwrap();
        db.migrate().await.unwrap();
        let db: Arc<dyn DatabaseManager> = Arc::new(db);

        let user = db
            .users()
            .create(
                &UserRecord::new("ledger@example.com", "ledger", "hash")
                    .with_plan(plan)
                    .with_usage(used),
            )
            .await
            .unwrap();

        (
            EntitlementLedger::new(db.clone(), config.plans.limits()),
            db,
            user.id,
        )
    }

    fn record(user_id: i32) -> GenerationRecord {
        GenerationRecord {
            id: 0,
            user_id,
            content_type: "title".to_string(),
            topic: "rust".to_string(),
            tone: "casual".to_string(),
            length: "corta".to_string(),
            additional_prompt: None,
            generated_content: "Rust in five words".to_string(),
            tokens_used: Some(10),
            processing_time_ms: Some(5),
            model_used: Some("mock".to_string()),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_try_consume_stops_at_limit() {
        let (ledger, _db, user_id) = ledger_with_user(Plan::Free, 9).await;

        assert!(ledger.can_consume(user_id).await.unwrap());
        assert_eq!(ledger.try_consume(user_id).await.unwrap(), ConsumeOutcome::Consumed);
        assert!(!ledger.can_consume(user_id).await.unwrap());
        assert_eq!(ledger.try_consume(user_id).await.unwrap(), ConsumeOutcome::Exhausted);
        assert_eq!(ledger.entitlement(user_id).await.unwrap().used, 10);
    }

    #[tokio::test]
    async fn test_concurrent_consumption_never_exceeds_limit() {
        let (ledger, _db, user_id) = ledger_with_user(Plan::Free, 9).await;

        let (record_a, record_b) = (record(user_id), record(user_id));
        let (a, b) = tokio::join!(
            ledger.commit_generation(user_id, &record_a),
            ledger.commit_generation(user_id, &record_b),
        );
        let committed = [a.unwrap(), b.unwrap()]
            .into_iter()
            .filter(Option::is_some)
            .count();

        assert_eq!(committed, 1);
        assert_eq!(ledger.entitlement(user_id).await.unwrap().used, 10);
    }

    async fn spawn_commits(ledger: &EntitlementLedger, user_id: i32, count: usize) -> usize {
        let handles: Vec<_> = (0..count)
            .map(|_| {
                let ledger = ledger.clone();
                tokio::spawn(async move { ledger.commit_generation(user_id, &record(user_id)).await })
            })
            .collect();

        let mut committed = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().is_some() {
                committed += 1;
            }
        }
        committed
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_commits_on_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let (ledger, db, user_id) = file_ledger_with_user(&dir, Plan::Pro, 0).await;

        assert_eq!(spawn_commits(&ledger, user_id, 20).await, 20);
        assert_eq!(ledger.entitlement(user_id).await.unwrap().used, 20);
        assert_eq!(db.generations().count_by_user(user_id).await.unwrap(), 20);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_commits_on_file_database_stop_at_limit() {
        let dir = tempfile::tempdir().unwrap();
        let (ledger, db, user_id) = file_ledger_with_user(&dir, Plan::Pro, 995).await;

        assert_eq!(spawn_commits(&ledger, user_id, 20).await, 5);
        assert_eq!(ledger.entitlement(user_id).await.unwrap().used, 1000);
        assert_eq!(db.generations().count_by_user(user_id).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_commit_counts_against_current_plan() {
        let (ledger, db, user_id) = ledger_with_user(Plan::Free, 10).await;
        db.users().update_plan(user_id, Plan::Pro).await.unwrap();

        assert!(
            ledger
                .commit_generation(user_id, &record(user_id))
                .await
                .unwrap()
                .is_some()
        );
        assert_eq!(ledger.entitlement(user_id).await.unwrap().used, 11);
    }

    #[tokio::test]
    async fn test_unguarded_record_consumption_overshoots() {
        let (ledger, _db, user_id) = ledger_with_user(Plan::Free, 9).await;

        assert!(ledger.can_consume(user_id).await.unwrap());
        assert!(ledger.can_consume(user_id).await.unwrap());
        ledger.record_consumption(user_id).await.unwrap();
        ledger.record_consumption(user_id).await.unwrap();

        assert_eq!(ledger.entitlement(user_id).await.unwrap().used, 11);
    }

    #[tokio::test]
    async fn test_exhausted_commit_writes_nothing() {
        let (ledger, db, user_id) = ledger_with_user(Plan::Free, 10).await;

        let stored = ledger
            .commit_generation(user_id, &record(user_id))
            .await
            .unwrap();

        assert!(stored.is_none());
        assert_eq!(db.generations().count_by_user(user_id).await.unwrap(), 0);
        assert_eq!(ledger.entitlement(user_id).await.unwrap().used, 10);
    }

    #[tokio::test]
    async fn test_commit_generation_stores_record_and_counts() {
        let (ledger, db, user_id) = ledger_with_user(Plan::Free, 0).await;

        let stored = ledger
            .commit_generation(user_id, &record(user_id))
            .await
            .unwrap()
            .unwrap();

        assert!(stored.id > 0);
        assert_eq!(db.generations().count_by_user(user_id).await.unwrap(), 1);
        assert_eq!(ledger.entitlement(user_id).await.unwrap().used, 1);
    }

    #[tokio::test]
    async fn test_upgrade_reopens_quota_and_keeps_usage() {
        let (ledger, _db, user_id) = ledger_with_user(Plan::Free, 10).await;
        assert!(!ledger.can_consume(user_id).await.unwrap());

        let user = ledger.change_plan(user_id, Plan::Pro).await.unwrap();
        assert_eq!(user.generations_used, 10);
        assert!(ledger.can_consume(user_id).await.unwrap());

        let summary = ledger.summary(user_id).await.unwrap();
        assert_eq!(summary.limit, Some(1000));
        assert_eq!(summary.remaining, Some(990));
        assert_eq!(summary.state, EntitlementState::Active);
    }

    #[tokio::test]
    async fn test_unbounded_plan_summary() {
        let (ledger, _db, user_id) = ledger_with_user(Plan::Enterprise, 123_456).await;

        assert_eq!(ledger.try_consume(user_id).await.unwrap(), ConsumeOutcome::Consumed);
        let summary = ledger.summary(user_id).await.unwrap();
        assert_eq!(summary.used, 123_457);
        assert_eq!(summary.limit, None);
        assert_eq!(summary.remaining, None);
    }

    #[tokio::test]
    async fn test_unbounded_counter_saturates() {
        let (ledger, db, user_id) = ledger_with_user(Plan::Enterprise, i32::MAX).await;

        assert_eq!(ledger.try_consume(user_id).await.unwrap(), ConsumeOutcome::Consumed);
        ledger.record_consumption(user_id).await.unwrap();
        assert!(
            ledger
                .commit_generation(user_id, &record(user_id))
                .await
                .unwrap()
                .is_some()
        );

        let user = db.users().find_by_id(user_id).await.unwrap().unwrap();
        assert_eq!(user.generations_used, i32::MAX);
        assert_eq!(ledger.summary(user_id).await.unwrap().used, i32::MAX as u32);
    }

    #[tokio::test]
    async fn test_reset_period_restores_quota() {
        let (ledger, _db, user_id) = ledger_with_user(Plan::Free, 10).await;
        let before = ledger.entitlement(user_id).await.unwrap();

        let user = ledger.reset_period(user_id).await.unwrap();
        assert_eq!(user.generations_used, 0);
        assert!(user.period_start >= before.period_start);
        assert!(ledger.can_consume(user_id).await.unwrap());
        assert_eq!(ledger.reset_all().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_limits_come_from_configuration() {
        let (_ledger, db, user_id) = ledger_with_user(Plan::Free, 3).await;
        let ledger = EntitlementLedger::new(
            db,
            PlanLimits::new(
                PlanLimit::Limited(3),
                PlanLimit::Limited(1000),
                PlanLimit::Unbounded,
                PlanLimit::Unbounded,
            ),
        );

        assert!(!ledger.can_consume(user_id).await.unwrap());
        assert_eq!(ledger.try_consume(user_id).await.unwrap(), ConsumeOutcome::Exhausted);
    }

    #[tokio::test]
    async fn test_missing_account_is_not_found() {
        let (ledger, _db, _user_id) = ledger_with_user(Plan::Free, 0).await;
        assert!(matches!(
            ledger.try_consume(4242).await,
            Err(DatabaseError::NotFound)
        ));
    }
}
