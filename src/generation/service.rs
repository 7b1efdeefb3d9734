use super::{GenerationRequest, GenerationResponse, prompt};
use crate::completion::CompletionProvider;
use crate::database::DatabaseManager;
use crate::database::entities::GenerationRecord;
use crate::entitlement::EntitlementLedger;
use crate::error::AppError;
use crate::metrics;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Largest page size accepted by the history listing
pub const MAX_PAGE_SIZE: u64 = 100;
pub const DEFAULT_PAGE_SIZE: u64 = 10;

const QUOTA_EXHAUSTED_MESSAGE: &str =
    "Monthly generation limit reached. Upgrade your plan to continue.";

/// Orchestrates one generation: validate, check quota, call the provider, commit
#[derive(Clone)]
pub struct GenerationService {
    ledger: EntitlementLedger,
    provider: Arc<dyn CompletionProvider>,
    database: Arc<dyn DatabaseManager>,
}

impl GenerationService {
    pub fn new(
        ledger: EntitlementLedger,
        provider: Arc<dyn CompletionProvider>,
        database: Arc<dyn DatabaseManager>,
    ) -> Self {
        Self {
            ledger,
            provider,
            database,
        }
    }

    pub fn ledger(&self) -> &EntitlementLedger {
        &self.ledger
    }

    pub async fn generate(
        &self,
        user_id: i32,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, AppError> {
        let request = request.validate()?;
        let content_type = request.content_type.as_str();

        let entitlement = self.ledger.entitlement(user_id).await?;
        if !entitlement.can_consume(self.ledger.limits()) {
            info!(user_id, plan = %entitlement.plan, used = entitlement.used, "Generation quota exhausted");
            metrics::track_quota_rejection(entitlement.plan.as_str());
            metrics::track_generation(content_type, "quota_exhausted");
            return Err(AppError::PaymentRequired(QUOTA_EXHAUSTED_MESSAGE.to_string()));
        }

        let started = Instant::now();
        let output = match self.provider.generate(prompt::build(&request)).await {
            Ok(output) => {
                metrics::track_completion_call(self.provider.model(), true, started.elapsed());
                output
            }
            Err(err) => {
                metrics::track_completion_call(self.provider.model(), false, started.elapsed());
                metrics::track_generation(content_type, "failed");
                error!(user_id, content_type, error = %err, "Completion provider failed");
                return Err(err.into());
            }
        };
        let processing_time_ms = i32::try_from(started.elapsed().as_millis()).unwrap_or(i32::MAX);

        let record = GenerationRecord {
            id: 0,
            user_id,
            content_type: content_type.to_string(),
            topic: request.topic.clone(),
            tone: request.tone.as_str().to_string(),
            length: request.length.as_str().to_string(),
            additional_prompt: request.additional_prompt.clone(),
            generated_content: output.text,
            tokens_used: output
                .total_tokens
                .map(|tokens| i32::try_from(tokens).unwrap_or(i32::MAX)),
            processing_time_ms: Some(processing_time_ms),
            model_used: Some(output.model),
            created_at: Utc::now(),
        };

        match self.ledger.commit_generation(user_id, &record).await? {
            Some(stored) => {
                info!(user_id, generation_id = stored.id, content_type, processing_time_ms, "Content generated");
                metrics::track_generation(content_type, "stored");
                Ok(stored.into())
            }
            None => {
                // Another request used the last unit of quota while this one was generating
                warn!(user_id, "Generated content discarded, quota exhausted at commit");
                metrics::track_quota_rejection(entitlement.plan.as_str());
                metrics::track_generation(content_type, "quota_exhausted");
                Err(AppError::PaymentRequired(QUOTA_EXHAUSTED_MESSAGE.to_string()))
            }
        }
    }

    /// Newest first; `limit` is clamped to `1..=MAX_PAGE_SIZE`
    pub async fn list(
        &self,
        user_id: i32,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<GenerationResponse>, AppError> {
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        let records = self
            .database
            .generations()
            .list_by_user(user_id, skip, limit)
            .await?;
        Ok(records.into_iter().map(GenerationResponse::from).collect())
    }

    pub async fn get(&self, user_id: i32, generation_id: i32) -> Result<GenerationResponse, AppError> {
        self.database
            .generations()
            .find_for_user(user_id, generation_id)
            .await?
            .map(GenerationResponse::from)
            .ok_or_else(|| AppError::NotFound("Generation not found".to_string()))
    }

    pub async fn delete(&self, user_id: i32, generation_id: i32) -> Result<(), AppError> {
        self.database
            .generations()
            .delete_for_user(user_id, generation_id)
            .await
            .map_err(|err| match AppError::from(err) {
                AppError::NotFound(_) => AppError::NotFound("Generation not found".to_string()),
                other => other,
            })?;
        info!(user_id, generation_id, "Generation deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::MockCompletionProvider;
    use crate::config::Config;
    use crate::database::DatabaseManagerImpl;
    use crate::database::entities::{Plan, UserRecord};

    struct Fixture {
        service: GenerationService,
        provider: MockCompletionProvider,
        db: Arc<dyn DatabaseManager>,
        user_id: i32,
    }

    async fn fixture(provider: MockCompletionProvider, plan: Plan, used: i32) -> Fixture {
        let mut config = Config::default();
        config.database.url = "sqlite::memory:".to_string();
        let db = DatabaseManagerImpl::new_from_config(&config).await.unwrap();
        db.migrate().await.unwrap();
        let db: Arc<dyn DatabaseManager> = Arc::new(db);

        let user = db
            .users()
            .create(
                &UserRecord::new("gen@example.com", "gen", "hash")
                    .with_plan(plan)
                    .with_usage(used),
            )
            .await
            .unwrap();

        let ledger = EntitlementLedger::new(db.clone(), config.plans.limits());
        let service = GenerationService::new(ledger, Arc::new(provider.clone()), db.clone());

        Fixture {
            service,
            provider,
            db,
            user_id: user.id,
        }
    }

    fn request(content_type: &str) -> GenerationRequest {
        GenerationRequest {
            content_type: content_type.to_string(),
            topic: "Rust".to_string(),
            tone: "casual".to_string(),
            length: "corta".to_string(),
            additional_prompt: None,
        }
    }

    #[tokio::test]
    async fn test_generate_stores_record_and_counts() {
        let f = fixture(MockCompletionProvider::new(), Plan::Free, 9).await;

        let response = f.service.generate(f.user_id, &request("title")).await.unwrap();
        assert!(response.generated_content.contains("Rust"));
        assert_eq!(response.model_used.as_deref(), Some("mock-model"));
        assert_eq!(response.tokens_used, Some(42));

        let user = f.db.users().find_by_id(f.user_id).await.unwrap().unwrap();
        assert_eq!(user.generations_used, 10);
        assert_eq!(f.service.list(f.user_id, 0, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_quota_is_payment_required_without_provider_call() {
        let f = fixture(MockCompletionProvider::new(), Plan::Free, 10).await;

        let err = f.service.generate(f.user_id, &request("email")).await.unwrap_err();
        assert!(matches!(err, AppError::PaymentRequired(_)));
        assert_eq!(f.provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_validation_runs_before_quota_check() {
        let f = fixture(MockCompletionProvider::new(), Plan::Free, 10).await;

        let err = f.service.generate(f.user_id, &request("poem")).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(f.provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_provider_failure_writes_nothing() {
        let f = fixture(MockCompletionProvider::failing(), Plan::Free, 3).await;

        let err = f.service.generate(f.user_id, &request("blog_post")).await.unwrap_err();
        assert!(matches!(err, AppError::Upstream(_)));
        assert_eq!(f.provider.calls(), 1);

        let user = f.db.users().find_by_id(f.user_id).await.unwrap().unwrap();
        assert_eq!(user.generations_used, 3);
        assert_eq!(f.db.generations().count_by_user(f.user_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unbounded_plan_never_blocks() {
        let f = fixture(MockCompletionProvider::new(), Plan::Admin, 1_000_000).await;
        assert!(f.service.generate(f.user_id, &request("description")).await.is_ok());
    }

    #[tokio::test]
    async fn test_history_get_and_delete() {
        let f = fixture(MockCompletionProvider::new(), Plan::Pro, 0).await;
        let first = f.service.generate(f.user_id, &request("email")).await.unwrap();
        let second = f.service.generate(f.user_id, &request("title")).await.unwrap();

        let history = f.service.list(f.user_id, 0, 500).await.unwrap();
        assert_eq!(history.first().map(|g| g.id), Some(second.id));

        assert_eq!(f.service.get(f.user_id, first.id).await.unwrap().id, first.id);
        f.service.delete(f.user_id, first.id).await.unwrap();
        assert!(matches!(
            f.service.get(f.user_id, first.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            f.service.delete(f.user_id, first.id).await,
            Err(AppError::NotFound(_))
        ));

        // Deleting history never gives quota back
        let user = f.db.users().find_by_id(f.user_id).await.unwrap().unwrap();
        assert_eq!(user.generations_used, 2);
    }
}
