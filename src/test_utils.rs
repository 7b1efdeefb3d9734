use crate::{
    billing::{MockStripeApi, MockWompiApi},
    completion::MockCompletionProvider,
    config::Config,
    database::{
        DatabaseManager, DatabaseManagerImpl,
        entities::{ApiKeyRecord, Plan, UserRecord},
    },
    server::{Server, ServerDependencies},
};
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub const TEST_JWT_SECRET: &str = "test-secret";
pub const TEST_PASSWORD: &str = "password123";
pub const TEST_STRIPE_WEBHOOK_SECRET: &str = "whsec_test";
pub const TEST_WOMPI_EVENTS_SECRET: &str = "test_events_secret";

/// Builds a `Server` on in-memory SQLite with in-process providers
pub struct TestServerBuilder {
    config: Config,
    database_url: String,
    provider: MockCompletionProvider,
    stripe: MockStripeApi,
    wompi: MockWompiApi,
}

impl Default for TestServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestServerBuilder {
    pub fn new() -> Self {
        let mut config = Config::default();
        config.jwt.secret = TEST_JWT_SECRET.to_string();
        config.metrics.enabled = false;
        config.logging.log_request = false;
        config.jobs.enabled = false;
        config.billing.stripe.secret_key = "sk_test_mock".to_string();
        config.billing.stripe.webhook_secret = TEST_STRIPE_WEBHOOK_SECRET.to_string();
        config.billing.wompi.events_secret = TEST_WOMPI_EVENTS_SECRET.to_string();
        config.plans.pro.stripe_price_id = Some("price_pro_test".to_string());
        config.plans.enterprise.stripe_price_id = Some("price_enterprise_test".to_string());

        Self {
            config,
            database_url: "sqlite::memory:".to_string(),
            provider: MockCompletionProvider::new(),
            stripe: MockStripeApi::new(),
            wompi: MockWompiApi::new(),
        }
    }

    /// Adjust the test configuration; the database URL is set with `with_database_url`
    pub fn with_config(mut self, configure: impl FnOnce(&mut Config)) -> Self {
        configure(&mut self.config);
        self
    }

    /// Use a real database, e.g. a SQLite file in a temp dir, instead of memory
    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = url.into();
        self
    }

    pub fn with_provider(mut self, provider: MockCompletionProvider) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_stripe(mut self, stripe: MockStripeApi) -> Self {
        self.stripe = stripe;
        self
    }

    pub fn with_wompi(mut self, wompi: MockWompiApi) -> Self {
        self.wompi = wompi;
        self
    }

    pub async fn build(mut self) -> Server {
        self.config.database.url = self.database_url;
        let database = Arc::new(
            DatabaseManagerImpl::new_from_config(&self.config)
                .await
                .unwrap(),
        );
        database.migrate().await.unwrap();

        Server::with_dependencies(
            self.config,
            ServerDependencies {
                database,
                provider: Arc::new(self.provider),
                stripe_api: Arc::new(self.stripe),
                wompi_api: Arc::new(self.wompi),
            },
        )
        .await
        .unwrap()
    }
}

impl Server {
    pub async fn insert_user(&self, user: UserRecord) -> UserRecord {
        self.database.users().create(&user).await.unwrap()
    }

    /// Account whose password is `TEST_PASSWORD`
    pub async fn create_test_user(&self, email: &str, plan: Plan) -> UserRecord {
        let username = email.split('@').next().unwrap_or(email).replace('.', "_");
        let hash = crate::auth::password::hash_password(TEST_PASSWORD).unwrap();
        self.insert_user(UserRecord::new(email, username, hash).with_plan(plan))
            .await
    }

    pub fn token_for(&self, user: &UserRecord) -> String {
        self.jwt_service.create_token(user.id).unwrap()
    }

    /// Store a key for `user`, returning the stored row and the raw key
    pub async fn api_key_for(
        &self,
        user: &UserRecord,
        expires_at: Option<DateTime<Utc>>,
    ) -> (ApiKeyRecord, String) {
        let (key, raw) = ApiKeyRecord::new(user.id, "test key".to_string(), expires_at);
        let stored = self.database.api_keys().store(&key).await.unwrap();
        (stored, raw)
    }
}
