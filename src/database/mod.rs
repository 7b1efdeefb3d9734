//! Database access layer with domain-specific DAOs
//!
//! Accounts (with their entitlement counters) live in `users`, generation history in
//! `generations`, programmatic credentials in `api_keys`. Each table has its own DAO.

use crate::config::Config;
use crate::health::HealthChecker;
use async_trait::async_trait;
use sea_orm::{ConnectOptions, DatabaseConnection};
use thiserror::Error;

pub mod config;
pub mod dao;
pub mod entities;
pub mod migration;

pub use dao::{ApiKeysDao, GenerationsDao, UsersDao};

/// Database error types
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Record not found")]
    NotFound,
    #[error("Constraint violation: {0}")]
    Constraint(String),
    #[error("Migration error: {0}")]
    Migration(String),
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Database manager trait for dependency injection and testing
#[async_trait]
pub trait DatabaseManager: Send + Sync {
    /// Run database migrations
    async fn migrate(&self) -> DatabaseResult<()>;

    /// Health check for database connection
    async fn health_check(&self) -> DatabaseResult<()>;

    /// Get users DAO
    fn users(&self) -> UsersDao;

    /// Get generations DAO
    fn generations(&self) -> GenerationsDao;

    /// Get API keys DAO
    fn api_keys(&self) -> ApiKeysDao;

    /// Get direct database connection (for transactions and admin operations)
    fn connection(&self) -> &DatabaseConnection;
}

/// Database connection manager implementation
pub struct DatabaseManagerImpl {
    pub connection: DatabaseConnection,
}

impl DatabaseManagerImpl {
    /// Create database manager from configuration
    pub async fn new_from_config(config: &Config) -> Result<Self, DatabaseError> {
        let url = config.database.url.clone();
        // Every pooled connection to an in-memory SQLite URL opens its own database
        let max_connections = if url.contains(":memory:") {
            1
        } else {
            config.database.max_connections
        };

        let mut options = ConnectOptions::new(url);
        options
            .max_connections(max_connections)
            .sqlx_logging(false);

        let connection = sea_orm::Database::connect(options)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))?;

        Ok(Self { connection })
    }

    /// Wrap an existing connection
    pub fn from_connection(connection: DatabaseConnection) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl DatabaseManager for DatabaseManagerImpl {
    async fn migrate(&self) -> DatabaseResult<()> {
        use crate::database::migration::Migrator;
        use sea_orm_migration::MigratorTrait;

        tracing::info!("Running database migrations");

        Migrator::up(&self.connection, None)
            .await
            .map_err(|e| DatabaseError::Migration(format!("Failed to run migrations: {}", e)))?;

        tracing::info!("Successfully completed all migrations");
        Ok(())
    }

    async fn health_check(&self) -> DatabaseResult<()> {
        self.connection
            .ping()
            .await
            .map_err(|e| DatabaseError::Database(format!("db error: {}", e)))
    }

    fn users(&self) -> UsersDao {
        UsersDao::new(self.connection.clone())
    }

    fn generations(&self) -> GenerationsDao {
        GenerationsDao::new(self.connection.clone())
    }

    fn api_keys(&self) -> ApiKeysDao {
        ApiKeysDao::new(self.connection.clone())
    }

    fn connection(&self) -> &DatabaseConnection {
        &self.connection
    }
}

#[async_trait]
impl HealthChecker for DatabaseManagerImpl {
    fn name(&self) -> &str {
        "database"
    }

    async fn check(&self) -> crate::health::HealthCheckResult {
        match self.health_check().await {
            Ok(_) => crate::health::HealthCheckResult::healthy_with_details(serde_json::json!({
                "status": "healthy",
                "connection": "ok"
            })),
            Err(err) => crate::health::HealthCheckResult::unhealthy_with_details(
                "DB health check failed".to_string(),
                serde_json::json!({
                    "status": "unhealthy",
                    "error": err.to_string()
                }),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::entities::{ApiKeyRecord, GenerationRecord, Plan, UserRecord};
    use chrono::Utc;

    async fn memory_db() -> DatabaseManagerImpl {
        let mut config = Config::default();
        config.database.url = "sqlite::memory:".to_string();
        let db = DatabaseManagerImpl::new_from_config(&config).await.unwrap();
        db.migrate().await.unwrap();
        db
    }

    fn generation_for(user_id: i32, topic: &str) -> GenerationRecord {
        GenerationRecord {
            id: 0,
            user_id,
            content_type: "email".to_string(),
            topic: topic.to_string(),
            tone: "formal".to_string(),
            length: "corta".to_string(),
            additional_prompt: None,
            generated_content: format!("content about {}", topic),
            tokens_used: Some(42),
            processing_time_ms: Some(12),
            model_used: Some("mock-model".to_string()),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_and_find_user() {
        let db = memory_db().await;
        let created = db
            .users()
            .create(&UserRecord::new("a@example.com", "alice", "hash"))
            .await
            .unwrap();

        assert!(created.id > 0);
        assert_eq!(created.plan, Plan::Free);
        assert_eq!(created.generations_used, 0);

        let by_email = db.users().find_by_email("a@example.com").await.unwrap();
        assert_eq!(by_email.map(|u| u.id), Some(created.id));
        let by_username = db.users().find_by_username("alice").await.unwrap();
        assert_eq!(by_username.map(|u| u.id), Some(created.id));
        assert!(db.users().find_by_id(9999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_constraint_error() {
        let db = memory_db().await;
        db.users()
            .create(&UserRecord::new("a@example.com", "alice", "hash"))
            .await
            .unwrap();
        let err = db
            .users()
            .create(&UserRecord::new("a@example.com", "other", "hash"))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Constraint(_)));
    }

    #[tokio::test]
    async fn test_conditional_increment_respects_limit_and_plan() {
        let db = memory_db().await;
        let user = db
            .users()
            .create(&UserRecord::new("a@example.com", "alice", "hash").with_usage(9))
            .await
            .unwrap();

        let conn = db.connection();
        assert!(
            UsersDao::increment_usage_if_below(conn, user.id, Plan::Free, Some(10))
                .await
                .unwrap()
        );
        assert!(
            !UsersDao::increment_usage_if_below(conn, user.id, Plan::Free, Some(10))
                .await
                .unwrap()
        );
        // Stale plan never matches
        assert!(
            !UsersDao::increment_usage_if_below(conn, user.id, Plan::Pro, None)
                .await
                .unwrap()
        );

        let stored = db.users().find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.generations_used, 10);
    }

    #[tokio::test]
    async fn test_reset_all_usage() {
        let db = memory_db().await;
        for (email, name) in [("a@example.com", "a"), ("b@example.com", "b")] {
            db.users()
                .create(&UserRecord::new(email, name, "hash").with_usage(7))
                .await
                .unwrap();
        }

        assert_eq!(db.users().reset_all_usage().await.unwrap(), 2);
        let user = db.users().find_by_username("b").await.unwrap().unwrap();
        assert_eq!(user.generations_used, 0);
    }

    #[tokio::test]
    async fn test_update_missing_user_is_not_found() {
        let db = memory_db().await;
        let err = db.users().update_plan(404, Plan::Pro).await.unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound));
        let err = db.users().increment_usage(404).await.unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound));
    }

    #[tokio::test]
    async fn test_generation_history_is_owner_scoped() {
        let db = memory_db().await;
        let alice = db
            .users()
            .create(&UserRecord::new("a@example.com", "alice", "hash"))
            .await
            .unwrap();
        let bob = db
            .users()
            .create(&UserRecord::new("b@example.com", "bob", "hash"))
            .await
            .unwrap();

        let first = GenerationsDao::insert_in(db.connection(), &generation_for(alice.id, "first"))
            .await
            .unwrap();
        let second =
            GenerationsDao::insert_in(db.connection(), &generation_for(alice.id, "second"))
                .await
                .unwrap();

        let history = db.generations().list_by_user(alice.id, 0, 10).await.unwrap();
        assert_eq!(
            history.iter().map(|g| g.id).collect::<Vec<_>>(),
            vec![second.id, first.id]
        );
        assert_eq!(db.generations().list_by_user(alice.id, 1, 10).await.unwrap().len(), 1);
        assert!(db.generations().list_by_user(bob.id, 0, 10).await.unwrap().is_empty());

        assert!(
            db.generations()
                .find_for_user(bob.id, first.id)
                .await
                .unwrap()
                .is_none()
        );
        assert!(matches!(
            db.generations().delete_for_user(bob.id, first.id).await,
            Err(DatabaseError::NotFound)
        ));

        db.generations().delete_for_user(alice.id, first.id).await.unwrap();
        assert_eq!(db.generations().count_by_user(alice.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_api_key_lifecycle() {
        let db = memory_db().await;
        let alice = db
            .users()
            .create(&UserRecord::new("a@example.com", "alice", "hash"))
            .await
            .unwrap();
        let bob = db
            .users()
            .create(&UserRecord::new("b@example.com", "bob", "hash"))
            .await
            .unwrap();

        let (key, raw) = ApiKeyRecord::new(alice.id, "ci".to_string(), None);
        let stored = db.api_keys().store(&key).await.unwrap();
        assert!(stored.id > 0);
        assert_eq!(stored.key_prefix, &raw[..8]);

        let found = db
            .api_keys()
            .find_by_hash(&crate::database::entities::api_keys::hash_api_key(&raw))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, stored.id);
        assert!(found.last_used.is_none());

        db.api_keys().update_last_used(stored.id).await.unwrap();
        let touched = db.api_keys().find_by_user(alice.id).await.unwrap();
        assert!(touched[0].last_used.is_some());

        // Someone else's key is invisible to them
        assert!(matches!(
            db.api_keys().revoke_for_user(bob.id, stored.id).await,
            Err(DatabaseError::NotFound)
        ));

        db.api_keys().revoke_for_user(alice.id, stored.id).await.unwrap();
        assert_eq!(db.api_keys().count_by_user(alice.id).await.unwrap(), 0);
        assert!(matches!(
            db.api_keys().revoke_for_user(alice.id, stored.id).await,
            Err(DatabaseError::NotFound)
        ));
        let revoked = db.api_keys().find_by_hash(&found.key_hash).await.unwrap().unwrap();
        assert!(!revoked.is_active);
    }
}
