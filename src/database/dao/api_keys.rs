use crate::database::entities::{ApiKeyRecord, api_keys};
use crate::database::{DatabaseError, DatabaseResult};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};

/// API keys DAO. Lookups by owner only ever see active keys.
#[derive(Clone)]
pub struct ApiKeysDao {
    db: DatabaseConnection,
}

impl ApiKeysDao {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn store(&self, api_key: &ApiKeyRecord) -> DatabaseResult<ApiKeyRecord> {
        let active_model = api_keys::ActiveModel {
            id: ActiveValue::NotSet,
            user_id: Set(api_key.user_id),
            key_hash: Set(api_key.key_hash.clone()),
            key_prefix: Set(api_key.key_prefix.clone()),
            name: Set(api_key.name.clone()),
            is_active: Set(api_key.is_active),
            last_used: Set(api_key.last_used),
            created_at: Set(api_key.created_at),
            expires_at: Set(api_key.expires_at),
        };

        active_model
            .insert(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))
    }

    pub async fn find_by_hash(&self, key_hash: &str) -> DatabaseResult<Option<ApiKeyRecord>> {
        api_keys::Entity::find()
            .filter(api_keys::Column::KeyHash.eq(key_hash))
            .one(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))
    }

    /// Active keys of one account, newest first
    pub async fn find_by_user(&self, user_id: i32) -> DatabaseResult<Vec<ApiKeyRecord>> {
        api_keys::Entity::find()
            .filter(api_keys::Column::UserId.eq(user_id))
            .filter(api_keys::Column::IsActive.eq(true))
            .order_by_desc(api_keys::Column::CreatedAt)
            .order_by_desc(api_keys::Column::Id)
            .all(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))
    }

    pub async fn count_by_user(&self, user_id: i32) -> DatabaseResult<u64> {
        api_keys::Entity::find()
            .filter(api_keys::Column::UserId.eq(user_id))
            .filter(api_keys::Column::IsActive.eq(true))
            .count(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))
    }

    pub async fn update_last_used(&self, key_id: i32) -> DatabaseResult<()> {
        api_keys::Entity::update_many()
            .col_expr(
                api_keys::Column::LastUsed,
                sea_orm::sea_query::Expr::value(Utc::now()),
            )
            .filter(api_keys::Column::Id.eq(key_id))
            .exec(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))?;
        Ok(())
    }

    /// Deactivate one of the account's keys. `NotFound` when it is not theirs or already revoked.
    pub async fn revoke_for_user(&self, user_id: i32, key_id: i32) -> DatabaseResult<()> {
        let result = api_keys::Entity::update_many()
            .col_expr(
                api_keys::Column::IsActive,
                sea_orm::sea_query::Expr::value(false),
            )
            .filter(api_keys::Column::Id.eq(key_id))
            .filter(api_keys::Column::UserId.eq(user_id))
            .filter(api_keys::Column::IsActive.eq(true))
            .exec(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            return Err(DatabaseError::NotFound);
        }
        Ok(())
    }
}
