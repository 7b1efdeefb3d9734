use crate::database::entities::{GenerationRecord, generations};
use crate::database::{DatabaseError, DatabaseResult};
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};

/// Generation history DAO. Every read is scoped to the owning account.
#[derive(Clone)]
pub struct GenerationsDao {
    db: DatabaseConnection,
}

impl GenerationsDao {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Append a record on the given connection or transaction
    pub async fn insert_in<C: ConnectionTrait>(
        conn: &C,
        record: &GenerationRecord,
    ) -> DatabaseResult<GenerationRecord> {
        let active_model = generations::ActiveModel {
            id: ActiveValue::NotSet,
            user_id: Set(record.user_id),
            content_type: Set(record.content_type.clone()),
            topic: Set(record.topic.clone()),
            tone: Set(record.tone.clone()),
            length: Set(record.length.clone()),
            additional_prompt: Set(record.additional_prompt.clone()),
            generated_content: Set(record.generated_content.clone()),
            tokens_used: Set(record.tokens_used),
            processing_time_ms: Set(record.processing_time_ms),
            model_used: Set(record.model_used.clone()),
            created_at: Set(record.created_at),
        };

        active_model
            .insert(conn)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))
    }

    /// Newest first
    pub async fn list_by_user(
        &self,
        user_id: i32,
        skip: u64,
        limit: u64,
    ) -> DatabaseResult<Vec<GenerationRecord>> {
        generations::Entity::find()
            .filter(generations::Column::UserId.eq(user_id))
            .order_by_desc(generations::Column::CreatedAt)
            .order_by_desc(generations::Column::Id)
            .offset(skip)
            .limit(limit)
            .all(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))
    }

    pub async fn count_by_user(&self, user_id: i32) -> DatabaseResult<u64> {
        generations::Entity::find()
            .filter(generations::Column::UserId.eq(user_id))
            .count(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))
    }

    /// Fetch one record if it belongs to `user_id`
    pub async fn find_for_user(
        &self,
        user_id: i32,
        generation_id: i32,
    ) -> DatabaseResult<Option<GenerationRecord>> {
        generations::Entity::find_by_id(generation_id)
            .filter(generations::Column::UserId.eq(user_id))
            .one(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))
    }

    /// Delete one record owned by `user_id`; `NotFound` when absent or foreign
    pub async fn delete_for_user(&self, user_id: i32, generation_id: i32) -> DatabaseResult<()> {
        let result = generations::Entity::delete_many()
            .filter(generations::Column::Id.eq(generation_id))
            .filter(generations::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            return Err(DatabaseError::NotFound);
        }
        Ok(())
    }
}
