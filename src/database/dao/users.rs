use crate::database::entities::{Plan, UserRecord, users};
use crate::database::{DatabaseError, DatabaseResult};
use chrono::Utc;
use sea_orm::sea_query::{Expr, SimpleExpr};
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, Set,
};

/// Users DAO for account and counter operations
#[derive(Clone)]
pub struct UsersDao {
    db: DatabaseConnection,
}

impl UsersDao {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Insert a new account, returning the stored row
    pub async fn create(&self, user: &UserRecord) -> DatabaseResult<UserRecord> {
        let now = Utc::now();
        let active_model = users::ActiveModel {
            id: ActiveValue::NotSet,
            email: Set(user.email.clone()),
            username: Set(user.username.clone()),
            password_hash: Set(user.password_hash.clone()),
            full_name: Set(user.full_name.clone()),
            is_active: Set(user.is_active),
            is_verified: Set(user.is_verified),
            plan: Set(user.plan),
            generations_used: Set(user.generations_used),
            period_start: Set(now),
            stripe_customer_id: Set(user.stripe_customer_id.clone()),
            stripe_subscription_id: Set(user.stripe_subscription_id.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        };

        active_model.insert(&self.db).await.map_err(|e| {
            let message = e.to_string();
            if message.to_lowercase().contains("unique") {
                DatabaseError::Constraint(message)
            } else {
                DatabaseError::Database(message)
            }
        })
    }

    /// Find user by ID
    pub async fn find_by_id(&self, user_id: i32) -> DatabaseResult<Option<UserRecord>> {
        Self::find_by_id_in(&self.db, user_id).await
    }

    /// Find user by ID on an arbitrary connection or transaction
    pub async fn find_by_id_in<C: ConnectionTrait>(
        conn: &C,
        user_id: i32,
    ) -> DatabaseResult<Option<UserRecord>> {
        users::Entity::find_by_id(user_id)
            .one(conn)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))
    }

    /// Find user by email
    pub async fn find_by_email(&self, email: &str) -> DatabaseResult<Option<UserRecord>> {
        users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))
    }

    /// Find user by username
    pub async fn find_by_username(&self, username: &str) -> DatabaseResult<Option<UserRecord>> {
        users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))
    }

    /// Find user by Stripe customer id
    pub async fn find_by_stripe_customer(
        &self,
        customer_id: &str,
    ) -> DatabaseResult<Option<UserRecord>> {
        users::Entity::find()
            .filter(users::Column::StripeCustomerId.eq(customer_id))
            .one(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))
    }

    /// Conditionally add one generation to the counter.
    ///
    /// The row only matches while it still carries `plan` and, for limited plans,
    /// while `generations_used < limit`. Returns whether a row was updated.
    pub async fn increment_usage_if_below<C: ConnectionTrait>(
        conn: &C,
        user_id: i32,
        plan: Plan,
        limit: Option<u32>,
    ) -> DatabaseResult<bool> {
        let mut update = users::Entity::update_many()
            .col_expr(users::Column::GenerationsUsed, saturating_increment())
            .col_expr(users::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(users::Column::Id.eq(user_id))
            .filter(users::Column::Plan.eq(plan));

        if let Some(limit) = limit {
            update = update.filter(users::Column::GenerationsUsed.lt(i64::from(limit)));
        }

        let result = update
            .exec(conn)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))?;

        Ok(result.rows_affected == 1)
    }

    /// Add one generation to the counter without looking at the limit
    pub async fn increment_usage(&self, user_id: i32) -> DatabaseResult<()> {
        let result = users::Entity::update_many()
            .col_expr(users::Column::GenerationsUsed, saturating_increment())
            .col_expr(users::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(users::Column::Id.eq(user_id))
            .exec(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            return Err(DatabaseError::NotFound);
        }
        Ok(())
    }

    /// Zero the counter and start a new period
    pub async fn reset_usage(&self, user_id: i32) -> DatabaseResult<UserRecord> {
        let now = Utc::now();
        let active_model = users::ActiveModel {
            id: Set(user_id),
            generations_used: Set(0),
            period_start: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        active_model.update(&self.db).await.map_err(map_update_error)
    }

    /// Zero every counter, returning the number of accounts touched
    pub async fn reset_all_usage(&self) -> DatabaseResult<u64> {
        let now = Utc::now();
        let result = users::Entity::update_many()
            .col_expr(users::Column::GenerationsUsed, Expr::value(0))
            .col_expr(users::Column::PeriodStart, Expr::value(now))
            .col_expr(users::Column::UpdatedAt, Expr::value(now))
            .exec(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// Change the plan. The counter is left untouched.
    pub async fn update_plan(&self, user_id: i32, plan: Plan) -> DatabaseResult<UserRecord> {
        let active_model = users::ActiveModel {
            id: Set(user_id),
            plan: Set(plan),
            updated_at: Set(Utc::now()),
            ..Default::default()
        };

        active_model.update(&self.db).await.map_err(map_update_error)
    }

    /// Record the Stripe customer created for this account
    pub async fn set_stripe_customer(
        &self,
        user_id: i32,
        customer_id: &str,
    ) -> DatabaseResult<UserRecord> {
        let active_model = users::ActiveModel {
            id: Set(user_id),
            stripe_customer_id: Set(Some(customer_id.to_string())),
            updated_at: Set(Utc::now()),
            ..Default::default()
        };

        active_model.update(&self.db).await.map_err(map_update_error)
    }

    /// Apply a subscription outcome: new plan plus the subscription id (or none)
    pub async fn set_subscription(
        &self,
        user_id: i32,
        plan: Plan,
        subscription_id: Option<String>,
    ) -> DatabaseResult<UserRecord> {
        let active_model = users::ActiveModel {
            id: Set(user_id),
            plan: Set(plan),
            stripe_subscription_id: Set(subscription_id),
            updated_at: Set(Utc::now()),
            ..Default::default()
        };

        active_model.update(&self.db).await.map_err(map_update_error)
    }

    /// Count all accounts
    pub async fn count(&self) -> DatabaseResult<u64> {
        users::Entity::find()
            .count(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))
    }
}

/// `generations_used + 1`, pinned at the column maximum so unbounded plans never overflow
fn saturating_increment() -> SimpleExpr {
    Expr::case(
        Expr::col(users::Column::GenerationsUsed).lt(i32::MAX),
        Expr::col(users::Column::GenerationsUsed).add(1),
    )
    .finally(Expr::col(users::Column::GenerationsUsed))
    .into()
}

fn map_update_error(err: sea_orm::DbErr) -> DatabaseError {
    match err {
        sea_orm::DbErr::RecordNotUpdated | sea_orm::DbErr::RecordNotFound(_) => {
            DatabaseError::NotFound
        }
        other => DatabaseError::Database(other.to_string()),
    }
}
