use chrono::{DateTime, Utc};
use rand::{Rng, distr::Alphanumeric};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

/// Every issued key starts with this
pub const API_KEY_PREFIX: &str = "gcai_";
/// Random characters after the prefix
pub const API_KEY_RANDOM_LENGTH: usize = 43;
/// Leading characters kept in clear so owners can tell keys apart
pub const KEY_PREFIX_LENGTH: usize = 8;

/// Programmatic credential for an account. Only the SHA-256 of the key is stored.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "api_keys")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    #[sea_orm(unique)]
    pub key_hash: String,
    pub key_prefix: String,
    pub name: String,
    pub is_active: bool,
    pub last_used: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Key metadata as shown to its owner; never the key or its hash
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiKeyInfo {
    pub id: i32,
    pub name: String,
    /// First characters of the key, e.g. `gcai_AbC`
    pub key_prefix: String,
    pub is_active: bool,
    pub last_used: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<Model> for ApiKeyInfo {
    fn from(key: Model) -> Self {
        Self {
            id: key.id,
            name: key.name,
            key_prefix: key.key_prefix,
            is_active: key.is_active,
            last_used: key.last_used,
            created_at: key.created_at,
            expires_at: key.expires_at,
        }
    }
}

impl Model {
    /// New active key for `user_id`, together with the raw key to hand out once
    pub fn new(user_id: i32, name: String, expires_at: Option<DateTime<Utc>>) -> (Self, String) {
        let raw_key = generate_api_key();
        let api_key = Self {
            id: 0,
            user_id,
            key_hash: hash_api_key(&raw_key),
            key_prefix: raw_key.chars().take(KEY_PREFIX_LENGTH).collect(),
            name,
            is_active: true,
            last_used: None,
            created_at: Utc::now(),
            expires_at,
        };
        (api_key, raw_key)
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= Utc::now())
    }

    /// Active and not expired
    pub fn is_valid(&self) -> bool {
        self.is_active && !self.is_expired()
    }
}

fn generate_api_key() -> String {
    let random_part: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(API_KEY_RANDOM_LENGTH)
        .map(char::from)
        .collect();

    format!("{}{}", API_KEY_PREFIX, random_part)
}

/// Hex SHA-256 of the raw key
pub fn hash_api_key(api_key: &str) -> String {
    hex::encode(Sha256::digest(api_key.as_bytes()))
}

/// Cheap shape check before touching the database
pub fn validate_api_key_format(api_key: &str) -> Result<(), crate::error::AppError> {
    let valid = api_key
        .strip_prefix(API_KEY_PREFIX)
        .is_some_and(|random| {
            random.len() == API_KEY_RANDOM_LENGTH && random.chars().all(|c| c.is_ascii_alphanumeric())
        });

    if !valid {
        return Err(crate::error::AppError::Unauthorized(
            "Invalid API key format".to_string(),
        ));
    }
    Ok(())
}
