pub use crate::database::entities::api_keys::{
    API_KEY_PREFIX, ApiKeyInfo, Model as ApiKey, hash_api_key, validate_api_key_format,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const MAX_KEY_NAME_LENGTH: usize = 100;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateApiKeyRequest {
    pub name: String,
    /// Falls back to the configured default; omit both for a key that never expires
    #[serde(default)]
    pub expires_in_days: Option<u32>,
}

/// The only response that ever carries the raw key
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateApiKeyResponse {
    pub id: i32,
    pub name: String,
    pub key: String,
    pub key_prefix: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}
