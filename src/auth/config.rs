use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    #[serde(default = "default_jwt_algorithm")]
    pub algorithm: String,
    /// Access token lifetime in seconds
    #[serde(default = "default_access_token_ttl")]
    pub access_token_ttl: u64,
}

fn default_jwt_algorithm() -> String {
    "HS256".to_string()
}

fn default_access_token_ttl() -> u64 {
    1800 // 30 minutes
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: "change-me-jwt-secret".to_string(),
            algorithm: default_jwt_algorithm(),
            access_token_ttl: default_access_token_ttl(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyConfig {
    /// Accept `gcai_` keys as bearer credentials
    #[serde(default = "default_api_key_enabled")]
    pub enabled: bool,
    /// Expiry applied when a create request names none; `None` keeps such keys forever
    #[serde(default)]
    pub default_expiry_days: Option<u32>,
    #[serde(default = "default_api_key_max_keys_per_user")]
    pub max_keys_per_user: u32,
}

fn default_api_key_enabled() -> bool {
    true
}

fn default_api_key_max_keys_per_user() -> u32 {
    10
}

impl Default for ApiKeyConfig {
    fn default() -> Self {
        Self {
            enabled: default_api_key_enabled(),
            default_expiry_days: None,
            max_keys_per_user: default_api_key_max_keys_per_user(),
        }
    }
}
