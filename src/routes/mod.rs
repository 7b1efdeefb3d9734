pub mod admin;
pub mod api_keys;
pub mod auth;
pub mod billing;
pub mod docs;
pub mod generation;
pub mod health;
pub mod plans;
pub mod webhooks;

use serde::Serialize;
use utoipa::ToSchema;

pub use admin::create_admin_routes;
pub use api_keys::create_api_key_routes;
pub use auth::{create_auth_routes, create_protected_auth_routes, create_session_routes};
pub use billing::create_billing_routes;
pub use docs::create_docs_routes;
pub use generation::create_generation_routes;
pub use health::create_health_routes;
pub use plans::create_plans_routes;
pub use webhooks::create_webhook_routes;

/// Error body shape, see `AppError::into_response`
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiErrorResponse {
    /// Error category
    pub error: String,
    /// Human-readable detail
    pub message: String,
}

/// Plain acknowledgement body
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
