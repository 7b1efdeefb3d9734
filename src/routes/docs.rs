use crate::server::Server;
use axum::Router;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Content Generator API",
        version = "1.0.0",
        description = "Content generation backend with plan-based monthly quotas and subscription billing"
    ),
    paths(
        crate::routes::health::health_check,
        crate::routes::auth::register,
        crate::routes::auth::login,
        crate::routes::auth::me,
        crate::routes::auth::refresh,
        crate::routes::auth::logout,
        crate::routes::generation::generate,
        crate::routes::generation::list_generations,
        crate::routes::generation::get_generation,
        crate::routes::generation::delete_generation,
        crate::routes::generation::usage,
        crate::routes::plans::list_plans,
        crate::routes::billing::checkout,
        crate::routes::billing::cancel_subscription,
        crate::routes::billing::subscription,
        crate::routes::billing::payment_link,
        crate::routes::billing::transaction,
        crate::routes::webhooks::stripe_webhook,
        crate::routes::webhooks::wompi_webhook,
        crate::routes::admin::reset_usage,
        crate::routes::admin::update_plan,
        crate::routes::api_keys::create_api_key,
        crate::routes::api_keys::list_api_keys,
        crate::routes::api_keys::revoke_api_key,
    ),
    components(
        schemas(
            crate::routes::ApiErrorResponse,
            crate::routes::MessageResponse,
            crate::health::HealthReport,
            crate::health::HealthStatus,
            crate::health::HealthCheckResult,
            crate::routes::auth::RegisterRequest,
            crate::routes::auth::LoginRequest,
            crate::routes::auth::UserResponse,
            crate::routes::auth::TokenResponse,
            crate::database::entities::Plan,
            crate::generation::GenerationRequest,
            crate::generation::GenerationResponse,
            crate::routes::generation::GenerationListResponse,
            crate::entitlement::UsageSummary,
            crate::entitlement::EntitlementState,
            crate::routes::plans::PlanInfo,
            crate::routes::plans::PlansResponse,
            crate::routes::billing::PlanPurchaseRequest,
            crate::routes::billing::CheckoutResponse,
            crate::billing::SubscriptionInfo,
            crate::billing::PaymentLink,
            crate::billing::TransactionInfo,
            crate::billing::WebhookOutcome,
            crate::routes::admin::UpdatePlanRequest,
            crate::auth::api_key::CreateApiKeyRequest,
            crate::auth::api_key::CreateApiKeyResponse,
            crate::database::entities::ApiKeyInfo,
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Authentication", description = "Registration, login and access tokens"),
        (name = "Generation", description = "Content generation, history and usage"),
        (name = "Plans", description = "Plan catalog"),
        (name = "Billing", description = "Stripe subscriptions and Wompi payment links"),
        (name = "Webhooks", description = "Signed payment provider callbacks"),
        (name = "Admin", description = "Account administration (Admin plan only)"),
        (name = "API Keys", description = "Programmatic `gcai_` credentials, managed with a login token"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "jwt_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-API-Key"))),
            );
        }
    }
}

/// Swagger UI at `/docs`, document at `/docs/openapi.json`
pub fn create_docs_routes() -> Router<Server> {
    Router::new().merge(SwaggerUi::new("/docs").url("/docs/openapi.json", ApiDoc::openapi()))
}
