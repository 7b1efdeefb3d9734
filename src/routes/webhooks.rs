use crate::{
    billing::WebhookOutcome, error::AppError, metrics, routes::ApiErrorResponse, server::Server,
};
use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::post,
};
use tracing::warn;

pub const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

pub fn create_webhook_routes() -> Router<Server> {
    Router::new()
        .route("/stripe", post(stripe_webhook))
        .route("/wompi", post(wompi_webhook))
}

fn record(
    provider: &'static str,
    result: Result<WebhookOutcome, AppError>,
) -> Result<Json<WebhookOutcome>, AppError> {
    match result {
        Ok(outcome) => {
            metrics::track_webhook(provider, StatusCode::OK);
            Ok(Json(outcome))
        }
        Err(err) => {
            warn!(provider, error = %err, "Webhook rejected");
            metrics::track_webhook(provider, err.status_code());
            Err(err)
        }
    }
}

/// Stripe subscription events, authenticated by the `Stripe-Signature` header
#[utoipa::path(
    post,
    path = "/api/v1/webhooks/stripe",
    request_body(content = String, description = "Raw Stripe event JSON", content_type = "application/json"),
    responses(
        (status = 200, description = "Event processed", body = WebhookOutcome),
        (status = 400, description = "Missing or invalid signature, malformed event", body = ApiErrorResponse),
        (status = 404, description = "Subscriber account not found", body = ApiErrorResponse)
    ),
    tag = "Webhooks"
)]
pub async fn stripe_webhook(
    State(server): State<Server>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookOutcome>, AppError> {
    let result = match headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
    {
        Some(signature) => server.stripe.handle_webhook(&body, signature).await,
        None => Err(AppError::BadRequest(
            "Missing Stripe-Signature header".to_string(),
        )),
    };
    record("stripe", result)
}

/// Wompi events, authenticated by the checksum carried in the body
#[utoipa::path(
    post,
    path = "/api/v1/webhooks/wompi",
    request_body(content = String, description = "Raw Wompi event JSON", content_type = "application/json"),
    responses(
        (status = 200, description = "Event processed", body = WebhookOutcome),
        (status = 400, description = "Invalid checksum or malformed event", body = ApiErrorResponse),
        (status = 404, description = "Payer account not found", body = ApiErrorResponse)
    ),
    tag = "Webhooks"
)]
pub async fn wompi_webhook(
    State(server): State<Server>,
    body: Bytes,
) -> Result<Json<WebhookOutcome>, AppError> {
    record("wompi", server.wompi.handle_webhook(&body).await)
}
