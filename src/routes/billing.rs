use crate::{
    auth::middleware::UserExtractor,
    billing::{PaymentLink, SubscriptionInfo, TransactionInfo},
    database::entities::Plan,
    error::AppError,
    routes::ApiErrorResponse,
    server::Server,
};
use axum::{
    Router,
    extract::{Path, State},
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct PlanPurchaseRequest {
    pub plan: Plan,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CheckoutResponse {
    pub checkout_url: String,
}

pub fn create_billing_routes() -> Router<Server> {
    Router::new()
        .route("/checkout", post(checkout))
        .route("/cancel", post(cancel_subscription))
        .route("/subscription", get(subscription))
        .route("/payment-link", post(payment_link))
        .route("/transactions/{id}", get(transaction))
}

/// Start a Stripe checkout for a paid plan
#[utoipa::path(
    post,
    path = "/api/v1/billing/checkout",
    request_body = PlanPurchaseRequest,
    responses(
        (status = 200, description = "Checkout session created", body = CheckoutResponse),
        (status = 400, description = "Plan cannot be purchased", body = ApiErrorResponse),
        (status = 401, description = "Unauthorized", body = ApiErrorResponse)
    ),
    tag = "Billing",
    security(("jwt_auth" = []))
)]
pub async fn checkout(
    State(server): State<Server>,
    UserExtractor(user): UserExtractor,
    Json(request): Json<PlanPurchaseRequest>,
) -> Result<Json<CheckoutResponse>, AppError> {
    let checkout_url = server.stripe.checkout(&user, request.plan).await?;
    Ok(Json(CheckoutResponse { checkout_url }))
}

/// Cancel the caller's Stripe subscription at period end
#[utoipa::path(
    post,
    path = "/api/v1/billing/cancel",
    responses(
        (status = 200, description = "Subscription set to cancel", body = SubscriptionInfo),
        (status = 404, description = "No subscription", body = ApiErrorResponse)
    ),
    tag = "Billing",
    security(("jwt_auth" = []))
)]
pub async fn cancel_subscription(
    State(server): State<Server>,
    UserExtractor(user): UserExtractor,
) -> Result<Json<SubscriptionInfo>, AppError> {
    Ok(Json(server.stripe.cancel(&user).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/billing/subscription",
    responses(
        (status = 200, description = "Subscription state", body = SubscriptionInfo),
        (status = 404, description = "No subscription", body = ApiErrorResponse)
    ),
    tag = "Billing",
    security(("jwt_auth" = []))
)]
pub async fn subscription(
    State(server): State<Server>,
    UserExtractor(user): UserExtractor,
) -> Result<Json<SubscriptionInfo>, AppError> {
    Ok(Json(server.stripe.subscription(&user).await?))
}

/// Create a Wompi payment link for a paid plan
#[utoipa::path(
    post,
    path = "/api/v1/billing/payment-link",
    request_body = PlanPurchaseRequest,
    responses(
        (status = 200, description = "Payment link created", body = PaymentLink),
        (status = 400, description = "Plan cannot be purchased", body = ApiErrorResponse)
    ),
    tag = "Billing",
    security(("jwt_auth" = []))
)]
pub async fn payment_link(
    State(server): State<Server>,
    UserExtractor(user): UserExtractor,
    Json(request): Json<PlanPurchaseRequest>,
) -> Result<Json<PaymentLink>, AppError> {
    Ok(Json(server.wompi.payment_link(&user, request.plan).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/billing/transactions/{id}",
    params(("id" = String, Path, description = "Wompi transaction ID")),
    responses(
        (status = 200, description = "Transaction state", body = TransactionInfo),
        (status = 404, description = "Unknown transaction", body = ApiErrorResponse)
    ),
    tag = "Billing",
    security(("jwt_auth" = []))
)]
pub async fn transaction(
    State(server): State<Server>,
    Path(id): Path<String>,
) -> Result<Json<TransactionInfo>, AppError> {
    Ok(Json(server.wompi.transaction(&id).await?))
}
