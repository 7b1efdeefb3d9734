use crate::{
    database::{DatabaseError, entities::Plan},
    entitlement::{Entitlement, UsageSummary},
    error::AppError,
    routes::ApiErrorResponse,
    server::Server,
};
use axum::{
    Router,
    extract::{Path, State},
    response::Json,
    routing::{post, put},
};
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdatePlanRequest {
    pub plan: Plan,
}

pub fn create_admin_routes() -> Router<Server> {
    Router::new()
        .route("/users/{id}/reset-usage", post(reset_usage))
        .route("/users/{id}/plan", put(update_plan))
}

fn user_not_found(err: DatabaseError) -> AppError {
    match err {
        DatabaseError::NotFound => AppError::NotFound("User not found".to_string()),
        other => other.into(),
    }
}

/// Start a new counting period for one account
#[utoipa::path(
    post,
    path = "/api/v1/admin/users/{id}/reset-usage",
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "Counter reset", body = UsageSummary),
        (status = 403, description = "Admin plan required", body = ApiErrorResponse),
        (status = 404, description = "User not found", body = ApiErrorResponse)
    ),
    tag = "Admin",
    security(("jwt_auth" = []))
)]
pub async fn reset_usage(
    State(server): State<Server>,
    Path(user_id): Path<i32>,
) -> Result<Json<UsageSummary>, AppError> {
    let user = server
        .ledger
        .reset_period(user_id)
        .await
        .map_err(user_not_found)?;
    info!(user_id, "Usage reset by admin");
    Ok(Json(server.ledger.summarize(&Entitlement::from_user(&user))))
}

/// Move an account to another plan; the counter is left as is
#[utoipa::path(
    put,
    path = "/api/v1/admin/users/{id}/plan",
    params(("id" = i32, Path, description = "User ID")),
    request_body = UpdatePlanRequest,
    responses(
        (status = 200, description = "Plan changed", body = UsageSummary),
        (status = 403, description = "Admin plan required", body = ApiErrorResponse),
        (status = 404, description = "User not found", body = ApiErrorResponse)
    ),
    tag = "Admin",
    security(("jwt_auth" = []))
)]
pub async fn update_plan(
    State(server): State<Server>,
    Path(user_id): Path<i32>,
    Json(request): Json<UpdatePlanRequest>,
) -> Result<Json<UsageSummary>, AppError> {
    let user = server
        .ledger
        .change_plan(user_id, request.plan)
        .await
        .map_err(user_not_found)?;
    info!(user_id, plan = %request.plan, "Plan changed by admin");
    Ok(Json(server.ledger.summarize(&Entitlement::from_user(&user))))
}
