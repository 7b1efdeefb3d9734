use crate::{
    auth::middleware::UserExtractor,
    entitlement::UsageSummary,
    error::AppError,
    generation::{
        GenerationRequest, GenerationResponse,
        service::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE},
    },
    routes::ApiErrorResponse,
    server::Server,
};
use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, IntoParams)]
pub struct HistoryQuery {
    /// Records to skip (default 0)
    #[serde(default)]
    pub skip: u64,
    /// Page size (default 10, capped at 100)
    #[serde(default = "default_page_size")]
    pub limit: u64,
}

fn default_page_size() -> u64 {
    DEFAULT_PAGE_SIZE
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GenerationListResponse {
    pub generations: Vec<GenerationResponse>,
    /// All records owned by the caller
    pub total: u64,
    pub skip: u64,
    pub limit: u64,
}

pub fn create_generation_routes() -> Router<Server> {
    Router::new()
        .route("/generate", post(generate))
        .route("/generations", get(list_generations))
        .route(
            "/generations/{id}",
            get(get_generation).delete(delete_generation),
        )
        .route("/usage", get(usage))
}

/// Generate content, consuming one unit of the monthly quota
#[utoipa::path(
    post,
    path = "/api/v1/generate",
    request_body = GenerationRequest,
    responses(
        (status = 200, description = "Content generated and stored", body = GenerationResponse),
        (status = 400, description = "Invalid content type, tone, length or topic", body = ApiErrorResponse),
        (status = 401, description = "Unauthorized", body = ApiErrorResponse),
        (status = 402, description = "Monthly quota exhausted", body = ApiErrorResponse),
        (status = 500, description = "Generation failed", body = ApiErrorResponse)
    ),
    tag = "Generation",
    security(("jwt_auth" = []), ("api_key" = []))
)]
pub async fn generate(
    State(server): State<Server>,
    UserExtractor(user): UserExtractor,
    Json(request): Json<GenerationRequest>,
) -> Result<Json<GenerationResponse>, AppError> {
    let response = server.generation_service.generate(user.id, &request).await?;
    Ok(Json(response))
}

/// Caller's generation history, newest first
#[utoipa::path(
    get,
    path = "/api/v1/generations",
    params(HistoryQuery),
    responses(
        (status = 200, description = "History page", body = GenerationListResponse),
        (status = 401, description = "Unauthorized", body = ApiErrorResponse)
    ),
    tag = "Generation",
    security(("jwt_auth" = []), ("api_key" = []))
)]
pub async fn list_generations(
    State(server): State<Server>,
    UserExtractor(user): UserExtractor,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<GenerationListResponse>, AppError> {
    let limit = query.limit.clamp(1, MAX_PAGE_SIZE);
    let generations = server
        .generation_service
        .list(user.id, query.skip, limit)
        .await?;
    let total = server.database.generations().count_by_user(user.id).await?;

    Ok(Json(GenerationListResponse {
        generations,
        total,
        skip: query.skip,
        limit,
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/generations/{id}",
    params(("id" = i32, Path, description = "Generation ID")),
    responses(
        (status = 200, description = "Generation", body = GenerationResponse),
        (status = 404, description = "Not found or not owned by caller", body = ApiErrorResponse)
    ),
    tag = "Generation",
    security(("jwt_auth" = []), ("api_key" = []))
)]
pub async fn get_generation(
    State(server): State<Server>,
    UserExtractor(user): UserExtractor,
    Path(id): Path<i32>,
) -> Result<Json<GenerationResponse>, AppError> {
    Ok(Json(server.generation_service.get(user.id, id).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/generations/{id}",
    params(("id" = i32, Path, description = "Generation ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found or not owned by caller", body = ApiErrorResponse)
    ),
    tag = "Generation",
    security(("jwt_auth" = []), ("api_key" = []))
)]
pub async fn delete_generation(
    State(server): State<Server>,
    UserExtractor(user): UserExtractor,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    server.generation_service.delete(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Usage in the current period against the plan limit
#[utoipa::path(
    get,
    path = "/api/v1/usage",
    responses(
        (status = 200, description = "Usage summary", body = UsageSummary),
        (status = 401, description = "Unauthorized", body = ApiErrorResponse)
    ),
    tag = "Generation",
    security(("jwt_auth" = []), ("api_key" = []))
)]
pub async fn usage(
    State(server): State<Server>,
    UserExtractor(user): UserExtractor,
) -> Result<Json<UsageSummary>, AppError> {
    Ok(Json(server.ledger.summary(user.id).await?))
}
