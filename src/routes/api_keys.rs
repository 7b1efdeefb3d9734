use crate::{
    auth::{
        api_key::{ApiKey, ApiKeyInfo, CreateApiKeyRequest, CreateApiKeyResponse, MAX_KEY_NAME_LENGTH},
        middleware::UserExtractor,
    },
    database::DatabaseError,
    error::AppError,
    routes::ApiErrorResponse,
    server::Server,
};
use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get},
};
use chrono::{Duration, Utc};
use tracing::info;

/// Key management; mounted behind the login-session middleware
pub fn create_api_key_routes() -> Router<Server> {
    Router::new()
        .route("/", get(list_api_keys).post(create_api_key))
        .route("/{key_id}", delete(revoke_api_key))
}

/// Create a key for the current account. The raw key is returned only here.
#[utoipa::path(
    post,
    path = "/api/v1/api-keys",
    request_body = CreateApiKeyRequest,
    responses(
        (status = 201, description = "Key created", body = CreateApiKeyResponse),
        (status = 400, description = "Invalid name or too many keys", body = ApiErrorResponse),
        (status = 403, description = "Called with an API key", body = ApiErrorResponse)
    ),
    tag = "API Keys",
    security(("jwt_auth" = []))
)]
pub async fn create_api_key(
    State(server): State<Server>,
    UserExtractor(user): UserExtractor,
    Json(request): Json<CreateApiKeyRequest>,
) -> Result<(StatusCode, Json<CreateApiKeyResponse>), AppError> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest(
            "API key name cannot be empty".to_string(),
        ));
    }
    if name.chars().count() > MAX_KEY_NAME_LENGTH {
        return Err(AppError::BadRequest(format!(
            "API key name too long (max {} characters)",
            MAX_KEY_NAME_LENGTH
        )));
    }

    let max_keys = server.config.api_keys.max_keys_per_user;
    if server.database.api_keys().count_by_user(user.id).await? >= u64::from(max_keys) {
        return Err(AppError::BadRequest(format!(
            "Maximum number of API keys exceeded ({})",
            max_keys
        )));
    }

    let expires_at = request
        .expires_in_days
        .or(server.config.api_keys.default_expiry_days)
        .map(|days| Utc::now() + Duration::days(i64::from(days)));

    let (api_key, raw_key) = ApiKey::new(user.id, name.to_string(), expires_at);
    let stored = server.database.api_keys().store(&api_key).await?;
    info!(user_id = user.id, key_id = stored.id, "API key created");

    Ok((
        StatusCode::CREATED,
        Json(CreateApiKeyResponse {
            id: stored.id,
            name: stored.name,
            key: raw_key,
            key_prefix: stored.key_prefix,
            created_at: stored.created_at,
            expires_at: stored.expires_at,
        }),
    ))
}

/// Active keys of the current account, newest first
#[utoipa::path(
    get,
    path = "/api/v1/api-keys",
    responses(
        (status = 200, description = "Active keys", body = [ApiKeyInfo]),
        (status = 401, description = "Unauthorized", body = ApiErrorResponse)
    ),
    tag = "API Keys",
    security(("jwt_auth" = []))
)]
pub async fn list_api_keys(
    State(server): State<Server>,
    UserExtractor(user): UserExtractor,
) -> Result<Json<Vec<ApiKeyInfo>>, AppError> {
    let keys = server.database.api_keys().find_by_user(user.id).await?;
    Ok(Json(keys.into_iter().map(ApiKeyInfo::from).collect()))
}

#[utoipa::path(
    delete,
    path = "/api/v1/api-keys/{key_id}",
    params(("key_id" = i32, Path, description = "API key ID")),
    responses(
        (status = 204, description = "Revoked"),
        (status = 404, description = "Not found, already revoked or not owned by caller", body = ApiErrorResponse)
    ),
    tag = "API Keys",
    security(("jwt_auth" = []))
)]
pub async fn revoke_api_key(
    State(server): State<Server>,
    UserExtractor(user): UserExtractor,
    Path(key_id): Path<i32>,
) -> Result<StatusCode, AppError> {
    server
        .database
        .api_keys()
        .revoke_for_user(user.id, key_id)
        .await
        .map_err(|err| match err {
            DatabaseError::NotFound => AppError::NotFound("API key not found".to_string()),
            other => other.into(),
        })?;

    info!(user_id = user.id, key_id, "API key revoked");
    Ok(StatusCode::NO_CONTENT)
}
