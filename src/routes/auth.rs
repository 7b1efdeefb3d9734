use crate::{
    auth::{
        middleware::UserExtractor,
        password::{hash_password_blocking, validate_password, verify_password_blocking},
    },
    database::{
        DatabaseError,
        entities::{Plan, UserRecord},
    },
    entitlement::Entitlement,
    error::AppError,
    routes::{ApiErrorResponse, MessageResponse},
    server::Server,
};
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;

const USERNAME_MAX_LENGTH: usize = 50;
const USERNAME_MIN_LENGTH: usize = 3;

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Account as seen by its owner
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: i32,
    pub email: String,
    pub username: String,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub is_verified: bool,
    pub plan: Plan,
    pub generations_used: i32,
    /// Null for unbounded plans
    pub generations_limit: Option<u32>,
    pub period_start: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl UserResponse {
    pub fn new(user: UserRecord, server: &Server) -> Self {
        let limit = Entitlement::from_user(&user).limit(server.ledger.limits());
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            full_name: user.full_name,
            is_active: user.is_active,
            is_verified: user.is_verified,
            plan: user.plan,
            generations_used: user.generations_used,
            generations_limit: limit.as_option(),
            period_start: user.period_start,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    /// Seconds until the token expires
    pub expires_in: u64,
    pub user: UserResponse,
}

pub fn create_auth_routes() -> Router<Server> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
}

/// Reachable with a login token or an API key
pub fn create_protected_auth_routes() -> Router<Server> {
    Router::new().route("/me", get(me))
}

/// Login token only, so an API key cannot be traded for a session
pub fn create_session_routes() -> Router<Server> {
    Router::new().route("/refresh", post(refresh))
}

fn normalize_email(email: &str) -> Result<String, AppError> {
    let email = email.trim().to_lowercase();
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.starts_with('.'));
    if !valid {
        return Err(AppError::BadRequest("Invalid email address".to_string()));
    }
    Ok(email)
}

fn validate_username(username: &str) -> Result<String, AppError> {
    let username = username.trim();
    let length = username.chars().count();
    if !(USERNAME_MIN_LENGTH..=USERNAME_MAX_LENGTH).contains(&length)
        || !username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(AppError::BadRequest(format!(
            "Username must be {}-{} characters of letters, digits, '_' or '-'",
            USERNAME_MIN_LENGTH, USERNAME_MAX_LENGTH
        )));
    }
    Ok(username.to_string())
}

fn issue_token(server: &Server, user: UserRecord) -> Result<TokenResponse, AppError> {
    let access_token = server.jwt_service.create_token(user.id)?;
    Ok(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
        expires_in: server.jwt_service.token_ttl(),
        user: UserResponse::new(user, server),
    })
}

/// Create an account on the Free plan
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = TokenResponse),
        (status = 400, description = "Invalid input or already registered", body = ApiErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn register(
    State(server): State<Server>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<TokenResponse>), AppError> {
    let email = normalize_email(&request.email)?;
    let username = validate_username(&request.username)?;
    validate_password(&request.password)?;

    let users = server.database.users();
    if users.find_by_email(&email).await?.is_some() {
        return Err(AppError::BadRequest("Email already registered".to_string()));
    }
    if users.find_by_username(&username).await?.is_some() {
        return Err(AppError::BadRequest("Username already taken".to_string()));
    }

    let full_name = request
        .full_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty());
    let password_hash = hash_password_blocking(request.password).await?;
    let record = UserRecord::new(email, username, password_hash).with_full_name(full_name);

    let user = users.create(&record).await.map_err(|err| match err {
        // Lost a race with a concurrent registration
        DatabaseError::Constraint(_) => {
            AppError::BadRequest("Email or username already registered".to_string())
        }
        other => other.into(),
    })?;

    info!(user_id = user.id, "Account registered");
    Ok((StatusCode::CREATED, Json(issue_token(&server, user)?)))
}

/// Exchange email and password for an access token
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = TokenResponse),
        (status = 401, description = "Invalid credentials", body = ApiErrorResponse),
        (status = 403, description = "Account inactive", body = ApiErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn login(
    State(server): State<Server>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let email = request.email.trim().to_lowercase();
    let user = match server.database.users().find_by_email(&email).await? {
        Some(user) => {
            let verified =
                verify_password_blocking(request.password, user.password_hash.clone()).await?;
            verified.then_some(user)
        }
        None => None,
    }
    .ok_or_else(|| {
        warn!("Failed login attempt");
        AppError::Unauthorized("Invalid email or password".to_string())
    })?;

    if !user.is_active {
        return Err(AppError::Forbidden("Account is inactive".to_string()));
    }

    info!(user_id = user.id, "User logged in");
    Ok(Json(issue_token(&server, user)?))
}

/// Current account, including usage against the plan limit
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "Current account", body = UserResponse),
        (status = 401, description = "Unauthorized", body = ApiErrorResponse)
    ),
    tag = "Authentication",
    security(("jwt_auth" = []), ("api_key" = []))
)]
pub async fn me(
    State(server): State<Server>,
    UserExtractor(user): UserExtractor,
) -> Json<UserResponse> {
    Json(UserResponse::new(user, &server))
}

/// Issue a fresh access token for the current account
#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    responses(
        (status = 200, description = "New token", body = TokenResponse),
        (status = 401, description = "Unauthorized", body = ApiErrorResponse)
    ),
    tag = "Authentication",
    security(("jwt_auth" = []))
)]
pub async fn refresh(
    State(server): State<Server>,
    UserExtractor(user): UserExtractor,
) -> Result<Json<TokenResponse>, AppError> {
    Ok(Json(issue_token(&server, user)?))
}

/// Tokens are stateless; the client discards its copy
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    responses((status = 200, description = "Logged out", body = MessageResponse)),
    tag = "Authentication"
)]
pub async fn logout() -> Json<MessageResponse> {
    Json(MessageResponse::new("Successfully logged out"))
}
