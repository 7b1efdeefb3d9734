use crate::auth::api_key::{API_KEY_PREFIX, hash_api_key, validate_api_key_format};
use crate::auth::jwt::AccessClaims;
use crate::database::entities::{ApiKeyRecord, UserRecord};
use crate::error::AppError;
use crate::metrics;
use crate::middleware::{RequestId, RequestIdExt};
use crate::server::Server;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderName, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use tracing::{trace, warn};

static X_API_KEY: HeaderName = HeaderName::from_static("x-api-key");

enum Credential {
    Jwt(String),
    ApiKey(String),
}

/// `Authorization: Bearer <jwt|gcai_...>`, or an `X-API-Key` header
fn credential(request: &Request) -> Result<Credential, AppError> {
    if let Some(header) = request.headers().get(AUTHORIZATION) {
        let token = header
            .to_str()
            .map_err(|_| AppError::Unauthorized("Invalid Authorization header".to_string()))?
            .strip_prefix("Bearer ")
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AppError::Unauthorized("Invalid Authorization format".to_string()))?;

        return Ok(if token.starts_with(API_KEY_PREFIX) {
            Credential::ApiKey(token.to_string())
        } else {
            Credential::Jwt(token.to_string())
        });
    }

    if let Some(header) = request.headers().get(&X_API_KEY) {
        let key = header
            .to_str()
            .map_err(|_| AppError::Unauthorized("Invalid API key header".to_string()))?;
        return Ok(Credential::ApiKey(key.to_string()));
    }

    Err(AppError::Unauthorized(
        "Missing Authorization header".to_string(),
    ))
}

/// Resolves a bearer token or API key to an active account and stores it in request extensions.
///
/// JWT requests also carry their `AccessClaims`; API key requests carry the `ApiKeyRecord`.
pub async fn jwt_auth_middleware(
    State(server): State<Server>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let request_id = request.extensions().request_id();
    let user = match credential(&request)? {
        Credential::Jwt(token) => {
            let claims = authenticate_with_jwt(&server, &token, request_id)?;
            let user = load_active_user(&server, claims.sub, request_id).await?;
            request.extensions_mut().insert(claims);
            user
        }
        Credential::ApiKey(key) => {
            let api_key = authenticate_with_api_key(&server, &key, request_id).await?;
            let user = load_active_user(&server, api_key.user_id, request_id).await?;
            request.extensions_mut().insert(api_key);
            user
        }
    };

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Login sessions only: routes that mint credentials must not be reachable with an API key
pub async fn jwt_only_middleware(
    State(server): State<Server>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let request_id = request.extensions().request_id();
    let claims = match credential(&request)? {
        Credential::Jwt(token) => authenticate_with_jwt(&server, &token, request_id)?,
        Credential::ApiKey(_) => {
            trace!(%request_id, "API key used on a session-only route");
            return Err(AppError::Forbidden(
                "This endpoint requires a login token, not an API key".to_string(),
            ));
        }
    };

    let user = load_active_user(&server, claims.sub, request_id).await?;
    request.extensions_mut().insert(claims);
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

fn authenticate_with_jwt(
    server: &Server,
    token: &str,
    request_id: RequestId,
) -> Result<AccessClaims, AppError> {
    match server.jwt_service.validate_token(token) {
        Ok(claims) => {
            metrics::track_jwt_validation(true);
            Ok(claims)
        }
        Err(err) => {
            metrics::track_jwt_validation(false);
            trace!(%request_id, error = %err, "Token rejected");
            Err(err)
        }
    }
}

async fn authenticate_with_api_key(
    server: &Server,
    raw_key: &str,
    request_id: RequestId,
) -> Result<ApiKeyRecord, AppError> {
    if !server.config.api_keys.enabled {
        warn!(%request_id, "API key authentication disabled");
        return Err(AppError::Unauthorized(
            "API key authentication is disabled".to_string(),
        ));
    }

    let result = lookup_api_key(server, raw_key, request_id).await;
    metrics::track_api_key_validation(result.is_ok());
    let api_key = result?;

    server.database.api_keys().update_last_used(api_key.id).await?;
    trace!(user_id = api_key.user_id, key_id = api_key.id, %request_id, "API key accepted");
    Ok(api_key)
}

async fn lookup_api_key(
    server: &Server,
    raw_key: &str,
    request_id: RequestId,
) -> Result<ApiKeyRecord, AppError> {
    validate_api_key_format(raw_key)?;

    let api_key = server
        .database
        .api_keys()
        .find_by_hash(&hash_api_key(raw_key))
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid API key".to_string()))?;

    if !api_key.is_valid() {
        warn!(user_id = api_key.user_id, key_id = api_key.id, %request_id, "API key expired or revoked");
        return Err(AppError::Unauthorized(
            "API key expired or revoked".to_string(),
        ));
    }
    Ok(api_key)
}

async fn load_active_user(
    server: &Server,
    user_id: i32,
    request_id: RequestId,
) -> Result<UserRecord, AppError> {
    let user = server
        .database
        .users()
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| {
            warn!(user_id, %request_id, "Credential subject no longer exists");
            AppError::Unauthorized("User not found".to_string())
        })?;

    if !user.is_active {
        warn!(user_id = user.id, %request_id, "Inactive account attempted access");
        return Err(AppError::Forbidden("Account is inactive".to_string()));
    }

    trace!(user_id = user.id, %request_id, "User authenticated");
    Ok(user)
}

/// Must run after `jwt_auth_middleware`
pub async fn admin_middleware(request: Request, next: Next) -> Result<Response, AppError> {
    let user = request
        .extensions()
        .get::<UserRecord>()
        .ok_or_else(|| AppError::Unauthorized("Missing user authentication".to_string()))?;

    if !user.plan.is_admin() {
        warn!(user_id = user.id, request_id = %request.extensions().request_id(), "Admin access denied");
        return Err(AppError::Forbidden("Admin access required".to_string()));
    }

    Ok(next.run(request).await)
}

/// Authenticated account for route handlers
pub struct UserExtractor(pub UserRecord);

impl<S> FromRequestParts<S> for UserExtractor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<UserRecord>()
            .cloned()
            .map(UserExtractor)
            .ok_or_else(|| AppError::Unauthorized("Missing user authentication".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::entities::Plan;
    use crate::test_utils::TestServerBuilder;
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode},
        middleware,
        routing::get,
    };
    use tower::ServiceExt;

    async fn whoami(UserExtractor(user): UserExtractor) -> String {
        user.email
    }

    fn app(server: &Server) -> Router {
        let admin = Router::new()
            .route("/admin", get(whoami))
            .layer(middleware::from_fn(admin_middleware));
        let session_only = Router::new()
            .route("/session", get(whoami))
            .layer(middleware::from_fn_with_state(
                server.clone(),
                jwt_only_middleware,
            ));
        Router::new()
            .route("/me", get(whoami))
            .merge(admin)
            .layer(middleware::from_fn_with_state(
                server.clone(),
                jwt_auth_middleware,
            ))
            .merge(session_only)
    }

    fn get_with_api_key_header(uri: &str, key: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("X-API-Key", key)
            .body(Body::empty())
            .unwrap()
    }

    fn get_with_token(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_valid_token_reaches_handler() {
        let server = TestServerBuilder::new().build().await;
        let user = server.create_test_user("alice@example.com", Plan::Free).await;
        let token = server.token_for(&user);

        let response = app(&server)
            .oneshot(get_with_token("/me", Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"alice@example.com");
    }

    #[tokio::test]
    async fn test_missing_or_malformed_token() {
        let server = TestServerBuilder::new().build().await;

        let response = app(&server)
            .oneshot(get_with_token("/me", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app(&server)
            .oneshot(get_with_token("/me", Some("garbage")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_deleted_account_is_unauthorized() {
        let server = TestServerBuilder::new().build().await;
        let token = server.jwt_service.create_token(9999).unwrap();

        let response = app(&server)
            .oneshot(get_with_token("/me", Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_inactive_account_is_forbidden() {
        let server = TestServerBuilder::new().build().await;
        let user = server
            .insert_user(
                UserRecord::new("idle@example.com", "idle", "hash").with_active(false),
            )
            .await;
        let token = server.token_for(&user);

        let response = app(&server)
            .oneshot(get_with_token("/me", Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_admin_route_requires_admin_plan() {
        let server = TestServerBuilder::new().build().await;
        let pro = server.create_test_user("pro@example.com", Plan::Pro).await;
        let admin = server.create_test_user("root@example.com", Plan::Admin).await;

        let response = app(&server)
            .oneshot(get_with_token("/admin", Some(&server.token_for(&pro))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app(&server)
            .oneshot(get_with_token("/admin", Some(&server.token_for(&admin))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_api_key_authenticates_and_records_use() {
        let server = TestServerBuilder::new().build().await;
        let user = server.create_test_user("bot@example.com", Plan::Pro).await;
        let (stored, raw) = server.api_key_for(&user, None).await;
        assert!(stored.last_used.is_none());

        let response = app(&server)
            .oneshot(get_with_token("/me", Some(&raw)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app(&server)
            .oneshot(get_with_api_key_header("/me", &raw))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let keys = server.database.api_keys().find_by_user(user.id).await.unwrap();
        assert!(keys[0].last_used.is_some());
    }

    #[tokio::test]
    async fn test_revoked_expired_or_unknown_key_is_unauthorized() {
        let server = TestServerBuilder::new().build().await;
        let user = server.create_test_user("bot@example.com", Plan::Pro).await;

        let (revoked, revoked_raw) = server.api_key_for(&user, None).await;
        server
            .database
            .api_keys()
            .revoke_for_user(user.id, revoked.id)
            .await
            .unwrap();
        let (_, expired_raw) = server
            .api_key_for(&user, Some(chrono::Utc::now() - chrono::Duration::minutes(1)))
            .await;
        let unknown = format!("gcai_{}", "x".repeat(43));

        for key in [revoked_raw, expired_raw, unknown, "gcai_short".to_string()] {
            let response = app(&server)
                .oneshot(get_with_token("/me", Some(&key)))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "key {}", key);
        }
    }

    #[tokio::test]
    async fn test_api_key_of_inactive_account_is_forbidden() {
        let server = TestServerBuilder::new().build().await;
        let user = server
            .insert_user(UserRecord::new("idle@example.com", "idle", "hash").with_active(false))
            .await;
        let (_, raw) = server.api_key_for(&user, None).await;

        let response = app(&server)
            .oneshot(get_with_token("/me", Some(&raw)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_disabled_api_keys_are_refused() {
        let server = TestServerBuilder::new()
            .with_config(|config| config.api_keys.enabled = false)
            .build()
            .await;
        let user = server.create_test_user("bot@example.com", Plan::Pro).await;
        let (_, raw) = server.api_key_for(&user, None).await;

        let response = app(&server)
            .oneshot(get_with_token("/me", Some(&raw)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_session_only_route_rejects_api_key() {
        let server = TestServerBuilder::new().build().await;
        let user = server.create_test_user("bot@example.com", Plan::Pro).await;
        let (_, raw) = server.api_key_for(&user, None).await;

        let response = app(&server)
            .oneshot(get_with_token("/session", Some(&raw)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app(&server)
            .oneshot(get_with_token("/session", Some(&server.token_for(&user))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
