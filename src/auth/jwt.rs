use super::config::JwtConfig;
use crate::error::AppError;
use crate::health::{HealthCheckResult, HealthChecker};
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

/// Only shared-secret algorithms are supported; the secret comes from configuration
pub fn parse_algorithm(alg: &str) -> Result<Algorithm, AppError> {
    match Algorithm::from_str(alg) {
        Ok(algorithm @ (Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)) => Ok(algorithm),
        _ => Err(AppError::BadRequest(format!(
            "Unsupported JWT algorithm: {}",
            alg
        ))),
    }
}

/// Access token claims
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessClaims {
    pub sub: i32, // Database user ID
    pub iat: usize,
    pub exp: usize,
}

impl AccessClaims {
    pub fn new(user_id: i32, expires_in_seconds: u64) -> Self {
        let now = Utc::now().timestamp() as usize;
        Self {
            sub: user_id,
            iat: now,
            exp: now + expires_in_seconds as usize,
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp as i64, 0).unwrap_or_else(Utc::now)
    }
}

/// JWT service trait for dependency injection and testing
pub trait JwtService: Send + Sync {
    /// Issue an access token for the given account
    fn create_token(&self, user_id: i32) -> Result<String, AppError>;

    /// Validate a token and return its claims
    fn validate_token(&self, token: &str) -> Result<AccessClaims, AppError>;

    /// Lifetime of issued tokens in seconds
    fn token_ttl(&self) -> u64;
}

#[derive(Clone)]
pub struct JwtServiceImpl {
    algorithm: Algorithm,
    ttl: u64,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtServiceImpl {
    pub fn new(secret: &str, algorithm: Algorithm, ttl: u64) -> Result<Self, AppError> {
        if secret.is_empty() {
            return Err(AppError::Internal("JWT secret is empty".to_string()));
        }

        Ok(Self {
            algorithm,
            ttl,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        })
    }

    pub fn from_config(config: &JwtConfig) -> Result<Self, AppError> {
        Self::new(
            &config.secret,
            parse_algorithm(&config.algorithm)?,
            config.access_token_ttl,
        )
    }

    /// Create a health checker for this JWT service
    pub fn health_checker(&self) -> Arc<JwtHealthChecker> {
        Arc::new(JwtHealthChecker {
            service: self.clone(),
        })
    }

    fn encode_claims(&self, claims: &AccessClaims) -> Result<String, AppError> {
        encode(&Header::new(self.algorithm), claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }
}

impl JwtService for JwtServiceImpl {
    fn create_token(&self, user_id: i32) -> Result<String, AppError> {
        self.encode_claims(&AccessClaims::new(user_id, self.ttl))
    }

    fn validate_token(&self, token: &str) -> Result<AccessClaims, AppError> {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = true;
        validation.leeway = 0;

        let token_data = decode::<AccessClaims>(token, &self.decoding_key, &validation)
            .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))?;

        Ok(token_data.claims)
    }

    fn token_ttl(&self) -> u64 {
        self.ttl
    }
}

/// Health checker implementation for JWT service
pub struct JwtHealthChecker {
    service: JwtServiceImpl,
}

#[async_trait::async_trait]
impl HealthChecker for JwtHealthChecker {
    fn name(&self) -> &str {
        "jwt"
    }

    async fn check(&self) -> HealthCheckResult {
        let details = |stage: &str, error: Option<String>| {
            serde_json::json!({
                "algorithm": format!("{:?}", self.service.algorithm),
                "stage": stage,
                "error": error,
            })
        };

        let token = match self.service.create_token(1) {
            Ok(token) => token,
            Err(err) => {
                return HealthCheckResult::unhealthy_with_details(
                    "Failed to create test JWT token".to_string(),
                    details("create", Some(err.to_string())),
                );
            }
        };

        match self.service.validate_token(&token) {
            Ok(claims) if claims.sub == 1 => {
                HealthCheckResult::healthy_with_details(details("validate", None))
            }
            Ok(_) => HealthCheckResult::unhealthy_with_details(
                "Token validation returned incorrect claims".to_string(),
                details("validate", Some("claims mismatch".to_string())),
            ),
            Err(err) => HealthCheckResult::unhealthy_with_details(
                "Failed to validate test JWT token".to_string(),
                details("validate", Some(err.to_string())),
            ),
        }
    }
}
