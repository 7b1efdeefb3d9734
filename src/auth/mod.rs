pub mod api_key;
pub mod config;
pub mod jwt;
pub mod middleware;
pub mod password;

pub use jwt::{AccessClaims, JwtService, JwtServiceImpl};
pub use middleware::{UserExtractor, admin_middleware, jwt_auth_middleware, jwt_only_middleware};
