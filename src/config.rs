use crate::auth::config::{ApiKeyConfig, JwtConfig};
use crate::billing::config::BillingConfig;
use crate::completion::config::CompletionConfig;
use crate::database::config::DatabaseConfig;
use crate::entitlement::config::PlansConfig;
use crate::jobs::JobsConfig;
use crate::server::config::{LoggingConfig, MetricsConfig, ServerConfig};
use axum::http::HeaderValue;
use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

const ENV_PREFIX: &str = "CONTENT";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub api_keys: ApiKeyConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub plans: PlansConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub billing: BillingConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            jwt: JwtConfig::default(),
            api_keys: ApiKeyConfig::default(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
            plans: PlansConfig::default(),
            completion: CompletionConfig::default(),
            billing: BillingConfig::default(),
            jobs: JobsConfig::default(),
        }
    }
}

impl Config {
    /// Load from `config.yaml` in the working directory (if present) and the environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("config.yaml")
    }

    /// Load from the given file (if present) layered under `CONTENT_*` environment variables
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut builder =
            ConfigBuilder::builder().add_source(ConfigBuilder::try_from(&Config::default())?);

        if path.as_ref().exists() {
            builder = builder.add_source(File::from(path.as_ref()));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("server.cors_origins"),
        );

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt.secret.trim().is_empty() {
            return Err(ConfigError::Message("jwt.secret must not be empty".to_string()));
        }
        if let Some(origin) = self
            .server
            .cors_origins
            .iter()
            .find(|origin| *origin != "*" && HeaderValue::from_str(origin).is_err())
        {
            return Err(ConfigError::Message(format!(
                "server.cors_origins contains an invalid origin: {:?}",
                origin
            )));
        }
        if self.completion.max_tokens == 0 {
            return Err(ConfigError::Message(
                "completion.max_tokens must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
