use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

use crate::error::AppError;

pub const MIN_SECRET_LENGTH: usize = 32;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunEnvironment {
    Development,
    Test,
    Production,
}

impl RunEnvironment {
    pub fn is_development(&self) -> bool {
        matches!(self, RunEnvironment::Development)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: u32,
    /// Use the forwarded client address for rate limiting.
    pub trust_proxy: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
}

#[derive(Deserialize, Clone)]
pub struct AuthConfig {
    pub access_token_secret: String,
    pub refresh_token_secret: String,
    pub bcrypt_cost: u32,
    pub rotate_refresh_tokens: bool,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("access_token_secret", &"<redacted>")
            .field("refresh_token_secret", &"<redacted>")
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("rotate_refresh_tokens", &self.rotate_refresh_tokens)
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitSettings {
    pub window_minutes: i64,
    pub login_max_attempts: u32,
    pub api_max_requests: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub max_age: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub environment: RunEnvironment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitSettings,
    pub cors: CorsConfig,
}

impl Settings {
    pub fn new() -> Result<Self, AppError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let settings: Settings = Self::with_defaults(Config::builder())?
            // Add in settings from the config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // E.g., `APP_AUTH__ACCESS_TOKEN_SECRET=...` sets `Settings.auth.access_token_secret`
            .add_source(env_source())
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Defaults for everything except the signing secrets.
    fn with_defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        builder
            .set_default("environment", "development")?
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.workers", num_cpus::get() as i64)?
            .set_default("server.trust_proxy", false)?
            .set_default("database.max_connections", 5)?
            .set_default("auth.bcrypt_cost", bcrypt::DEFAULT_COST as i64)?
            .set_default("auth.rotate_refresh_tokens", false)?
            .set_default("rate_limit.window_minutes", 15)?
            .set_default("rate_limit.login_max_attempts", 5)?
            .set_default("rate_limit.api_max_requests", 100)?
            .set_default("cors.allowed_origins", Vec::<String>::new())?
            .set_default("cors.max_age", 3600)
    }

    /// Rejects short or shared signing secrets and limits that would
    /// disable throttling or the worker pool.
    pub fn validate(&self) -> Result<(), AppError> {
        let secrets = [
            ("auth.access_token_secret", &self.auth.access_token_secret),
            ("auth.refresh_token_secret", &self.auth.refresh_token_secret),
        ];
        for (key, secret) in secrets {
            if secret.len() < MIN_SECRET_LENGTH {
                return Err(AppError::ConfigError(format!(
                    "{} must be at least {} characters",
                    key, MIN_SECRET_LENGTH
                )));
            }
        }

        if self.auth.access_token_secret == self.auth.refresh_token_secret {
            return Err(AppError::ConfigError(
                "access and refresh token secrets must differ".to_string(),
            ));
        }

        if self.server.workers == 0 {
            return Err(AppError::ConfigError("server.workers must be at least 1".to_string()));
        }

        let limits = [
            ("rate_limit.window_minutes", self.rate_limit.window_minutes),
            ("rate_limit.login_max_attempts", i64::from(self.rate_limit.login_max_attempts)),
            ("rate_limit.api_max_requests", i64::from(self.rate_limit.api_max_requests)),
        ];
        for (key, value) in limits {
            if value < 1 {
                return Err(AppError::ConfigError(format!("{} must be at least 1", key)));
            }
        }

        if self.environment == RunEnvironment::Production && self.cors.allowed_origins.is_empty() {
            return Err(AppError::ConfigError(
                "cors.allowed_origins must be set in production".to_string(),
            ));
        }

        Ok(())
    }

    #[cfg(test)]
    pub fn new_for_test() -> Result<Self, ConfigError> {
        Self::with_defaults(Config::builder())?
            .set_override("environment", "test")?
            .set_override("auth.access_token_secret", "test-access-secret-0123456789abcdefghij")?
            .set_override("auth.refresh_token_secret", "test-refresh-secret-0123456789abcdefghi")?
            .set_override("auth.bcrypt_cost", 4)?
            .build()?
            .try_deserialize()
    }
}

fn env_source() -> Environment {
    Environment::with_prefix("app")
        .prefix_separator("_")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("cors.allowed_origins")
        .try_parsing(true)
}
