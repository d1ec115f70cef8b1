#![allow(dead_code)]

use std::sync::Arc;

use buyeragent_server::config::{
    AuthConfig, CorsConfig, DatabaseConfig, RateLimitSettings, RunEnvironment, ServerConfig,
};
use buyeragent_server::{AppState, InMemoryUserStore, Settings};
use serde_json::{json, Value};

pub const ACCESS_SECRET: &str = "integration-access-secret-0123456789abcdef";
pub const REFRESH_SECRET: &str = "integration-refresh-secret-0123456789abcdef";

pub fn test_settings() -> Settings {
    Settings {
        environment: RunEnvironment::Test,
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            workers: 1,
            trust_proxy: false,
        },
        database: DatabaseConfig {
            url: None,
            max_connections: 1,
        },
        auth: AuthConfig {
            access_token_secret: ACCESS_SECRET.to_string(),
            refresh_token_secret: REFRESH_SECRET.to_string(),
            bcrypt_cost: 4,
            rotate_refresh_tokens: false,
        },
        rate_limit: RateLimitSettings {
            window_minutes: 15,
            login_max_attempts: 5,
            api_max_requests: 100,
        },
        cors: CorsConfig {
            allowed_origins: vec![],
            max_age: 3600,
        },
    }
}

pub fn test_state(settings: Settings) -> AppState {
    AppState::with_store(settings, Arc::new(InMemoryUserStore::new()))
        .expect("Failed to build app state")
}

pub fn register_body(email: &str) -> Value {
    json!({
        "email": email,
        "password": "password1",
        "name": "A"
    })
}
