pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod validation;

use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::{http::header, web, HttpResponse};
use tracing::{info, warn};

pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;
pub use config::Settings;

pub use auth::{AuthService, RateLimitConfig, RateLimiter, TokenPayload, TokenService};
pub use db::{DbOperations, InMemoryUserStore, User, UserStore};

use auth::handlers::{login, logout, me, refresh, register};
use middleware::rate_limit::{RATELIMIT_LIMIT, RATELIMIT_REMAINING, RATELIMIT_RESET};
use middleware::{Authenticate, Pipeline, RateLimit};

/// Health check endpoint handler
/// Returns a JSON response with server status and timestamp
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Application state shared across all components
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub tokens: Arc<TokenService>,
    pub auth_service: Arc<AuthService>,
    pub login_limiter: Arc<RateLimiter>,
    pub api_limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Connects the configured user store and wires every component.
    pub async fn new(config: Settings) -> Result<Self> {
        let users: Arc<dyn UserStore> = match config.database.url.as_deref() {
            Some(url) => {
                let db = DbOperations::new_with_options(
                    url,
                    config.database.max_connections,
                    Duration::from_secs(5),
                )
                .await?;
                db.migrate().await?;
                info!("Connected to PostgreSQL user store");
                Arc::new(db)
            }
            None => {
                warn!("No database url configured, users are kept in memory");
                Arc::new(InMemoryUserStore::new())
            }
        };

        Self::with_store(config, users)
    }

    pub fn with_store(config: Settings, users: Arc<dyn UserStore>) -> Result<Self> {
        let tokens = Arc::new(TokenService::from_config(&config.auth));
        let auth_service = Arc::new(AuthService::new(users, tokens.clone(), &config.auth)?);
        let login_limiter = Arc::new(RateLimiter::new(RateLimitConfig::login_from_settings(
            &config.rate_limit,
        )));
        let api_limiter = Arc::new(RateLimiter::new(RateLimitConfig::api_from_settings(
            &config.rate_limit,
        )));

        Ok(Self {
            config: Arc::new(config),
            tokens,
            auth_service,
            login_limiter,
            api_limiter,
        })
    }
}

/// Registers `/health` and the `/api` routes with their interceptor pipelines.
pub fn configure_routes(state: &AppState) -> impl FnOnce(&mut web::ServiceConfig) {
    let state = state.clone();

    move |cfg: &mut web::ServiceConfig| {
        let trust_proxy = state.config.server.trust_proxy;
        let api = Pipeline::new().with(RateLimit::new("api", state.api_limiter.clone(), trust_proxy));
        let login_attempts =
            Pipeline::new().with(RateLimit::new("login", state.login_limiter.clone(), trust_proxy));
        let protected = Pipeline::new().with(Authenticate::new(state.tokens.clone()));

        cfg.app_data(web::Data::new(state.clone()))
            .route("/health", web::get().to(health_check))
            .service(
                web::scope("/api").wrap(api).service(
                    web::scope("/auth")
                        .route("/register", web::post().to(register))
                        .service(
                            web::resource("/login")
                                .wrap(login_attempts)
                                .route(web::post().to(login)),
                        )
                        .route("/refresh", web::post().to(refresh))
                        .service(
                            web::resource("/logout")
                                .wrap(protected.clone())
                                .route(web::post().to(logout)),
                        )
                        .service(
                            web::resource("/me")
                                .wrap(protected)
                                .route(web::get().to(me)),
                        ),
                ),
            );
    }
}

/// Permissive in development, explicit allow-list everywhere else.
pub fn build_cors(settings: &Settings) -> Cors {
    if settings.environment.is_development() {
        return Cors::permissive();
    }

    settings
        .cors
        .allowed_origins
        .iter()
        .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
        .allowed_methods(vec!["GET", "POST"])
        .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE])
        .expose_headers(vec![RATELIMIT_LIMIT, RATELIMIT_REMAINING, RATELIMIT_RESET])
        .supports_credentials()
        .max_age(settings.cors.max_age as usize)
}

/// Periodically drops idle rate-limit windows.
pub fn spawn_rate_limit_cleanup(state: &AppState, every: Duration) -> tokio::task::JoinHandle<()> {
    let login_limiter = state.login_limiter.clone();
    let api_limiter = state.api_limiter.clone();

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            login_limiter.cleanup().await;
            api_limiter.cleanup().await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App};

    fn test_state() -> AppState {
        let config = Settings::new_for_test().expect("Failed to load test config");
        AppState::with_store(config, Arc::new(InMemoryUserStore::new())).unwrap()
    }

    #[tokio::test]
    async fn test_app_state_without_database_uses_memory() {
        let config = Settings::new_for_test().expect("Failed to load test config");
        let state = AppState::new(config).await;
        assert!(state.is_ok());
    }

    #[tokio::test]
    async fn test_app_state_clone() {
        let state = test_state();
        let cloned = state.clone();

        // Verify Arc references are shared
        assert!(Arc::ptr_eq(&state.config, &cloned.config));
        assert!(Arc::ptr_eq(&state.login_limiter, &cloned.login_limiter));
        assert!(Arc::ptr_eq(&state.api_limiter, &cloned.api_limiter));
    }

    #[tokio::test]
    async fn test_limiters_follow_settings() {
        let state = test_state();
        assert_eq!(state.login_limiter.config().max_requests, 5);
        assert!(state.login_limiter.config().skip_successful_requests);
        assert_eq!(state.api_limiter.config().max_requests, 100);
    }

    #[actix_web::test]
    async fn test_health_check() {
        let app = test::init_service(App::new().configure(configure_routes(&test_state()))).await;
        let resp = test::TestRequest::get().uri("/health").send_request(&app).await;

        assert!(resp.status().is_success());
        assert!(resp.headers().get(RATELIMIT_LIMIT).is_none());
        let json: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(json["status"], "healthy");
    }

    #[actix_web::test]
    async fn test_unknown_api_route_is_still_counted() {
        let app = test::init_service(App::new().configure(configure_routes(&test_state()))).await;
        let resp = test::TestRequest::get().uri("/api/nope").send_request(&app).await;

        assert_eq!(resp.status(), 404);
        assert_eq!(resp.headers().get(RATELIMIT_LIMIT).unwrap(), "100");
    }
}
