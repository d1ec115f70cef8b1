use thiserror::Error;
use actix_web::{ResponseError, HttpResponse, http::StatusCode};
use serde_json::json;
use tracing::error;

use crate::validation::ValidationFailure;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    AuthError(#[from] AuthError),

    #[error("Validation error: {0}")]
    ValidationError(#[from] ValidationFailure),

    #[error("Conflict: {0}")]
    ConflictError(#[from] ConflictError),

    #[error("{0}")]
    RateLimited(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl AppError {
    /// Stable machine-readable code sent alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::AuthError(e) => e.code(),
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::ConflictError(ConflictError::EmailAlreadyExists) => "EMAIL_ALREADY_EXISTS",
            AppError::RateLimited(_) => "RATE_LIMITED",
            AppError::DatabaseError(DatabaseError::NotFound) => "NOT_FOUND",
            AppError::DatabaseError(DatabaseError::Duplicate) => "CONFLICT",
            AppError::DatabaseError(_) => "INTERNAL_ERROR",
            AppError::ConfigError(_) | AppError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    fn client_message(&self) -> String {
        match self {
            AppError::AuthError(AuthError::AuthenticationFailed(_)) => "Authentication failed".to_string(),
            AppError::AuthError(e) => e.to_string(),
            AppError::ValidationError(_) => "Validation failed".to_string(),
            AppError::ConflictError(e) => e.to_string(),
            AppError::RateLimited(message) => message.clone(),
            AppError::DatabaseError(DatabaseError::NotFound) => "Resource not found".to_string(),
            AppError::DatabaseError(DatabaseError::Duplicate) => "Resource already exists".to_string(),
            _ => "Internal server error".to_string(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err.into())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(err.to_string())
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(err: bcrypt::BcryptError) -> Self {
        AppError::InternalError(format!("password hashing failed: {}", err))
    }
}

impl From<actix_web::error::BlockingError> for AppError {
    fn from(err: actix_web::error::BlockingError) -> Self {
        AppError::InternalError(err.to_string())
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed with {}: {}", status.as_u16(), self);
        }

        let mut body = json!({
            "status": status.as_u16(),
            "code": self.code(),
            "message": self.client_message(),
        });
        if let AppError::ValidationError(failure) = self {
            body["details"] = json!(failure.errors());
        }

        HttpResponse::build(status).json(json!({ "error": body }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::AuthError(AuthError::AuthenticationFailed(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::ConflictError(_) => StatusCode::CONFLICT,
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::DatabaseError(DatabaseError::NotFound) => StatusCode::NOT_FOUND,
            AppError::DatabaseError(DatabaseError::Duplicate) => StatusCode::CONFLICT,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ConfigError(_) | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Access token required")]
    AccessTokenRequired,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("Refresh token expired")]
    RefreshTokenExpired,

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::AccessTokenRequired => "ACCESS_TOKEN_REQUIRED",
            AuthError::TokenExpired => "TOKEN_EXPIRED",
            AuthError::InvalidToken => "INVALID_TOKEN",
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::InvalidRefreshToken => "INVALID_REFRESH_TOKEN",
            AuthError::RefreshTokenExpired => "REFRESH_TOKEN_EXPIRED",
            AuthError::AuthenticationFailed(_) => "AUTHENTICATION_FAILED",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConflictError {
    #[error("Email already exists")]
    EmailAlreadyExists,
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Record not found")]
    NotFound,

    #[error("Duplicate record")]
    Duplicate,
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound,
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => DatabaseError::Duplicate,
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DatabaseError::ConnectionError(err.to_string())
            }
            _ => DatabaseError::QueryError(err.to_string()),
        }
    }
}
