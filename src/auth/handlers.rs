use actix_web::{web, HttpResponse};
use tracing::{info, error};

use crate::AppState;
use crate::auth::models::{LoginRequest, RefreshRequest, RegisterRequest};
use crate::error::AppError;
use crate::middleware::AuthenticatedUser;
use crate::validation::ValidatedJson;

pub async fn register(
    req: ValidatedJson<RegisterRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let req = req.into_inner();
    let email = req.email.clone();
    info!("Received registration request for email: {}", email);

    match state.auth_service.register(req).await {
        Ok(response) => {
            info!("Registration successful for email: {}", email);
            Ok(HttpResponse::Ok().json(response))
        }
        Err(e) => {
            error!("Registration failed for email: {}: {}", email, e);
            Err(e)
        }
    }
}

pub async fn login(
    req: ValidatedJson<LoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let req = req.into_inner();
    let email = req.email.clone();
    info!("Received login request for email: {}", email);

    match state.auth_service.login(req).await {
        Ok(response) => {
            info!("Login successful for email: {}", email);
            Ok(HttpResponse::Ok().json(response))
        }
        Err(e) => {
            error!("Login failed for email: {}: {}", email, e);
            Err(e)
        }
    }
}

pub async fn refresh(
    req: ValidatedJson<RefreshRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let response = state
        .auth_service
        .refresh_access_token(&req.refresh_token)
        .await?;

    Ok(HttpResponse::Ok().json(response))
}

pub async fn logout(
    user: AuthenticatedUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    state.auth_service.logout(&user.0).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Successfully logged out, discard your tokens"
    })))
}

pub async fn me(
    user: AuthenticatedUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let view = state.auth_service.current_user(user.0.user_id).await?;
    Ok(HttpResponse::Ok().json(view))
}
