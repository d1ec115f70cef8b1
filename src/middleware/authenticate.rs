//! Bearer token authentication for protected routes.

use std::future::{ready, Ready};
use std::sync::Arc;

use actix_web::{
    dev::{Payload, ServiceRequest},
    http::header::AUTHORIZATION,
    FromRequest, HttpMessage, HttpRequest, ResponseError,
};
use async_trait::async_trait;
use tracing::{error, warn};

use crate::auth::tokens::{AccessTokenVerifier, TokenError, TokenPayload};
use crate::error::{AppError, AuthError};
use crate::middleware::pipeline::{Flow, Interceptor};

/// Resolves an `Authorization` header value to the caller's identity.
///
/// No header, a non-Bearer scheme or an empty token all mean no token was
/// presented. A presented token ends up valid, expired or invalid; anything
/// else is reported as a failed authentication, never as success.
pub fn authenticate(
    authorization: Option<&str>,
    tokens: &dyn AccessTokenVerifier,
) -> Result<TokenPayload, AuthError> {
    let token = authorization
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::AccessTokenRequired)?;

    tokens.verify_access_token(token).map_err(|e| match e {
        TokenError::Expired => AuthError::TokenExpired,
        TokenError::Invalid => AuthError::InvalidToken,
        TokenError::Internal(msg) => AuthError::AuthenticationFailed(msg),
    })
}

/// Interceptor that attaches the verified [`TokenPayload`] to the request.
pub struct Authenticate {
    tokens: Arc<dyn AccessTokenVerifier>,
}

impl Authenticate {
    pub fn new(tokens: Arc<dyn AccessTokenVerifier>) -> Self {
        Self { tokens }
    }
}

#[async_trait(?Send)]
impl Interceptor for Authenticate {
    fn name(&self) -> &'static str {
        "authenticate"
    }

    async fn before(&self, req: &ServiceRequest) -> Flow {
        let header = req
            .headers()
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        match authenticate(header, self.tokens.as_ref()) {
            Ok(payload) => {
                req.extensions_mut().insert(payload);
                Flow::Continue
            }
            Err(e) => {
                match &e {
                    AuthError::AuthenticationFailed(reason) => {
                        error!("Token verification fault on {}: {}", req.path(), reason)
                    }
                    other => warn!("Rejected request to {}: {}", req.path(), other),
                }
                Flow::Respond(AppError::from(e).error_response())
            }
        }
    }
}

/// Identity of the caller on routes behind [`Authenticate`].
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub TokenPayload);

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let result = req
            .extensions()
            .get::<TokenPayload>()
            .cloned()
            .map(AuthenticatedUser)
            .ok_or_else(|| AuthError::AccessTokenRequired.into());

        ready(result)
    }
}
