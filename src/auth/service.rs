use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::models::{AuthResponse, LoginRequest, RefreshResponse, RegisterRequest};
use crate::auth::password::{hash_password, verify_password};
use crate::auth::tokens::{TokenError, TokenPayload, TokenService};
use crate::config::AuthConfig;
use crate::db::models::{User, UserView};
use crate::db::UserStore;
use crate::error::{AppError, AuthError, ConflictError, DatabaseError};

/// Orchestrates registration, login and token refresh.
pub struct AuthService {
    users: Arc<dyn UserStore>,
    tokens: Arc<TokenService>,
    bcrypt_cost: u32,
    rotate_refresh_tokens: bool,
    // Verified against when the email is unknown so both failure paths cost the same.
    dummy_hash: String,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        tokens: Arc<TokenService>,
        config: &AuthConfig,
    ) -> Result<Self, AppError> {
        let dummy_hash = bcrypt::hash("buyeragent-timing-equalizer", config.bcrypt_cost)?;

        Ok(Self {
            users,
            tokens,
            bcrypt_cost: config.bcrypt_cost,
            rotate_refresh_tokens: config.rotate_refresh_tokens,
            dummy_hash,
        })
    }

    #[cfg(test)]
    pub(crate) fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<AuthResponse, AppError> {
        if self.users.find_by_email(&request.email).await?.is_some() {
            warn!("Registration rejected, email already in use: {}", request.email);
            return Err(ConflictError::EmailAlreadyExists.into());
        }

        let password_hash = hash_password(&request.password, self.bcrypt_cost).await?;
        let user = User::new(request.email, request.name, request.phone, password_hash);

        // Tokens first, so a stored user always has a pair minted for it.
        let pair = self.tokens.issue_pair(&user.token_payload()).map_err(token_fault)?;

        let user = match self.users.create(&user).await {
            Ok(user) => user,
            Err(DatabaseError::Duplicate) => {
                warn!("Registration lost a race for email: {}", user.email);
                return Err(ConflictError::EmailAlreadyExists.into());
            }
            Err(e) => return Err(e.into()),
        };

        info!("Registered user {}", user.id);
        Ok(AuthResponse {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            user: UserView::from(&user),
        })
    }

    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse, AppError> {
        let user = self.users.find_by_email(&request.email).await?;

        let user = match user {
            Some(user) => {
                if !verify_password(&request.password, &user.password_hash).await? {
                    warn!("Login failed, wrong password for user {}", user.id);
                    return Err(AuthError::InvalidCredentials.into());
                }
                user
            }
            None => {
                verify_password(&request.password, &self.dummy_hash).await?;
                warn!("Login failed, unknown email: {}", request.email);
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        let pair = self.tokens.issue_pair(&user.token_payload()).map_err(token_fault)?;

        if let Err(e) = self.users.record_login(user.id).await {
            warn!("Could not record last login for user {}: {}", user.id, e);
        }

        info!("User {} logged in", user.id);
        Ok(AuthResponse {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            user: UserView::from(&user),
        })
    }

    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<RefreshResponse, AppError> {
        let payload = self
            .tokens
            .verify_refresh_token(refresh_token)
            .map_err(|e| match e {
                TokenError::Expired => AppError::from(AuthError::RefreshTokenExpired),
                TokenError::Invalid => AppError::from(AuthError::InvalidRefreshToken),
                TokenError::Internal(msg) => AppError::from(AuthError::AuthenticationFailed(msg)),
            })?;

        let access_token = self.tokens.issue_access_token(&payload).map_err(token_fault)?;
        let refresh_token = if self.rotate_refresh_tokens {
            Some(self.tokens.issue_refresh_token(&payload).map_err(token_fault)?)
        } else {
            None
        };

        info!("Access token refreshed for user {}", payload.user_id);
        Ok(RefreshResponse {
            access_token,
            refresh_token,
        })
    }

    /// Tokens are stateless, so logging out only acknowledges the caller.
    pub async fn logout(&self, identity: &TokenPayload) -> Result<(), AppError> {
        info!("User {} logged out", identity.user_id);
        Ok(())
    }

    pub async fn current_user(&self, user_id: Uuid) -> Result<UserView, AppError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(DatabaseError::NotFound)?;
        Ok(UserView::from(&user))
    }
}

fn token_fault(err: TokenError) -> AppError {
    AppError::InternalError(format!("token issuance failed: {}", err))
}
