//! Access and refresh token issuance.
//!
//! Both token classes are HS256 JWTs carrying the same [`TokenPayload`], but
//! each class is signed with its own secret and tagged with its kind, so a
//! refresh token can never pass as an access token or the reverse.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::AuthConfig;

pub const ACCESS_TOKEN_TTL_MINUTES: i64 = 15;
pub const REFRESH_TOKEN_TTL_DAYS: i64 = 7;

/// Identity carried by every token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPayload {
    pub user_id: Uuid,
    pub email: String,
    pub role: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    #[serde(flatten)]
    pub payload: TokenPayload,
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("token invalid")]
    Invalid,

    #[error("token processing failed: {0}")]
    Internal(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidToken
            | ErrorKind::InvalidSignature
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidAlgorithmName
            | ErrorKind::MissingRequiredClaim(_)
            | ErrorKind::ImmatureSignature
            | ErrorKind::InvalidIssuer
            | ErrorKind::InvalidAudience
            | ErrorKind::InvalidSubject
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => TokenError::Invalid,
            _ => TokenError::Internal(err.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKeys {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// Access-token check used by request authentication.
#[cfg_attr(test, mockall::automock)]
pub trait AccessTokenVerifier: Send + Sync {
    fn verify_access_token(&self, token: &str) -> Result<TokenPayload, TokenError>;
}

pub struct TokenService {
    access: SigningKeys,
    refresh: SigningKeys,
    validation: Validation,
}

impl TokenService {
    pub fn new(access_secret: &str, refresh_secret: &str) -> Self {
        // Expiry is checked against the caller's clock in `verify`.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;

        Self {
            access: SigningKeys::from_secret(access_secret),
            refresh: SigningKeys::from_secret(refresh_secret),
            validation,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(&config.access_token_secret, &config.refresh_token_secret)
    }

    pub fn issue_access_token(&self, payload: &TokenPayload) -> Result<String, TokenError> {
        self.issue_access_token_at(payload, Utc::now())
    }

    pub fn issue_access_token_at(
        &self,
        payload: &TokenPayload,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        self.issue(
            payload,
            TokenKind::Access,
            now,
            Duration::minutes(ACCESS_TOKEN_TTL_MINUTES),
        )
    }

    pub fn issue_refresh_token(&self, payload: &TokenPayload) -> Result<String, TokenError> {
        self.issue_refresh_token_at(payload, Utc::now())
    }

    pub fn issue_refresh_token_at(
        &self,
        payload: &TokenPayload,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        self.issue(
            payload,
            TokenKind::Refresh,
            now,
            Duration::days(REFRESH_TOKEN_TTL_DAYS),
        )
    }

    pub fn issue_pair(&self, payload: &TokenPayload) -> Result<TokenPair, TokenError> {
        let now = Utc::now();
        Ok(TokenPair {
            access_token: self.issue_access_token_at(payload, now)?,
            refresh_token: self.issue_refresh_token_at(payload, now)?,
        })
    }

    pub fn verify_access_token(&self, token: &str) -> Result<TokenPayload, TokenError> {
        self.verify_access_token_at(token, Utc::now())
    }

    pub fn verify_access_token_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<TokenPayload, TokenError> {
        self.verify(token, TokenKind::Access, now)
    }

    pub fn verify_refresh_token(&self, token: &str) -> Result<TokenPayload, TokenError> {
        self.verify_refresh_token_at(token, Utc::now())
    }

    pub fn verify_refresh_token_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<TokenPayload, TokenError> {
        self.verify(token, TokenKind::Refresh, now)
    }

    fn keys(&self, kind: TokenKind) -> &SigningKeys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    fn issue(
        &self,
        payload: &TokenPayload,
        kind: TokenKind,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        let claims = Claims {
            payload: payload.clone(),
            kind,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.keys(kind).encoding)?;
        Ok(token)
    }

    fn verify(&self, token: &str, kind: TokenKind, now: DateTime<Utc>) -> Result<TokenPayload, TokenError> {
        let data = decode::<Claims>(token, &self.keys(kind).decoding, &self.validation)?;
        let claims = data.claims;

        if claims.kind != kind {
            return Err(TokenError::Invalid);
        }
        if claims.exp <= now.timestamp() {
            return Err(TokenError::Expired);
        }

        Ok(claims.payload)
    }
}

impl AccessTokenVerifier for TokenService {
    fn verify_access_token(&self, token: &str) -> Result<TokenPayload, TokenError> {
        TokenService::verify_access_token(self, token)
    }
}
