//! Authentication module for the BuyerAgent server
//!
//! This module handles credential checks, token issuance and verification,
//! and login throttling.

pub mod handlers;
pub mod models;
pub mod password;
pub mod rate_limit;
pub mod service;
pub mod tokens;

pub use rate_limit::{RateLimitConfig, RateLimitDecision, RateLimiter};
pub use service::AuthService;
pub use tokens::{AccessTokenVerifier, TokenError, TokenPair, TokenPayload, TokenService};
