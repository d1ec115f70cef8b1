//! Request and response bodies of the authentication API.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::db::models::UserView;
use crate::validation::Schema;

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct RegisterRequest {
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters long"))]
    pub password: String,

    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,

    #[validate(length(min = 1, max = 30, message = "Phone must be between 1 and 30 characters"))]
    pub phone: Option<String>,
}

impl Schema for RegisterRequest {
    const NAME: &'static str = "register";
    const FIELDS: &'static [(&'static str, &'static str)] = &[
        ("email", "email"),
        ("password", "password"),
        ("name", "name"),
        ("phone", "phone"),
    ];

    fn normalize(self) -> Self {
        Self {
            email: normalize_email(&self.email),
            name: self.name.trim().to_string(),
            phone: self
                .phone
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty()),
            password: self.password,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct LoginRequest {
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

impl Schema for LoginRequest {
    const NAME: &'static str = "login";
    const FIELDS: &'static [(&'static str, &'static str)] =
        &[("email", "email"), ("password", "password")];

    fn normalize(self) -> Self {
        Self {
            email: normalize_email(&self.email),
            password: self.password,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

impl Schema for RefreshRequest {
    const NAME: &'static str = "refresh";
    const FIELDS: &'static [(&'static str, &'static str)] = &[("refresh_token", "refreshToken")];

    fn normalize(self) -> Self {
        Self {
            refresh_token: self.refresh_token.trim().to_string(),
        }
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserView,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}
