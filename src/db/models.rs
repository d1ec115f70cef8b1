use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::auth::TokenPayload;

pub const DEFAULT_ROLE: &str = "agent";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    pub fn new(email: String, name: String, phone: Option<String>, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email,
            name,
            phone,
            password_hash,
            role: DEFAULT_ROLE.to_string(),
            created_at: now,
            updated_at: now,
            last_login: None,
        }
    }

    pub fn token_payload(&self) -> TokenPayload {
        TokenPayload {
            user_id: self.id,
            email: self.email.clone(),
            role: self.role.clone(),
        }
    }
}

/// What clients get to see of a user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            phone: user.phone.clone(),
            role: user.role.clone(),
            created_at: user.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_hides_password_hash() {
        let user = User::new(
            "a@b.com".to_string(),
            "A".to_string(),
            None,
            "$2b$04$hash".to_string(),
        );
        let json = serde_json::to_value(UserView::from(&user)).unwrap();

        assert_eq!(json["email"], "a@b.com");
        assert_eq!(json["role"], DEFAULT_ROLE);
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("phone").is_none());
        assert!(json.get("createdAt").is_some());

        let raw = serde_json::to_value(&user).unwrap();
        assert!(raw.get("password_hash").is_none());
    }

    #[test]
    fn test_token_payload_mirrors_user() {
        let user = User::new("a@b.com".into(), "A".into(), Some("555".into()), "h".into());
        let payload = user.token_payload();
        assert_eq!(payload.user_id, user.id);
        assert_eq!(payload.email, "a@b.com");
        assert_eq!(payload.role, "agent");
    }
}
