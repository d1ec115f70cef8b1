use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::models::User;
use crate::db::UserStore;
use crate::error::DatabaseError;

/// Process-local user store keyed by id.
#[derive(Debug, Default, Clone)]
pub struct InMemoryUserStore {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn create(&self, user: &User) -> Result<User, DatabaseError> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.id) || users.values().any(|u| u.email == user.email) {
            return Err(DatabaseError::Duplicate);
        }
        users.insert(user.id, user.clone());
        Ok(user.clone())
    }

    async fn record_login(&self, id: Uuid) -> Result<(), DatabaseError> {
        let mut users = self.users.write().await;
        let user = users.get_mut(&id).ok_or(DatabaseError::NotFound)?;
        let now = Utc::now();
        user.last_login = Some(now);
        user.updated_at = now;
        Ok(())
    }
}
