//! User persistence.
//!
//! The auth core only needs a handful of user lookups, expressed by the
//! [`UserStore`] trait. `DbOperations` backs it with PostgreSQL and
//! `InMemoryUserStore` keeps users in process for development and tests.

pub mod memory;
pub mod models;
pub mod operations;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DatabaseError;

pub use memory::InMemoryUserStore;
pub use models::{User, UserView};
pub use operations::DbOperations;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DatabaseError>;

    /// Inserts a new user. Fails with `DatabaseError::Duplicate` when the
    /// email is already taken.
    async fn create(&self, user: &User) -> Result<User, DatabaseError>;

    async fn record_login(&self, id: Uuid) -> Result<(), DatabaseError>;
}
