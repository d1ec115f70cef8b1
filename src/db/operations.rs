use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::db::models::User;
use crate::db::UserStore;
use crate::error::DatabaseError;

const USER_COLUMNS: &str =
    "id, email, name, phone, password_hash, role, created_at, updated_at, last_login";

/// PostgreSQL-backed [`UserStore`].
pub struct DbOperations {
    pool: Arc<PgPool>,
}

impl DbOperations {
    pub async fn new_with_options(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, DatabaseError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await
            .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

        Ok(Self { pool: Arc::new(pool) })
    }

    pub async fn migrate(&self) -> Result<(), DatabaseError> {
        sqlx::migrate!()
            .run(self.pool.as_ref())
            .await
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;
        info!("Database migrations applied");
        Ok(())
    }
}

#[async_trait]
impl UserStore for DbOperations {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(user)
    }

    async fn create(&self, user: &User) -> Result<User, DatabaseError> {
        // Single statement: either the whole row lands or nothing does.
        let created = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, email, name, phone, password_hash, role, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.phone)
        .bind(&user.password_hash)
        .bind(&user.role)
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(created)
    }

    async fn record_login(&self, id: Uuid) -> Result<(), DatabaseError> {
        let now = Utc::now();
        let result = sqlx::query("UPDATE users SET last_login = $1, updated_at = $1 WHERE id = $2")
            .bind(now)
            .bind(id)
            .execute(self.pool.as_ref())
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound);
        }
        Ok(())
    }
}
