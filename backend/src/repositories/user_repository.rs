//! User lookups behind a trait so auth handlers and middleware can run
//! against PostgreSQL in production and in-memory doubles in tests.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::user::{User, UserRole};

const USER_COLUMNS: &str =
    "id, username, password_hash, full_name, LOWER(role) AS role, created_at, updated_at";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, AppError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    /// Creates the admin account or resets its password and role.
    async fn upsert_admin(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<User, AppError>;
}

#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, AppError> {
        let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let query = format!("SELECT {} FROM users WHERE username = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&query)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn upsert_admin(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<User, AppError> {
        let now = Utc::now();
        let query = format!(
            "INSERT INTO users (id, username, password_hash, full_name, role, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $6) \
             ON CONFLICT (username) DO UPDATE SET password_hash = EXCLUDED.password_hash, \
             role = EXCLUDED.role, updated_at = EXCLUDED.updated_at \
             RETURNING {}",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(Uuid::new_v4().to_string())
            .bind(username)
            .bind(password_hash)
            .bind("Administrator")
            .bind(UserRole::Admin.as_str())
            .bind(now)
            .fetch_one(&self.pool)
            .await?;
        Ok(user)
    }
}
