//! Postgres storage
//!
//! Runtime-checked queries; the schema lives in `migrations/`.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::{
    generate_refresh_token, hash_token, RefreshTokenRecord, RefreshTokenStore, RevokeOutcome,
    TokenState,
};
use crate::error::StorageError;
use crate::users::{User, UserStore};

type RefreshTokenRow = (String, Uuid, DateTime<Utc>, DateTime<Utc>, Option<DateTime<Utc>>);
type UserRow = (Uuid, String, String, DateTime<Utc>, DateTime<Utc>, bool);

const USER_COLUMNS: &str = "id, email, hashed_password, created_at, updated_at, is_chirpy_red";

#[derive(Clone)]
pub struct PgRefreshTokenStore {
    pool: PgPool,
}

impl PgRefreshTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_by_hash(&self, token_hash: &str) -> Result<RefreshTokenRecord, StorageError> {
        let row = sqlx::query_as::<_, RefreshTokenRow>(
            r#"
            SELECT token_hash, user_id, created_at, expires_at, revoked_at
            FROM refresh_tokens
            WHERE token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        let (token_hash, user_id, created_at, expires_at, revoked_at) =
            row.ok_or(StorageError::NotFound)?;

        Ok(RefreshTokenRecord {
            token_hash,
            user_id,
            created_at,
            expires_at,
            revoked_at,
        })
    }
}

#[async_trait]
impl RefreshTokenStore for PgRefreshTokenStore {
    async fn create(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<String, StorageError> {
        let token = generate_refresh_token();
        let record = RefreshTokenRecord::new(&token, user_id, now, ttl);

        // Plain INSERT: a primary key collision surfaces as unique_violation.
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (token_hash, user_id, created_at, expires_at, revoked_at)
            VALUES ($1, $2, $3, $4, NULL)
            "#,
        )
        .bind(&record.token_hash)
        .bind(record.user_id)
        .bind(record.created_at)
        .bind(record.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(token)
    }

    async fn lookup(&self, token: &str) -> Result<RefreshTokenRecord, StorageError> {
        self.find_by_hash(&hash_token(token)).await
    }

    async fn revoke(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<RevokeOutcome, StorageError> {
        let token_hash = hash_token(token);

        let updated = sqlx::query_scalar::<_, String>(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = $1
            WHERE token_hash = $2 AND revoked_at IS NULL AND expires_at > $1
            RETURNING token_hash
            "#,
        )
        .bind(now)
        .bind(&token_hash)
        .fetch_optional(&self.pool)
        .await?;

        if updated.is_some() {
            return Ok(RevokeOutcome::Revoked);
        }

        // Nothing changed: either unknown, or already terminal.
        let record = self.find_by_hash(&token_hash).await?;
        Ok(match record.state_at(now) {
            TokenState::Revoked => RevokeOutcome::AlreadyRevoked,
            _ => RevokeOutcome::Expired,
        })
    }

    async fn revoke_all_for_user(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64, StorageError> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = $1
            WHERE user_id = $2 AND revoked_at IS NULL AND expires_at > $1
            "#,
        )
        .bind(now)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        tracing::info!(user_id = %user_id, revoked = result.rows_affected(), "Refresh tokens revoked for user");
        Ok(result.rows_affected())
    }

    async fn delete_all_for_reset(&self) -> Result<u64, StorageError> {
        let result = sqlx::query("DELETE FROM refresh_tokens")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn user_from_row(
    (id, email, password_hash, created_at, updated_at, is_chirpy_red): UserRow,
) -> User {
    User {
        id,
        email,
        password_hash,
        created_at,
        updated_at,
        is_chirpy_red,
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, user: &User) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, hashed_password, created_at, updated_at, is_chirpy_red)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .bind(user.updated_at)
        .bind(user.is_chirpy_red)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StorageError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(user_from_row))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StorageError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(user_from_row))
    }

    async fn update_credentials(
        &self,
        id: Uuid,
        email: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<User, StorageError> {
        // email uniqueness is enforced by users_email_key (unique_violation)
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
            SET email = $2, hashed_password = $3, updated_at = $4
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(id)
        .bind(email)
        .bind(password_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.map(user_from_row).ok_or(StorageError::NotFound)
    }

    async fn upgrade_to_chirpy_red(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), StorageError> {
        let result = sqlx::query(
            "UPDATE users SET is_chirpy_red = TRUE, updated_at = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    /// Refresh tokens go with their owners (ON DELETE CASCADE).
    async fn delete_all_for_reset(&self) -> Result<u64, StorageError> {
        let result = sqlx::query("DELETE FROM users").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
