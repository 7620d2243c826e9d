/// User credential records
///
/// Account management owns these; the authentication service only reads them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StorageError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    /// bcrypt hash, never serialized into responses
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Paid membership, granted by the payment provider's webhook
    pub is_chirpy_red: bool,
}

impl User {
    pub fn new(email: String, password_hash: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email,
            password_hash,
            created_at: now,
            updated_at: now,
            is_chirpy_red: false,
        }
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// `StorageError::Duplicate` if the email is taken
    async fn create(&self, user: &User) -> Result<(), StorageError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StorageError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StorageError>;
    /// Replace email and password hash. `NotFound` for an unknown id,
    /// `Duplicate` if another account holds the email.
    async fn update_credentials(
        &self,
        id: Uuid,
        email: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<User, StorageError>;
    /// Set `is_chirpy_red`. Idempotent; `NotFound` for an unknown id.
    async fn upgrade_to_chirpy_red(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), StorageError>;
    async fn delete_all_for_reset(&self) -> Result<u64, StorageError>;
}
