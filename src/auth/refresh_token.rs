/// Refresh Token Management
///
/// Refresh tokens are:
/// - 32 bytes from the OS RNG, hex encoded (64 characters)
/// - Hashed with SHA-256 before storage (the plaintext only ever goes to the client)
/// - Long-lived and reusable until they expire or are revoked
/// - Never deleted by normal operation; revoked rows stay as an audit trail

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::StorageError;

const REFRESH_TOKEN_BYTES: usize = 32;

/// Generate a new cryptographically secure refresh token
pub fn generate_refresh_token() -> String {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Hash a refresh token using SHA-256
///
/// The digest is the storage key; plaintext tokens are never persisted.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Lifecycle state of a refresh token at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Active,
    Expired,
    Revoked,
}

/// A persisted refresh token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub token_hash: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl RefreshTokenRecord {
    pub fn new(token: &str, user_id: Uuid, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            token_hash: hash_token(token),
            user_id,
            created_at: now,
            expires_at: now + ttl,
            revoked_at: None,
        }
    }

    /// Revocation wins over expiry; both are terminal.
    pub fn state_at(&self, now: DateTime<Utc>) -> TokenState {
        if self.revoked_at.is_some() {
            TokenState::Revoked
        } else if now >= self.expires_at {
            TokenState::Expired
        } else {
            TokenState::Active
        }
    }

    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.state_at(now) == TokenState::Active
    }
}

/// Result of a revoke call that found the token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevokeOutcome {
    /// Was active, is now revoked
    Revoked,
    AlreadyRevoked,
    /// Past its expiry; left untouched
    Expired,
}

/// Durable refresh token storage
///
/// `revoke` must be an atomic compare-and-set on `revoked_at`: two racing
/// revokes yield exactly one `Revoked`.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Generate, persist and return a new token for `user_id`.
    ///
    /// A key collision is an error, never an overwrite.
    async fn create(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<String, StorageError>;

    /// Exact-match lookup. Expired and revoked records are returned as-is.
    async fn lookup(&self, token: &str) -> Result<RefreshTokenRecord, StorageError>;

    /// `Err(StorageError::NotFound)` if the token was never issued.
    async fn revoke(&self, token: &str, now: DateTime<Utc>)
        -> Result<RevokeOutcome, StorageError>;

    /// Revoke every active token owned by `user_id`, returning how many changed
    async fn revoke_all_for_user(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64, StorageError>;

    /// Remove every record. Only the dev-only reset path calls this.
    async fn delete_all_for_reset(&self) -> Result<u64, StorageError>;
}
