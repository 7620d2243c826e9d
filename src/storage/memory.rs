//! In-memory storage for development and testing

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::auth::{
    generate_refresh_token, hash_token, RefreshTokenRecord, RefreshTokenStore, RevokeOutcome,
    TokenState,
};
use crate::error::StorageError;
use crate::users::{User, UserStore};

/// Refresh tokens keyed by SHA-256 digest
#[derive(Default)]
pub struct InMemoryRefreshTokenStore {
    tokens: DashMap<String, RefreshTokenRecord>,
}

impl InMemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a prepared record; used by `create` and by tests that need to
    /// force a collision.
    pub fn insert(&self, record: RefreshTokenRecord) -> Result<(), StorageError> {
        match self.tokens.entry(record.token_hash.clone()) {
            Entry::Occupied(_) => Err(StorageError::Duplicate("refresh_tokens_pkey".to_string())),
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryRefreshTokenStore {
    async fn create(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<String, StorageError> {
        let token = generate_refresh_token();
        self.insert(RefreshTokenRecord::new(&token, user_id, now, ttl))?;
        Ok(token)
    }

    async fn lookup(&self, token: &str) -> Result<RefreshTokenRecord, StorageError> {
        self.tokens
            .get(&hash_token(token))
            .map(|record| record.value().clone())
            .ok_or(StorageError::NotFound)
    }

    async fn revoke(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<RevokeOutcome, StorageError> {
        // get_mut holds the shard write lock for the whole check-and-set
        let mut record = self
            .tokens
            .get_mut(&hash_token(token))
            .ok_or(StorageError::NotFound)?;

        Ok(match record.state_at(now) {
            TokenState::Active => {
                record.revoked_at = Some(now);
                RevokeOutcome::Revoked
            }
            TokenState::Revoked => RevokeOutcome::AlreadyRevoked,
            TokenState::Expired => RevokeOutcome::Expired,
        })
    }

    async fn revoke_all_for_user(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64, StorageError> {
        let mut revoked = 0;
        for mut record in self.tokens.iter_mut() {
            if record.user_id == user_id && record.is_usable_at(now) {
                record.revoked_at = Some(now);
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn delete_all_for_reset(&self) -> Result<u64, StorageError> {
        let count = self.tokens.len() as u64;
        self.tokens.clear();
        Ok(count)
    }
}

/// Users keyed by id, with a unique email index
#[derive(Default)]
pub struct InMemoryUserStore {
    users: DashMap<Uuid, User>,
    emails: DashMap<String, Uuid>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn create(&self, user: &User) -> Result<(), StorageError> {
        match self.emails.entry(user.email.clone()) {
            Entry::Occupied(_) => Err(StorageError::Duplicate("users_email_key".to_string())),
            Entry::Vacant(slot) => {
                self.users.insert(user.id, user.clone());
                slot.insert(user.id);
                Ok(())
            }
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StorageError> {
        let Some(id) = self.emails.get(email).map(|entry| *entry.value()) else {
            return Ok(None);
        };
        Ok(self.users.get(&id).map(|user| user.value().clone()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StorageError> {
        Ok(self.users.get(&id).map(|user| user.value().clone()))
    }

    async fn update_credentials(
        &self,
        id: Uuid,
        email: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<User, StorageError> {
        // Never hold a `users` guard while touching `emails`; `create` locks
        // them the other way round.
        let current_email = self
            .users
            .get(&id)
            .map(|user| user.email.clone())
            .ok_or(StorageError::NotFound)?;

        if current_email != email {
            match self.emails.entry(email.to_string()) {
                Entry::Occupied(_) => {
                    return Err(StorageError::Duplicate("users_email_key".to_string()))
                }
                Entry::Vacant(slot) => {
                    slot.insert(id);
                }
            }
            self.emails.remove(&current_email);
        }

        let mut user = self.users.get_mut(&id).ok_or(StorageError::NotFound)?;
        user.email = email.to_string();
        user.password_hash = password_hash.to_string();
        user.updated_at = now;
        Ok(user.clone())
    }

    async fn upgrade_to_chirpy_red(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), StorageError> {
        let mut user = self.users.get_mut(&id).ok_or(StorageError::NotFound)?;
        user.is_chirpy_red = true;
        user.updated_at = now;
        Ok(())
    }

    async fn delete_all_for_reset(&self) -> Result<u64, StorageError> {
        let count = self.users.len() as u64;
        self.emails.clear();
        self.users.clear();
        Ok(count)
    }
}
