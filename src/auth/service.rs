/// Authentication service
///
/// Orchestrates password verification, access token signing and the refresh
/// token store. Every failure that could reveal whether an account or a
/// session exists is collapsed before it leaves this module.

use std::sync::Arc;

use chrono::Duration;
use lazy_static::lazy_static;
use uuid::Uuid;

use crate::auth::jwt::TokenSigner;
use crate::auth::password::{hash_password, verify_password};
use crate::auth::refresh_token::{RefreshTokenStore, RevokeOutcome, TokenState};
use crate::clock::Clock;
use crate::configuration::{Environment, Settings};
use crate::error::{AppError, AuthError, ConfigError, StorageError};
use crate::users::{User, UserStore};

lazy_static! {
    // Checked against when the email is unknown, so both login failure paths
    // cost one bcrypt verification.
    static ref DUMMY_PASSWORD_HASH: String =
        hash_password("chirpy-unknown-user-placeholder").unwrap_or_default();
}

/// Tokens handed out by a successful login, with the account they belong to
#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
}

/// Counts from an admin reset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetSummary {
    pub users_deleted: u64,
    pub refresh_tokens_deleted: u64,
}

pub struct AuthService {
    users: Arc<dyn UserStore>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    signer: TokenSigner,
    clock: Arc<dyn Clock>,
    refresh_token_ttl: Duration,
    environment: Environment,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        signer: TokenSigner,
        clock: Arc<dyn Clock>,
        refresh_token_ttl: Duration,
        environment: Environment,
    ) -> Self {
        Self {
            users,
            refresh_tokens,
            signer,
            clock,
            refresh_token_ttl,
            environment,
        }
    }

    /// Wire a service from loaded settings
    ///
    /// # Errors
    /// Propagates signer configuration errors and rejects a non-positive
    /// refresh token lifetime.
    pub fn from_settings(
        settings: &Settings,
        users: Arc<dyn UserStore>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        if settings.jwt.refresh_token_expiry <= 0 {
            return Err(ConfigError::InvalidValue(
                "jwt.refresh_token_expiry must be positive".to_string(),
            ));
        }
        let signer = TokenSigner::new(&settings.jwt, clock.clone())?;

        Ok(Self::new(
            users,
            refresh_tokens,
            signer,
            clock,
            Duration::seconds(settings.jwt.refresh_token_expiry),
            settings.application.environment,
        ))
    }

    /// Lifetime of the access tokens this service issues
    pub fn access_token_ttl(&self) -> Duration {
        self.signer.default_ttl()
    }

    /// Exchange email and password for an access token and a new refresh token
    ///
    /// # Errors
    /// `InvalidCredentials` for an unknown email or a wrong password (same
    /// shape for both); storage errors otherwise.
    pub async fn login(&self, email: &str, password: &str) -> Result<SessionTokens, AppError> {
        let user = match self.users.find_by_email(email).await? {
            Some(user) => user,
            None => {
                let _ = verify_password(password, &DUMMY_PASSWORD_HASH);
                tracing::warn!("Login attempt for unknown account");
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        if verify_password(password, &user.password_hash).is_err() {
            tracing::warn!(user_id = %user.id, "Login attempt with wrong password");
            return Err(AuthError::InvalidCredentials.into());
        }

        let access_token = self.signer.issue(user.id, self.signer.default_ttl())?;
        let refresh_token = self
            .refresh_tokens
            .create(user.id, self.clock.now(), self.refresh_token_ttl)
            .await
            .map_err(|e| match e {
                StorageError::Duplicate(_) => {
                    AppError::Internal("refresh token key collision".to_string())
                }
                other => other.into(),
            })?;

        tracing::info!(user_id = %user.id, "User logged in");

        Ok(SessionTokens {
            user,
            access_token,
            refresh_token,
        })
    }

    /// Mint a new access token from a refresh token
    ///
    /// The refresh token is not rotated and stays valid.
    ///
    /// # Errors
    /// `InvalidRefreshToken` whether the token is unknown, expired or revoked.
    pub async fn refresh(&self, refresh_token: &str) -> Result<String, AppError> {
        let record = match self.refresh_tokens.lookup(refresh_token).await {
            Ok(record) => record,
            Err(StorageError::NotFound) => {
                tracing::warn!("Refresh attempted with unknown token");
                return Err(AuthError::InvalidRefreshToken.into());
            }
            Err(e) => return Err(e.into()),
        };

        let state = record.state_at(self.clock.now());
        if state != TokenState::Active {
            tracing::warn!(user_id = %record.user_id, state = ?state, "Refresh attempted with unusable token");
            return Err(AuthError::InvalidRefreshToken.into());
        }

        if self.users.find_by_id(record.user_id).await?.is_none() {
            tracing::warn!(user_id = %record.user_id, "Refresh token owner no longer exists");
            return Err(AuthError::InvalidRefreshToken.into());
        }

        let access_token = self.signer.issue(record.user_id, self.signer.default_ttl())?;
        tracing::info!(user_id = %record.user_id, "Access token refreshed");

        Ok(access_token)
    }

    /// Revoke a refresh token
    ///
    /// Idempotent: a token that is already revoked or expired counts as logged
    /// out. Only a token we never issued is an error.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AppError> {
        match self
            .refresh_tokens
            .revoke(refresh_token, self.clock.now())
            .await
        {
            Ok(RevokeOutcome::Revoked) => {
                tracing::info!("Refresh token revoked");
                Ok(())
            }
            Ok(outcome) => {
                tracing::debug!(outcome = ?outcome, "Revoke of an already terminal refresh token");
                Ok(())
            }
            Err(StorageError::NotFound) => {
                tracing::warn!("Revoke attempted with unknown token");
                Err(AuthError::InvalidRefreshToken.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Revoke every active refresh token of `user_id`
    pub async fn logout_everywhere(&self, user_id: Uuid) -> Result<u64, AppError> {
        let revoked = self
            .refresh_tokens
            .revoke_all_for_user(user_id, self.clock.now())
            .await?;
        Ok(revoked)
    }

    /// Resolve the user behind an access token
    ///
    /// # Errors
    /// `Unauthorized` for every verification failure kind.
    pub fn authenticate(&self, access_token: &str) -> Result<Uuid, AuthError> {
        self.signer.verify(access_token).map_err(|e| {
            tracing::debug!(error = %e, "Access token rejected");
            AuthError::Unauthorized
        })
    }

    /// Wipe users and refresh tokens. Only available on the dev platform.
    ///
    /// # Errors
    /// `Forbidden` outside `Environment::Dev`.
    pub async fn reset(&self) -> Result<ResetSummary, AppError> {
        if !self.environment.is_dev() {
            tracing::warn!(environment = ?self.environment, "Reset refused outside dev");
            return Err(AuthError::Forbidden.into());
        }

        let refresh_tokens_deleted = self.refresh_tokens.delete_all_for_reset().await?;
        let users_deleted = self.users.delete_all_for_reset().await?;

        tracing::warn!(users_deleted, refresh_tokens_deleted, "Store reset");

        Ok(ResetSummary {
            users_deleted,
            refresh_tokens_deleted,
        })
    }
}
