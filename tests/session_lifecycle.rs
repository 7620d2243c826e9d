//! Service-level session tests driven by a mock clock

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Notify;
use uuid::Uuid;

use chirpy::auth::{
    hash_password, AuthService, RefreshTokenRecord, RefreshTokenStore, RevokeOutcome,
    TokenSigner, TokenState,
};
use chirpy::clock::{Clock, MockClock};
use chirpy::configuration::{Environment, JwtSettings};
use chirpy::error::{AppError, AuthError, StorageError};
use chirpy::storage::{InMemoryRefreshTokenStore, InMemoryUserStore};
use chirpy::users::{User, UserStore};

const PASSWORD: &str = "hunter2";

struct Harness {
    auth: Arc<AuthService>,
    clock: Arc<MockClock>,
    tokens: Arc<InMemoryRefreshTokenStore>,
    users: Arc<InMemoryUserStore>,
}

fn jwt_settings() -> JwtSettings {
    JwtSettings {
        secret: "session-lifecycle-secret-0123456789".to_string(),
        access_token_expiry: 3600,
        refresh_token_expiry: 60 * 24 * 3600,
        issuer: "chirpy".to_string(),
    }
}

fn harness() -> Harness {
    let clock = Arc::new(MockClock::default());
    let users = Arc::new(InMemoryUserStore::new());
    let tokens = Arc::new(InMemoryRefreshTokenStore::new());
    let signer = TokenSigner::new(&jwt_settings(), clock.clone()).unwrap();

    let auth = AuthService::new(
        users.clone(),
        tokens.clone(),
        signer,
        clock.clone(),
        Duration::days(60),
        Environment::Production,
    );

    Harness {
        auth: Arc::new(auth),
        clock,
        tokens,
        users,
    }
}

async fn add_user(h: &Harness, email: &str) -> User {
    let user = User::new(email.to_string(), hash_password(PASSWORD).unwrap(), h.clock.now());
    h.users.create(&user).await.unwrap();
    user
}

#[tokio::test]
async fn refresh_token_lives_exactly_sixty_days() {
    let h = harness();
    let user = add_user(&h, "walt@breakingbad.com").await;
    let session = h.auth.login(&user.email, PASSWORD).await.unwrap();

    h.clock.advance(Duration::days(60) - Duration::seconds(1));
    assert!(h.auth.refresh(&session.refresh_token).await.is_ok());

    h.clock.advance(Duration::seconds(1));
    assert!(matches!(
        h.auth.refresh(&session.refresh_token).await,
        Err(AppError::Auth(AuthError::InvalidRefreshToken))
    ));
}

#[tokio::test]
async fn refreshed_access_token_belongs_to_token_owner() {
    let h = harness();
    let walt = add_user(&h, "walt@breakingbad.com").await;
    let jesse = add_user(&h, "jesse@breakingbad.com").await;

    let walt_session = h.auth.login(&walt.email, PASSWORD).await.unwrap();
    let jesse_session = h.auth.login(&jesse.email, PASSWORD).await.unwrap();

    let walt_access = h.auth.refresh(&walt_session.refresh_token).await.unwrap();
    let jesse_access = h.auth.refresh(&jesse_session.refresh_token).await.unwrap();

    assert_eq!(h.auth.authenticate(&walt_access), Ok(walt.id));
    assert_eq!(h.auth.authenticate(&jesse_access), Ok(jesse.id));
}

#[tokio::test]
async fn revoked_session_never_comes_back() {
    let h = harness();
    let user = add_user(&h, "walt@breakingbad.com").await;
    let session = h.auth.login(&user.email, PASSWORD).await.unwrap();

    h.auth.logout(&session.refresh_token).await.unwrap();

    for _ in 0..3 {
        h.clock.advance(Duration::days(1));
        assert!(h.auth.refresh(&session.refresh_token).await.is_err());
    }

    // Logging out again after expiry is still fine
    h.clock.advance(Duration::days(90));
    assert!(h.auth.logout(&session.refresh_token).await.is_ok());
}

#[tokio::test]
async fn refresh_fails_when_owner_is_gone() {
    let h = harness();
    let user = add_user(&h, "walt@breakingbad.com").await;
    let session = h.auth.login(&user.email, PASSWORD).await.unwrap();

    h.users.delete_all_for_reset().await.unwrap();

    assert!(matches!(
        h.auth.refresh(&session.refresh_token).await,
        Err(AppError::Auth(AuthError::InvalidRefreshToken))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_revokes_have_a_single_winner() {
    let h = harness();
    let user = add_user(&h, "walt@breakingbad.com").await;
    let token = h
        .tokens
        .create(user.id, h.clock.now(), Duration::days(60))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..16 {
        let tokens = h.tokens.clone();
        let token = token.clone();
        let now = h.clock.now();
        handles.push(tokio::spawn(async move { tokens.revoke(&token, now).await }));
    }

    let mut revoked = 0;
    let mut already = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            RevokeOutcome::Revoked => revoked += 1,
            RevokeOutcome::AlreadyRevoked => already += 1,
            RevokeOutcome::Expired => panic!("token should not be expired"),
        }
    }

    assert_eq!(revoked, 1);
    assert_eq!(already, 15);
}

/// In-memory store that records the state every lookup observed and can
/// park one lookup right after it has read the record.
struct ObservedStore {
    inner: InMemoryRefreshTokenStore,
    clock: Arc<MockClock>,
    seen: Mutex<Vec<TokenState>>,
    pause: Mutex<Option<(Arc<Notify>, Arc<Notify>)>>,
}

impl ObservedStore {
    fn new(clock: Arc<MockClock>) -> Self {
        Self {
            inner: InMemoryRefreshTokenStore::new(),
            clock,
            seen: Mutex::new(Vec::new()),
            pause: Mutex::new(None),
        }
    }

    /// Park the next lookup. The first handle fires once it has read the
    /// record; notifying the second lets it return.
    fn pause_next_lookup(&self) -> (Arc<Notify>, Arc<Notify>) {
        let looked_up = Arc::new(Notify::new());
        let resume = Arc::new(Notify::new());
        *self.pause.lock().unwrap() = Some((looked_up.clone(), resume.clone()));
        (looked_up, resume)
    }

    fn last_seen(&self) -> Option<TokenState> {
        self.seen.lock().unwrap().last().copied()
    }
}

#[async_trait]
impl RefreshTokenStore for ObservedStore {
    async fn create(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<String, StorageError> {
        self.inner.create(user_id, now, ttl).await
    }

    async fn lookup(&self, token: &str) -> Result<RefreshTokenRecord, StorageError> {
        let result = self.inner.lookup(token).await;
        if let Ok(record) = &result {
            self.seen.lock().unwrap().push(record.state_at(self.clock.now()));
        }

        let pause = self.pause.lock().unwrap().take();
        if let Some((looked_up, resume)) = pause {
            looked_up.notify_one();
            resume.notified().await;
        }
        result
    }

    async fn revoke(&self, token: &str, now: DateTime<Utc>) -> Result<RevokeOutcome, StorageError> {
        self.inner.revoke(token, now).await
    }

    async fn revoke_all_for_user(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64, StorageError> {
        self.inner.revoke_all_for_user(user_id, now).await
    }

    async fn delete_all_for_reset(&self) -> Result<u64, StorageError> {
        self.inner.delete_all_for_reset().await
    }
}

struct ObservedHarness {
    auth: Arc<AuthService>,
    store: Arc<ObservedStore>,
    clock: Arc<MockClock>,
    user: User,
}

async fn observed_harness() -> ObservedHarness {
    let clock = Arc::new(MockClock::default());
    let users = Arc::new(InMemoryUserStore::new());
    let store = Arc::new(ObservedStore::new(clock.clone()));

    let user = User::new(
        "walt@breakingbad.com".to_string(),
        hash_password(PASSWORD).unwrap(),
        clock.now(),
    );
    users.create(&user).await.unwrap();

    let signer = TokenSigner::new(&jwt_settings(), clock.clone()).unwrap();
    let auth = AuthService::new(
        users,
        store.clone(),
        signer,
        clock.clone(),
        Duration::days(60),
        Environment::Production,
    );

    ObservedHarness {
        auth: Arc::new(auth),
        store,
        clock,
        user,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn refresh_that_read_an_active_token_completes_despite_later_revoke() {
    let h = observed_harness().await;
    let token = h
        .store
        .create(h.user.id, h.clock.now(), Duration::days(60))
        .await
        .unwrap();

    let (looked_up, resume) = h.store.pause_next_lookup();
    let racer = {
        let auth = h.auth.clone();
        let token = token.clone();
        tokio::spawn(async move { auth.refresh(&token).await })
    };

    // The refresh has read the record; revoke lands after that read.
    looked_up.notified().await;
    assert_eq!(h.store.last_seen(), Some(TokenState::Active));
    h.auth.logout(&token).await.unwrap();
    resume.notify_one();

    let access = racer.await.unwrap().unwrap();
    assert_eq!(h.auth.authenticate(&access), Ok(h.user.id));

    // Every read after the revoke sees it
    assert!(matches!(
        h.auth.refresh(&token).await,
        Err(AppError::Auth(AuthError::InvalidRefreshToken))
    ));
    assert_eq!(h.store.last_seen(), Some(TokenState::Revoked));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn refresh_that_reads_after_revoke_fails() {
    let h = observed_harness().await;
    let token = h
        .store
        .create(h.user.id, h.clock.now(), Duration::days(60))
        .await
        .unwrap();

    h.auth.logout(&token).await.unwrap();

    let racer = {
        let auth = h.auth.clone();
        let token = token.clone();
        tokio::spawn(async move { auth.refresh(&token).await })
    };

    assert!(matches!(
        racer.await.unwrap(),
        Err(AppError::Auth(AuthError::InvalidRefreshToken))
    ));
    assert_eq!(h.store.last_seen(), Some(TokenState::Revoked));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_refresh_succeeds_only_if_its_read_saw_an_active_token() {
    let h = observed_harness().await;

    for _ in 0..50 {
        let token = h
            .store
            .create(h.user.id, h.clock.now(), Duration::days(60))
            .await
            .unwrap();

        let racer = {
            let auth = h.auth.clone();
            let token = token.clone();
            tokio::spawn(async move { auth.refresh(&token).await })
        };
        let revoker = {
            let auth = h.auth.clone();
            let token = token.clone();
            tokio::spawn(async move { auth.logout(&token).await })
        };

        let refreshed = racer.await.unwrap();
        revoker.await.unwrap().unwrap();

        // Only the racer has looked this token up so far
        let observed = h.store.last_seen();
        match refreshed {
            Ok(access) => {
                assert_eq!(observed, Some(TokenState::Active));
                assert_eq!(h.auth.authenticate(&access), Ok(h.user.id));
            }
            Err(e) => {
                assert!(matches!(e, AppError::Auth(AuthError::InvalidRefreshToken)));
                assert_eq!(observed, Some(TokenState::Revoked));
            }
        }

        let record = h.store.lookup(&token).await.unwrap();
        assert_eq!(record.revoked_at, Some(h.clock.now()));
        assert!(h.auth.refresh(&token).await.is_err());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_logins_produce_distinct_sessions() {
    let h = harness();
    let mut emails = Vec::new();
    for i in 0..8 {
        let email = format!("user{}@example.com", i);
        add_user(&h, &email).await;
        emails.push(email);
    }

    let mut handles = Vec::new();
    for email in emails {
        let auth = h.auth.clone();
        handles.push(tokio::spawn(async move { auth.login(&email, PASSWORD).await }));
    }

    let mut refresh_tokens = std::collections::HashSet::new();
    let mut user_ids = std::collections::HashSet::<Uuid>::new();
    for handle in handles {
        let session = handle.await.unwrap().unwrap();
        refresh_tokens.insert(session.refresh_token);
        user_ids.insert(session.user.id);
    }

    assert_eq!(refresh_tokens.len(), 8);
    assert_eq!(user_ids.len(), 8);
    assert_eq!(h.tokens.len(), 8);
}

#[tokio::test]
async fn tokens_from_another_secret_are_rejected() {
    let h = harness();
    let user = add_user(&h, "walt@breakingbad.com").await;

    let mut other = jwt_settings();
    other.secret = "a-completely-different-secret-9876543210".to_string();
    let foreign = TokenSigner::new(&other, h.clock.clone()).unwrap();
    let token = foreign.issue(user.id, Duration::hours(1)).unwrap();

    assert_eq!(h.auth.authenticate(&token), Err(AuthError::Unauthorized));
}
