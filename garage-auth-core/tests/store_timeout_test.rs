//! A slow credential store must surface as `StoreUnavailable`, never as a
//! credential failure

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use garage_auth_core::store::SessionPurge;
use garage_auth_core::{
    AttemptQuery, AuthConfig, AuthError, AuthService, ClientInfo, CredentialStore, LoginAttempt,
    MemoryStore, SessionRecord, StoreResult, User, UserFilter,
};
use garage_auth_core::session::SessionSeed;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Delegates to a memory store after an artificial delay
struct SlowStore {
    inner: MemoryStore,
    delay: Duration,
}

impl SlowStore {
    async fn pause(&self) {
        tokio::time::sleep(self.delay).await;
    }
}

#[async_trait]
impl CredentialStore for SlowStore {
    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        self.pause().await;
        self.inner.find_user_by_id(id).await
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.pause().await;
        self.inner.find_user_by_email(email).await
    }

    async fn insert_user(&self, user: User) -> StoreResult<()> {
        self.pause().await;
        self.inner.insert_user(user).await
    }

    async fn update_user(&self, user: User) -> StoreResult<()> {
        self.pause().await;
        self.inner.update_user(user).await
    }

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        self.pause().await;
        self.inner.record_login(id, at).await
    }

    async fn list_users(&self, filter: &UserFilter) -> StoreResult<Vec<User>> {
        self.pause().await;
        self.inner.list_users(filter).await
    }

    async fn count_users(&self, filter: &UserFilter) -> StoreResult<usize> {
        self.pause().await;
        self.inner.count_users(filter).await
    }

    async fn insert_session(&self, session: SessionRecord) -> StoreResult<()> {
        self.pause().await;
        self.inner.insert_session(session).await
    }

    async fn find_session(&self, handle: &str) -> StoreResult<Option<SessionRecord>> {
        self.pause().await;
        self.inner.find_session(handle).await
    }

    async fn rotate_session(
        &self,
        old_handle: &str,
        seed: SessionSeed,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<SessionRecord>> {
        self.pause().await;
        self.inner.rotate_session(old_handle, seed, now).await
    }

    async fn revoke_session(&self, handle: &str, now: DateTime<Utc>) -> StoreResult<bool> {
        self.pause().await;
        self.inner.revoke_session(handle, now).await
    }

    async fn revoke_user_sessions(&self, user_id: Uuid, now: DateTime<Utc>) -> StoreResult<usize> {
        self.pause().await;
        self.inner.revoke_user_sessions(user_id, now).await
    }

    async fn revoke_sessions_by_prefix(
        &self,
        user_id: Uuid,
        prefix: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<usize> {
        self.pause().await;
        self.inner.revoke_sessions_by_prefix(user_id, prefix, now).await
    }

    async fn list_user_sessions(&self, user_id: Uuid) -> StoreResult<Vec<SessionRecord>> {
        self.pause().await;
        self.inner.list_user_sessions(user_id).await
    }

    async fn purge_sessions(
        &self,
        now: DateTime<Utc>,
        revoked_before: DateTime<Utc>,
    ) -> StoreResult<SessionPurge> {
        self.pause().await;
        self.inner.purge_sessions(now, revoked_before).await
    }

    async fn insert_login_attempt(&self, attempt: LoginAttempt) -> StoreResult<()> {
        self.pause().await;
        self.inner.insert_login_attempt(attempt).await
    }

    async fn attempt_times(&self, query: &AttemptQuery) -> StoreResult<Vec<DateTime<Utc>>> {
        self.pause().await;
        self.inner.attempt_times(query).await
    }

    async fn purge_login_attempts(&self, before: DateTime<Utc>) -> StoreResult<usize> {
        self.pause().await;
        self.inner.purge_login_attempts(before).await
    }
}

#[tokio::test]
async fn test_slow_store_reports_unavailable() {
    let mut config = AuthConfig::default().with_secret("timeout-test-secret-0123456789abcdef");
    config.passwords.bcrypt_cost = 4;
    config.storage.timeout_ms = 50;

    let store = Arc::new(SlowStore {
        inner: MemoryStore::new(),
        delay: Duration::from_millis(300),
    });
    let service = AuthService::new(config, store).unwrap();

    let err = service
        .login("ana@garage.example", "Garage#2024", &ClientInfo::new())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::StoreUnavailable(_)));
    assert!(!err.is_authentication_failure());

    assert!(matches!(
        service.refresh("any-handle", &ClientInfo::new()).await,
        Err(AuthError::StoreUnavailable(_))
    ));
}

#[tokio::test]
async fn test_fast_enough_store_works() {
    let mut config = AuthConfig::default().with_secret("timeout-test-secret-0123456789abcdef");
    config.passwords.bcrypt_cost = 4;
    config.storage.timeout_ms = 2_000;

    let store = Arc::new(SlowStore {
        inner: MemoryStore::new(),
        delay: Duration::from_millis(5),
    });
    let service = AuthService::new(config, store).unwrap();

    let created = service
        .ensure_default_admin("admin@garage.example", "Administrator", "Garage#2024")
        .await
        .unwrap();
    assert!(created.is_some());
    assert!(service
        .login("admin@garage.example", "Garage#2024", &ClientInfo::new())
        .await
        .is_ok());
}
