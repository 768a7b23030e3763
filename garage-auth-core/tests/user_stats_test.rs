//! Account counts stay consistent while users are created concurrently

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use garage_auth_core::session::SessionSeed;
use garage_auth_core::store::SessionPurge;
use garage_auth_core::{
    AttemptQuery, AuthConfig, AuthService, CredentialStore, LoginAttempt, MemoryStore, NewUser,
    Principal, Role, SessionRecord, StoreResult, User, UserFilter,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Memory store that gains one active user at the start of every listing
/// or count, once growth is switched on
struct GrowingStore {
    inner: MemoryStore,
    growing: AtomicBool,
    added: AtomicUsize,
}

impl GrowingStore {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            growing: AtomicBool::new(false),
            added: AtomicUsize::new(0),
        }
    }

    async fn grow(&self) {
        if !self.growing.load(Ordering::SeqCst) {
            return;
        }
        let n = self.added.fetch_add(1, Ordering::SeqCst);
        let user = User::new(
            NewUser::new(
                format!("walk-in{}@garage.example", n),
                format!("Walk In {}", n),
                Role::Operator,
            ),
            "hash".to_string(),
        );
        self.inner.insert_user(user).await.unwrap();
    }
}

#[async_trait]
impl CredentialStore for GrowingStore {
    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        self.inner.find_user_by_id(id).await
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.inner.find_user_by_email(email).await
    }

    async fn insert_user(&self, user: User) -> StoreResult<()> {
        self.inner.insert_user(user).await
    }

    async fn update_user(&self, user: User) -> StoreResult<()> {
        self.inner.update_user(user).await
    }

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        self.inner.record_login(id, at).await
    }

    async fn list_users(&self, filter: &UserFilter) -> StoreResult<Vec<User>> {
        self.grow().await;
        self.inner.list_users(filter).await
    }

    async fn count_users(&self, filter: &UserFilter) -> StoreResult<usize> {
        self.grow().await;
        self.inner.count_users(filter).await
    }

    async fn insert_session(&self, session: SessionRecord) -> StoreResult<()> {
        self.inner.insert_session(session).await
    }

    async fn find_session(&self, handle: &str) -> StoreResult<Option<SessionRecord>> {
        self.inner.find_session(handle).await
    }

    async fn rotate_session(
        &self,
        old_handle: &str,
        seed: SessionSeed,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<SessionRecord>> {
        self.inner.rotate_session(old_handle, seed, now).await
    }

    async fn revoke_session(&self, handle: &str, now: DateTime<Utc>) -> StoreResult<bool> {
        self.inner.revoke_session(handle, now).await
    }

    async fn revoke_user_sessions(&self, user_id: Uuid, now: DateTime<Utc>) -> StoreResult<usize> {
        self.inner.revoke_user_sessions(user_id, now).await
    }

    async fn revoke_sessions_by_prefix(
        &self,
        user_id: Uuid,
        prefix: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<usize> {
        self.inner.revoke_sessions_by_prefix(user_id, prefix, now).await
    }

    async fn list_user_sessions(&self, user_id: Uuid) -> StoreResult<Vec<SessionRecord>> {
        self.inner.list_user_sessions(user_id).await
    }

    async fn purge_sessions(
        &self,
        now: DateTime<Utc>,
        revoked_before: DateTime<Utc>,
    ) -> StoreResult<SessionPurge> {
        self.inner.purge_sessions(now, revoked_before).await
    }

    async fn insert_login_attempt(&self, attempt: LoginAttempt) -> StoreResult<()> {
        self.inner.insert_login_attempt(attempt).await
    }

    async fn attempt_times(&self, query: &AttemptQuery) -> StoreResult<Vec<DateTime<Utc>>> {
        self.inner.attempt_times(query).await
    }

    async fn purge_login_attempts(&self, before: DateTime<Utc>) -> StoreResult<usize> {
        self.inner.purge_login_attempts(before).await
    }
}

async fn bootstrap() -> (AuthService, Arc<GrowingStore>, Principal) {
    let mut config = AuthConfig::default().with_secret("stats-test-secret-0123456789abcdef");
    config.passwords.bcrypt_cost = 4;

    let store = Arc::new(GrowingStore::new());
    let service = AuthService::new(config, store.clone()).unwrap();
    let admin = service
        .ensure_default_admin("admin@garage.example", "Administrator", "Garage#2024")
        .await
        .unwrap()
        .unwrap();
    let admin = Principal::new(admin.id, admin.email, admin.name, admin.role);
    (service, store, admin)
}

#[tokio::test]
async fn test_stats_consistent_while_users_are_added() {
    let (service, store, admin) = bootstrap().await;
    store.growing.store(true, Ordering::SeqCst);

    for _ in 0..3 {
        let stats = service.user_stats(&admin).await.unwrap();
        assert_eq!(stats.active + stats.inactive, stats.total);
        assert_eq!(stats.by_role.values().sum::<usize>(), stats.total);
        assert_eq!(stats.by_role[&Role::Admin], 1);
    }

    let added = store.added.load(Ordering::SeqCst);
    assert!(added >= 3);
    store.growing.store(false, Ordering::SeqCst);
    let stats = service.user_stats(&admin).await.unwrap();
    assert_eq!(stats.total, added + 1);
    assert_eq!(stats.inactive, 0);
}

#[tokio::test]
async fn test_page_total_counts_all_matches() {
    let (service, store, admin) = bootstrap().await;
    store.growing.store(true, Ordering::SeqCst);

    let filter = UserFilter {
        limit: Some(1),
        ..Default::default()
    };
    let page = service.list_users(&admin, &filter).await.unwrap();
    assert_eq!(page.users.len(), 1);
    assert!(page.total >= 2);
}
