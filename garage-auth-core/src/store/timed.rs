//! Store decorator that bounds every call with a timeout

use super::{CredentialStore, SessionPurge};
use crate::audit::{AttemptQuery, LoginAttempt};
use crate::error::{StoreError, StoreResult};
use crate::session::{SessionRecord, SessionSeed};
use crate::user::{User, UserFilter};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Wraps another store; a call that does not finish in time fails with
/// `StoreError::Timeout`
pub struct TimedStore {
    inner: Arc<dyn CredentialStore>,
    timeout: Duration,
}

impl TimedStore {
    pub fn new(inner: Arc<dyn CredentialStore>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>> + Send,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(operation, timeout = ?self.timeout, "Credential store call timed out");
                Err(StoreError::Timeout(self.timeout))
            }
        }
    }
}

#[async_trait]
impl CredentialStore for TimedStore {
    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        self.bounded("find_user_by_id", self.inner.find_user_by_id(id))
            .await
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.bounded("find_user_by_email", self.inner.find_user_by_email(email))
            .await
    }

    async fn insert_user(&self, user: User) -> StoreResult<()> {
        self.bounded("insert_user", self.inner.insert_user(user)).await
    }

    async fn update_user(&self, user: User) -> StoreResult<()> {
        self.bounded("update_user", self.inner.update_user(user)).await
    }

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        self.bounded("record_login", self.inner.record_login(id, at))
            .await
    }

    async fn list_users(&self, filter: &UserFilter) -> StoreResult<Vec<User>> {
        self.bounded("list_users", self.inner.list_users(filter)).await
    }

    async fn count_users(&self, filter: &UserFilter) -> StoreResult<usize> {
        self.bounded("count_users", self.inner.count_users(filter)).await
    }

    async fn insert_session(&self, session: SessionRecord) -> StoreResult<()> {
        self.bounded("insert_session", self.inner.insert_session(session))
            .await
    }

    async fn find_session(&self, handle: &str) -> StoreResult<Option<SessionRecord>> {
        self.bounded("find_session", self.inner.find_session(handle))
            .await
    }

    async fn rotate_session(
        &self,
        old_handle: &str,
        seed: SessionSeed,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<SessionRecord>> {
        self.bounded(
            "rotate_session",
            self.inner.rotate_session(old_handle, seed, now),
        )
        .await
    }

    async fn revoke_session(&self, handle: &str, now: DateTime<Utc>) -> StoreResult<bool> {
        self.bounded("revoke_session", self.inner.revoke_session(handle, now))
            .await
    }

    async fn revoke_user_sessions(&self, user_id: Uuid, now: DateTime<Utc>) -> StoreResult<usize> {
        self.bounded(
            "revoke_user_sessions",
            self.inner.revoke_user_sessions(user_id, now),
        )
        .await
    }

    async fn revoke_sessions_by_prefix(
        &self,
        user_id: Uuid,
        prefix: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<usize> {
        self.bounded(
            "revoke_sessions_by_prefix",
            self.inner.revoke_sessions_by_prefix(user_id, prefix, now),
        )
        .await
    }

    async fn list_user_sessions(&self, user_id: Uuid) -> StoreResult<Vec<SessionRecord>> {
        self.bounded("list_user_sessions", self.inner.list_user_sessions(user_id))
            .await
    }

    async fn purge_sessions(
        &self,
        now: DateTime<Utc>,
        revoked_before: DateTime<Utc>,
    ) -> StoreResult<SessionPurge> {
        self.bounded(
            "purge_sessions",
            self.inner.purge_sessions(now, revoked_before),
        )
        .await
    }

    async fn insert_login_attempt(&self, attempt: LoginAttempt) -> StoreResult<()> {
        self.bounded(
            "insert_login_attempt",
            self.inner.insert_login_attempt(attempt),
        )
        .await
    }

    async fn attempt_times(&self, query: &AttemptQuery) -> StoreResult<Vec<DateTime<Utc>>> {
        self.bounded("attempt_times", self.inner.attempt_times(query))
            .await
    }

    async fn purge_login_attempts(&self, before: DateTime<Utc>) -> StoreResult<usize> {
        self.bounded(
            "purge_login_attempts",
            self.inner.purge_login_attempts(before),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_passes_through() {
        let store = TimedStore::new(Arc::new(MemoryStore::new()), Duration::from_secs(1));
        assert!(store
            .find_user_by_email("ana@garage.example")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_elapsed_future_becomes_timeout() {
        let store = TimedStore::new(Arc::new(MemoryStore::new()), Duration::from_millis(20));
        let result: StoreResult<()> = store
            .bounded("slow", async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(StoreError::Timeout(_))));
    }
}
