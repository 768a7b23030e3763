//! Credential store boundary
//!
//! The core never talks to a database directly. Everything it persists goes
//! through [`CredentialStore`]; `MemoryStore` is the bundled implementation
//! and `TimedStore` bounds every call of another store with a timeout.

pub mod memory;
pub mod timed;

pub use memory::MemoryStore;
pub use timed::TimedStore;

use crate::audit::{AttemptQuery, LoginAttempt};
use crate::error::StoreResult;
use crate::session::{SessionRecord, SessionSeed};
use crate::user::{User, UserFilter};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Counts of session records removed by a purge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionPurge {
    pub expired: usize,
    pub revoked: usize,
}

/// Storage operations required by the credential layer
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;

    /// Lookup by normalized email
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Insert a new user; `Conflict` when the email is taken
    async fn insert_user(&self, user: User) -> StoreResult<()>;

    /// Replace an existing user; `NotFound` when absent, `Conflict` when the
    /// new email belongs to someone else
    async fn update_user(&self, user: User) -> StoreResult<()>;

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()>;

    /// Users matching the filter, sorted by name, with limit/offset applied
    async fn list_users(&self, filter: &UserFilter) -> StoreResult<Vec<User>>;

    /// Number of users matching the filter, ignoring limit/offset
    async fn count_users(&self, filter: &UserFilter) -> StoreResult<usize>;

    async fn insert_session(&self, session: SessionRecord) -> StoreResult<()>;

    async fn find_session(&self, handle: &str) -> StoreResult<Option<SessionRecord>>;

    /// Revoke `old_handle` only if it is currently active and insert the
    /// replacement for the same owner, as one operation.
    ///
    /// Returns the replacement, or `None` when the old handle was not active.
    async fn rotate_session(
        &self,
        old_handle: &str,
        seed: SessionSeed,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<SessionRecord>>;

    /// Mark one session revoked; false when absent or already revoked
    async fn revoke_session(&self, handle: &str, now: DateTime<Utc>) -> StoreResult<bool>;

    /// Revoke every non-revoked session of a user
    async fn revoke_user_sessions(&self, user_id: Uuid, now: DateTime<Utc>) -> StoreResult<usize>;

    /// Revoke the user's active sessions whose handle starts with `prefix`
    async fn revoke_sessions_by_prefix(
        &self,
        user_id: Uuid,
        prefix: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<usize>;

    async fn list_user_sessions(&self, user_id: Uuid) -> StoreResult<Vec<SessionRecord>>;

    /// Delete expired sessions and sessions revoked before `revoked_before`
    async fn purge_sessions(
        &self,
        now: DateTime<Utc>,
        revoked_before: DateTime<Utc>,
    ) -> StoreResult<SessionPurge>;

    async fn insert_login_attempt(&self, attempt: LoginAttempt) -> StoreResult<()>;

    /// Timestamps of matching attempts, oldest first
    async fn attempt_times(&self, query: &AttemptQuery) -> StoreResult<Vec<DateTime<Utc>>>;

    /// Delete attempts older than `before`
    async fn purge_login_attempts(&self, before: DateTime<Utc>) -> StoreResult<usize>;
}
