//! In-memory credential store with JSON snapshot persistence

use super::{CredentialStore, SessionPurge};
use crate::audit::{AttemptQuery, LoginAttempt};
use crate::error::{StoreError, StoreResult};
use crate::session::{SessionRecord, SessionSeed};
use crate::user::{User, UserFilter};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use uuid::Uuid;

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Default)]
struct UserTable {
    by_id: HashMap<Uuid, User>,
    /// normalized email -> id
    by_email: HashMap<String, Uuid>,
}

/// On-disk snapshot layout
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    saved_at: DateTime<Utc>,
    users: Vec<User>,
    sessions: Vec<SessionRecord>,
    attempts: Vec<LoginAttempt>,
}

/// Process-local store.
///
/// Users and sessions sit behind a lock each so that multi-record updates
/// (email re-indexing, rotation, revoke-all) are atomic. Login attempts are
/// sharded by email.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<UserTable>,
    sessions: RwLock<HashMap<String, SessionRecord>>,
    attempts: DashMap<String, Vec<LoginAttempt>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a snapshot file; a missing file yields an empty store
    pub fn load(path: &Path) -> StoreResult<Self> {
        let store = Self::new();
        if !path.exists() {
            tracing::debug!("No snapshot at {}, starting empty", path.display());
            return Ok(store);
        }

        let bytes = std::fs::read(path).map_err(|e| {
            StoreError::Snapshot(format!("failed to read {}: {}", path.display(), e))
        })?;
        let snapshot: Snapshot = serde_json::from_slice(&bytes).map_err(|e| {
            StoreError::Snapshot(format!("failed to parse {}: {}", path.display(), e))
        })?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(StoreError::Snapshot(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }

        {
            let mut users = store.users.write();
            for user in snapshot.users {
                if users.by_email.contains_key(&user.email) || users.by_id.contains_key(&user.id) {
                    return Err(StoreError::Snapshot(format!(
                        "duplicate user {} ({}) in {}",
                        user.email,
                        user.id,
                        path.display()
                    )));
                }
                users.by_email.insert(user.email.clone(), user.id);
                users.by_id.insert(user.id, user);
            }
        }
        {
            let mut sessions = store.sessions.write();
            for session in snapshot.sessions {
                sessions.insert(session.handle.clone(), session);
            }
        }
        for attempt in snapshot.attempts {
            store
                .attempts
                .entry(attempt.email.clone())
                .or_default()
                .push(attempt);
        }

        tracing::info!(
            users = store.users.read().by_id.len(),
            sessions = store.sessions.read().len(),
            "Loaded credential snapshot from {}",
            path.display()
        );
        Ok(store)
    }

    /// Write the full store to a snapshot file.
    ///
    /// The file is written next to the target and renamed into place.
    pub fn save(&self, path: &Path) -> StoreResult<()> {
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            users: self.users.read().by_id.values().cloned().collect(),
            sessions: self.sessions.read().values().cloned().collect(),
            attempts: self
                .attempts
                .iter()
                .flat_map(|entry| entry.value().clone())
                .collect(),
        };

        let json = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| StoreError::Snapshot(format!("failed to serialize snapshot: {}", e)))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Snapshot(format!("failed to create {}: {}", parent.display(), e))
                })?;
            }
        }

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| {
            StoreError::Snapshot(format!("failed to write {}: {}", tmp.display(), e))
        })?;
        std::fs::rename(&tmp, path).map_err(|e| {
            StoreError::Snapshot(format!("failed to replace {}: {}", path.display(), e))
        })?;

        tracing::debug!("Saved credential snapshot to {}", path.display());
        Ok(())
    }

    fn filtered_users(&self, filter: &UserFilter) -> Vec<User> {
        let users = self.users.read();
        let mut matched: Vec<User> = users
            .by_id
            .values()
            .filter(|u| filter.matches(u))
            .cloned()
            .collect();
        matched.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.email.cmp(&b.email))
        });
        matched
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.users.read().by_id.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let users = self.users.read();
        Ok(users
            .by_email
            .get(email)
            .and_then(|id| users.by_id.get(id))
            .cloned())
    }

    async fn insert_user(&self, user: User) -> StoreResult<()> {
        let mut users = self.users.write();
        if users.by_email.contains_key(&user.email) {
            return Err(StoreError::Conflict(format!("email {} is taken", user.email)));
        }
        if users.by_id.contains_key(&user.id) {
            return Err(StoreError::Conflict(format!("user {} exists", user.id)));
        }
        users.by_email.insert(user.email.clone(), user.id);
        users.by_id.insert(user.id, user);
        Ok(())
    }

    async fn update_user(&self, user: User) -> StoreResult<()> {
        let mut users = self.users.write();
        let previous_email = match users.by_id.get(&user.id) {
            Some(existing) => existing.email.clone(),
            None => return Err(StoreError::NotFound(format!("user {}", user.id))),
        };

        if previous_email != user.email {
            if users.by_email.contains_key(&user.email) {
                return Err(StoreError::Conflict(format!("email {} is taken", user.email)));
            }
            users.by_email.remove(&previous_email);
            users.by_email.insert(user.email.clone(), user.id);
        }
        users.by_id.insert(user.id, user);
        Ok(())
    }

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        let mut users = self.users.write();
        match users.by_id.get_mut(&id) {
            Some(user) => {
                user.last_login = Some(at);
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("user {}", id))),
        }
    }

    async fn list_users(&self, filter: &UserFilter) -> StoreResult<Vec<User>> {
        let offset = filter.offset.unwrap_or(0);
        let limit = filter.limit.unwrap_or(usize::MAX);
        Ok(self
            .filtered_users(filter)
            .into_iter()
            .skip(offset)
            .take(limit)
            .collect())
    }

    async fn count_users(&self, filter: &UserFilter) -> StoreResult<usize> {
        let users = self.users.read();
        Ok(users.by_id.values().filter(|u| filter.matches(u)).count())
    }

    async fn insert_session(&self, session: SessionRecord) -> StoreResult<()> {
        let mut sessions = self.sessions.write();
        if sessions.contains_key(&session.handle) {
            return Err(StoreError::Conflict("session handle collision".to_string()));
        }
        sessions.insert(session.handle.clone(), session);
        Ok(())
    }

    async fn find_session(&self, handle: &str) -> StoreResult<Option<SessionRecord>> {
        Ok(self.sessions.read().get(handle).cloned())
    }

    async fn rotate_session(
        &self,
        old_handle: &str,
        seed: SessionSeed,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<SessionRecord>> {
        let mut sessions = self.sessions.write();
        if sessions.contains_key(&seed.handle) {
            return Err(StoreError::Conflict("session handle collision".to_string()));
        }

        let user_id = match sessions.get_mut(old_handle) {
            Some(old) if old.is_active(now) => {
                old.revoked = true;
                old.revoked_at = Some(now);
                old.user_id
            }
            _ => return Ok(None),
        };

        let replacement = seed.into_record(user_id, now);
        sessions.insert(replacement.handle.clone(), replacement.clone());
        Ok(Some(replacement))
    }

    async fn revoke_session(&self, handle: &str, now: DateTime<Utc>) -> StoreResult<bool> {
        let mut sessions = self.sessions.write();
        match sessions.get_mut(handle) {
            Some(session) if !session.revoked => {
                session.revoked = true;
                session.revoked_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_user_sessions(&self, user_id: Uuid, now: DateTime<Utc>) -> StoreResult<usize> {
        let mut sessions = self.sessions.write();
        let mut revoked = 0;
        for session in sessions
            .values_mut()
            .filter(|s| s.user_id == user_id && !s.revoked)
        {
            session.revoked = true;
            session.revoked_at = Some(now);
            revoked += 1;
        }
        Ok(revoked)
    }

    async fn revoke_sessions_by_prefix(
        &self,
        user_id: Uuid,
        prefix: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<usize> {
        let mut sessions = self.sessions.write();
        let mut revoked = 0;
        for session in sessions.values_mut().filter(|s| {
            s.user_id == user_id && s.is_active(now) && s.handle.starts_with(prefix)
        }) {
            session.revoked = true;
            session.revoked_at = Some(now);
            revoked += 1;
        }
        Ok(revoked)
    }

    async fn list_user_sessions(&self, user_id: Uuid) -> StoreResult<Vec<SessionRecord>> {
        Ok(self
            .sessions
            .read()
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn purge_sessions(
        &self,
        now: DateTime<Utc>,
        revoked_before: DateTime<Utc>,
    ) -> StoreResult<SessionPurge> {
        let mut sessions = self.sessions.write();
        let mut purge = SessionPurge::default();
        sessions.retain(|_, s| {
            if s.expires_at <= now {
                purge.expired += 1;
                false
            } else if s.revoked && s.revoked_at.map_or(true, |at| at < revoked_before) {
                purge.revoked += 1;
                false
            } else {
                true
            }
        });
        Ok(purge)
    }

    async fn insert_login_attempt(&self, attempt: LoginAttempt) -> StoreResult<()> {
        self.attempts
            .entry(attempt.email.clone())
            .or_default()
            .push(attempt);
        Ok(())
    }

    async fn attempt_times(&self, query: &AttemptQuery) -> StoreResult<Vec<DateTime<Utc>>> {
        let mut times: Vec<DateTime<Utc>> = match &query.email {
            Some(email) => self
                .attempts
                .get(email)
                .map(|entry| {
                    entry
                        .iter()
                        .filter(|a| query.matches(a))
                        .map(|a| a.attempted_at)
                        .collect()
                })
                .unwrap_or_default(),
            None => self
                .attempts
                .iter()
                .flat_map(|entry| {
                    entry
                        .value()
                        .iter()
                        .filter(|a| query.matches(a))
                        .map(|a| a.attempted_at)
                        .collect::<Vec<_>>()
                })
                .collect(),
        };
        times.sort();
        Ok(times)
    }

    async fn purge_login_attempts(&self, before: DateTime<Utc>) -> StoreResult<usize> {
        let mut removed = 0;
        self.attempts.retain(|_, attempts| {
            let len = attempts.len();
            attempts.retain(|a| a.attempted_at >= before);
            removed += len - attempts.len();
            !attempts.is_empty()
        });
        Ok(removed)
    }
}
