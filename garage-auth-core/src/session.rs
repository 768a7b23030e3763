//! Session handles: creation, single-use rotation, revocation and expiry
//!
//! A session record moves from active to revoked (rotation, logout) or
//! expires once `expires_at` passes. Records are never reactivated.

use crate::audit::ClientInfo;
use crate::config::SessionSettings;
use crate::error::{AuthError, AuthResult};
use crate::jwt::JwtService;
use crate::store::CredentialStore;
use crate::user::User;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Stored session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub handle: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub origin_address: Option<String>,
    pub origin_agent: Option<String>,
}

impl SessionRecord {
    /// Usable for rotation
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && now < self.expires_at
    }
}

/// Everything about a new session except its owner
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSeed {
    pub handle: String,
    pub expires_at: DateTime<Utc>,
    pub origin_address: Option<String>,
    pub origin_agent: Option<String>,
}

impl SessionSeed {
    pub fn into_record(self, user_id: Uuid, now: DateTime<Utc>) -> SessionRecord {
        SessionRecord {
            handle: self.handle,
            user_id,
            created_at: now,
            expires_at: self.expires_at,
            revoked: false,
            revoked_at: None,
            origin_address: self.origin_address,
            origin_agent: self.origin_agent,
        }
    }
}

/// Credentials handed to the client after login or rotation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedSession {
    pub handle: String,
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Session as listed to its owner; the handle is shown by prefix only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub prefix: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub origin_address: Option<String>,
    pub origin_agent: Option<String>,
}

/// Result of a retention sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub expired_sessions: usize,
    pub revoked_sessions: usize,
    pub login_attempts: usize,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.expired_sessions + self.revoked_sessions + self.login_attempts
    }
}

pub struct SessionRegistry {
    store: Arc<dyn CredentialStore>,
    jwt: Arc<JwtService>,
    settings: SessionSettings,
}

impl SessionRegistry {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        jwt: Arc<JwtService>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            store,
            jwt,
            settings,
        }
    }

    fn prefix_of(&self, handle: &str) -> String {
        handle.chars().take(self.settings.display_prefix_len).collect()
    }

    fn seed(&self, client: &ClientInfo, now: DateTime<Utc>) -> SessionSeed {
        SessionSeed {
            handle: self.jwt.issue_session_handle(),
            expires_at: now + self.settings.ttl(),
            origin_address: client.address.clone(),
            origin_agent: client.agent.clone(),
        }
    }

    /// Open a new session for a user and mint its access token
    pub async fn create_session(&self, user: &User, client: &ClientInfo) -> AuthResult<IssuedSession> {
        let now = Utc::now();
        let record = self.seed(client, now).into_record(user.id, now);
        let handle = record.handle.clone();
        let expires_at = record.expires_at;

        self.store.insert_session(record).await?;
        let access_token = self.jwt.issue_access_token(user)?;

        tracing::info!(
            user_id = %user.id,
            session = %self.prefix_of(&handle),
            "Session created"
        );
        Ok(IssuedSession {
            handle,
            access_token,
            expires_at,
        })
    }

    /// Exchange an active handle for a fresh one.
    ///
    /// The old handle is revoked whether or not the owner turns out to be
    /// usable; presenting it again fails.
    pub async fn rotate_session(
        &self,
        old_handle: &str,
        client: &ClientInfo,
    ) -> AuthResult<(User, IssuedSession)> {
        let now = Utc::now();
        let replacement = self
            .store
            .rotate_session(old_handle, self.seed(client, now), now)
            .await?
            .ok_or_else(|| {
                tracing::info!(
                    target: "audit",
                    session = %self.prefix_of(old_handle),
                    "Rejected rotation of inactive session"
                );
                AuthError::SessionInvalid
            })?;

        let owner = self.store.find_user_by_id(replacement.user_id).await?;
        let user = match owner {
            Some(user) if user.active => user,
            _ => {
                self.store.revoke_session(&replacement.handle, now).await?;
                tracing::info!(
                    target: "audit",
                    user_id = %replacement.user_id,
                    "Rejected rotation for missing or inactive user"
                );
                return Err(AuthError::SessionInvalid);
            }
        };

        let access_token = self.jwt.issue_access_token(&user)?;
        tracing::info!(
            user_id = %user.id,
            from = %self.prefix_of(old_handle),
            to = %self.prefix_of(&replacement.handle),
            "Session rotated"
        );

        Ok((
            user,
            IssuedSession {
                handle: replacement.handle,
                access_token,
                expires_at: replacement.expires_at,
            },
        ))
    }

    /// Revoke one handle; unknown or already revoked handles are not an error
    pub async fn revoke_session(&self, handle: &str) -> AuthResult<()> {
        if self.store.revoke_session(handle, Utc::now()).await? {
            tracing::info!(session = %self.prefix_of(handle), "Session revoked");
        }
        Ok(())
    }

    /// Revoke every session of a user, returning how many were revoked
    pub async fn revoke_all_sessions(&self, user_id: Uuid) -> AuthResult<usize> {
        let revoked = self.store.revoke_user_sessions(user_id, Utc::now()).await?;
        tracing::info!(target: "audit", user_id = %user_id, revoked, "All sessions revoked");
        Ok(revoked)
    }

    /// Active sessions of a user, newest first
    pub async fn list_active_sessions(&self, user_id: Uuid) -> AuthResult<Vec<SessionSummary>> {
        let now = Utc::now();
        let mut sessions: Vec<SessionRecord> = self
            .store
            .list_user_sessions(user_id)
            .await?
            .into_iter()
            .filter(|s| s.is_active(now))
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(sessions
            .into_iter()
            .map(|s| SessionSummary {
                prefix: self.prefix_of(&s.handle),
                created_at: s.created_at,
                expires_at: s.expires_at,
                origin_address: s.origin_address,
                origin_agent: s.origin_agent,
            })
            .collect())
    }

    /// Revoke the user's active sessions matching a displayed prefix
    pub async fn revoke_session_by_prefix(&self, user_id: Uuid, prefix: &str) -> AuthResult<usize> {
        let prefix = prefix.trim();
        if prefix.chars().count() < self.settings.display_prefix_len {
            return Err(AuthError::SessionInvalid);
        }

        let revoked = self
            .store
            .revoke_sessions_by_prefix(user_id, prefix, Utc::now())
            .await?;
        if revoked == 0 {
            return Err(AuthError::SessionInvalid);
        }

        tracing::info!(user_id = %user_id, prefix, revoked, "Sessions revoked by prefix");
        Ok(revoked)
    }

    /// Delete expired sessions and revoked sessions past their retention
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> AuthResult<SweepReport> {
        let purge = self
            .store
            .purge_sessions(now, now - self.settings.revoked_retention())
            .await?;
        Ok(SweepReport {
            expired_sessions: purge.expired,
            revoked_sessions: purge.revoked,
            login_attempts: 0,
        })
    }
}
