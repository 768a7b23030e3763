//! Login orchestration and request authentication
//!
//! `AuthService` owns one instance of every component and is the entry
//! point transports call. Account administration lives in `accounts.rs`.

use crate::audit::ClientInfo;
use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::guard::BruteForceGuard;
use crate::jwt::JwtService;
use crate::password::PasswordHasher;
use crate::rbac::Principal;
use crate::session::{IssuedSession, SessionRegistry, SessionSummary, SweepReport};
use crate::store::{CredentialStore, TimedStore};
use crate::user::{normalize_email, User, UserView};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Returned by a successful login or refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginOutcome {
    pub user: UserView,
    pub access_token: String,
    pub session_handle: String,
    /// Access token lifetime in seconds
    pub expires_in: u64,
    pub session_expires_at: DateTime<Utc>,
}

pub struct AuthService {
    pub(crate) config: AuthConfig,
    pub(crate) store: Arc<dyn CredentialStore>,
    pub(crate) hasher: PasswordHasher,
    pub(crate) jwt: Arc<JwtService>,
    pub(crate) guard: BruteForceGuard,
    pub(crate) sessions: SessionRegistry,
}

impl AuthService {
    /// Validate the configuration and wire every component to the store.
    ///
    /// Every store call made by the service is bounded by
    /// `storage.timeout_ms`.
    pub fn new(config: AuthConfig, store: Arc<dyn CredentialStore>) -> AuthResult<Self> {
        config
            .validate()
            .map_err(|e| AuthError::Configuration(e.to_string()))?;

        let store: Arc<dyn CredentialStore> =
            Arc::new(TimedStore::new(store, config.storage.timeout()));
        let jwt = Arc::new(JwtService::new(&config.tokens, config.sessions.handle_bytes)?);
        let hasher = PasswordHasher::new(&config.passwords);
        let guard = BruteForceGuard::new(store.clone(), config.throttle.clone());
        let sessions = SessionRegistry::new(store.clone(), jwt.clone(), config.sessions.clone());

        tracing::info!(
            bcrypt_cost = config.passwords.bcrypt_cost,
            access_ttl_secs = config.tokens.access_ttl_secs,
            session_ttl_secs = config.sessions.ttl_secs,
            "Auth service initialized"
        );

        Ok(Self {
            config,
            store,
            hasher,
            jwt,
            guard,
            sessions,
        })
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt
    }

    pub fn hasher(&self) -> &PasswordHasher {
        &self.hasher
    }

    fn outcome(&self, user: &User, issued: IssuedSession) -> LoginOutcome {
        LoginOutcome {
            user: user.view(),
            access_token: issued.access_token,
            session_handle: issued.handle,
            expires_in: self.config.tokens.access_ttl_secs,
            session_expires_at: issued.expires_at,
        }
    }

    /// Authenticate by email and password and open a session
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        client: &ClientInfo,
    ) -> AuthResult<LoginOutcome> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidInput(vec![
                "email and password are required".to_string(),
            ]));
        }

        self.guard.check_origin(client).await?;
        self.guard.check_threshold(&email, client).await?;

        let user = match self.store.find_user_by_email(&email).await? {
            Some(user) if user.active => user,
            found => {
                let reason = if found.is_some() {
                    "account inactive"
                } else {
                    "unknown email"
                };
                tracing::info!(target: "audit", email = %email, reason, "Login rejected");
                self.guard.record_attempt(&email, false, client).await;
                self.hasher.verify_dummy(password).await;
                return Err(AuthError::InvalidCredentials);
            }
        };

        if !self
            .hasher
            .verify(password, Some(user.password_hash.as_str()))
            .await
        {
            tracing::info!(target: "audit", email = %email, reason = "wrong password", "Login rejected");
            self.guard.record_attempt(&email, false, client).await;
            return Err(AuthError::InvalidCredentials);
        }

        self.guard.record_attempt(&email, true, client).await;

        let now = Utc::now();
        self.store.record_login(user.id, now).await?;
        let user = User {
            last_login: Some(now),
            ..user
        };

        let issued = self.sessions.create_session(&user, client).await?;
        tracing::info!(user_id = %user.id, role = %user.role, "User logged in");
        Ok(self.outcome(&user, issued))
    }

    /// Rotate a session handle into a fresh handle and access token
    pub async fn refresh(&self, handle: &str, client: &ClientInfo) -> AuthResult<LoginOutcome> {
        let (user, issued) = self.sessions.rotate_session(handle, client).await?;
        Ok(self.outcome(&user, issued))
    }

    /// End one session; never fails for unknown or revoked handles
    pub async fn logout(&self, handle: &str) -> AuthResult<()> {
        if let Err(e) = self.sessions.revoke_session(handle).await {
            tracing::warn!("Logout could not revoke session: {}", e);
        }
        Ok(())
    }

    /// End every session of a user
    pub async fn logout_all(&self, user_id: Uuid) -> AuthResult<usize> {
        self.sessions.revoke_all_sessions(user_id).await
    }

    /// Resolve an access token into the caller.
    ///
    /// The account is re-loaded so that deactivated or deleted users are
    /// rejected before their token expires, and role changes apply at once.
    pub async fn authenticate(&self, access_token: &str) -> AuthResult<Principal> {
        let claims = self.jwt.verify_access_token(access_token)?;
        let user_id = claims.user_id()?;

        match self.store.find_user_by_id(user_id).await? {
            Some(user) if user.active => Ok(Principal::new(user.id, user.email, user.name, user.role)),
            _ => {
                tracing::info!(target: "audit", user_id = %user_id, "Token presented for missing or inactive user");
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    /// Active sessions of a user, newest first
    pub async fn list_sessions(&self, user_id: Uuid) -> AuthResult<Vec<SessionSummary>> {
        self.sessions.list_active_sessions(user_id).await
    }

    pub async fn revoke_session_by_prefix(&self, user_id: Uuid, prefix: &str) -> AuthResult<usize> {
        self.sessions.revoke_session_by_prefix(user_id, prefix).await
    }

    /// Purge expired sessions, stale revoked sessions and old login attempts
    pub async fn sweep(&self) -> AuthResult<SweepReport> {
        self.sweep_at(Utc::now()).await
    }

    pub async fn sweep_at(&self, now: DateTime<Utc>) -> AuthResult<SweepReport> {
        let mut report = self.sessions.sweep_expired(now).await?;
        report.login_attempts = self
            .store
            .purge_login_attempts(now - self.config.throttle.attempt_retention())
            .await?;

        if report.total() > 0 {
            tracing::info!(
                expired_sessions = report.expired_sessions,
                revoked_sessions = report.revoked_sessions,
                login_attempts = report.login_attempts,
                "Sweep removed stale records"
            );
        } else {
            tracing::debug!("Sweep found nothing to remove");
        }
        Ok(report)
    }
}
