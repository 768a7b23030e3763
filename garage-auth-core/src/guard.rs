//! Brute-force protection over recorded login attempts

use crate::audit::{AttemptQuery, ClientInfo, LoginAttempt};
use crate::config::ThrottleSettings;
use crate::error::{AuthError, AuthResult};
use crate::store::CredentialStore;
use crate::user::normalize_email;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Counts recent attempts per identity and per origin and refuses logins
/// once a limit is reached.
///
/// Counting is read-then-decide, so two racing attempts at the boundary may
/// both get through; the limit is approximate by one or two attempts.
pub struct BruteForceGuard {
    store: Arc<dyn CredentialStore>,
    settings: ThrottleSettings,
}

impl BruteForceGuard {
    pub fn new(store: Arc<dyn CredentialStore>, settings: ThrottleSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &ThrottleSettings {
        &self.settings
    }

    /// Record an attempt; store failures are logged and swallowed
    pub async fn record_attempt(&self, email: &str, success: bool, client: &ClientInfo) {
        let attempt = if success {
            LoginAttempt::success(email)
        } else {
            LoginAttempt::failure(email)
        }
        .with_client(client);

        attempt.log();
        if let Err(e) = self.store.insert_login_attempt(attempt).await {
            tracing::warn!("Failed to record login attempt: {}", e);
        }
    }

    /// Refuse when the origin address made too many attempts of any outcome
    pub async fn check_origin(&self, client: &ClientInfo) -> AuthResult<()> {
        self.check_origin_at(client, Utc::now()).await
    }

    /// Refuse when the identity has too many recent failures
    pub async fn check_threshold(&self, email: &str, client: &ClientInfo) -> AuthResult<()> {
        self.check_threshold_at(email, client, Utc::now()).await
    }

    pub(crate) async fn check_origin_at(
        &self,
        client: &ClientInfo,
        now: DateTime<Utc>,
    ) -> AuthResult<()> {
        let address = match &client.address {
            Some(address) => address.clone(),
            None => return Ok(()),
        };

        let query = AttemptQuery {
            email: None,
            origin_address: Some(address.clone()),
            failed_only: false,
            since: now - self.settings.window(),
        };
        let times = self.store.attempt_times(&query).await?;

        self.decide(&times, self.settings.max_origin_attempts, now)
            .map_err(|e| {
                tracing::warn!(target: "audit", address = %address, "Origin throttled");
                e
            })
    }

    pub(crate) async fn check_threshold_at(
        &self,
        email: &str,
        client: &ClientInfo,
        now: DateTime<Utc>,
    ) -> AuthResult<()> {
        let email = normalize_email(email);
        let origin_address = if self.settings.key_by_origin {
            client.address.clone()
        } else {
            None
        };

        let query = AttemptQuery {
            email: Some(email.clone()),
            origin_address,
            failed_only: true,
            since: now - self.settings.window(),
        };
        let times = self.store.attempt_times(&query).await?;

        self.decide(&times, self.settings.max_failures, now)
            .map_err(|e| {
                tracing::warn!(target: "audit", email = %email, "Login throttled");
                e
            })
    }

    /// `times` is sorted ascending and already limited to the window.
    ///
    /// With `count >= max`, the attempt at index `count - max` is the one
    /// whose expiry brings the count back under the limit.
    fn decide(&self, times: &[DateTime<Utc>], max: usize, now: DateTime<Utc>) -> AuthResult<()> {
        let count = times.len();
        if count < max {
            return Ok(());
        }

        let unlock_at = times[count - max] + self.settings.window();
        let wait = (unlock_at - now).max(Duration::seconds(1));
        Err(AuthError::Throttled {
            retry_after_secs: wait.num_seconds().max(1) as u64,
        })
    }
}
