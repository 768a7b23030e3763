//! Error types for the credential layer

use crate::password::PolicyViolation;
use std::time::Duration;

/// Result alias used across the crate
pub type AuthResult<T> = std::result::Result<T, AuthError>;

/// Result alias for credential store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Failures surfaced by the authentication and authorization operations.
///
/// Authentication failures (`InvalidCredentials`, `SessionInvalid`, the
/// `Token*` family) answer "who are you"; `Forbidden` answers "you may not
/// do that". Transports should map the two groups to different statuses.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Too many failed login attempts, retry in {retry_after_secs} seconds")]
    Throttled { retry_after_secs: u64 },

    #[error("Session is invalid, expired or already used")]
    SessionInvalid,

    #[error("Access token has expired")]
    TokenExpired,

    #[error("Access token is malformed")]
    TokenMalformed,

    #[error("Access token is invalid")]
    TokenInvalid,

    #[error("Access denied: {reason}")]
    Forbidden { reason: String },

    #[error("Weak password: {}", join_violations(.0))]
    WeakInput(Vec<PolicyViolation>),

    #[error("Invalid input: {}", .0.join(", "))]
    InvalidInput(Vec<String>),

    #[error("Email is already in use")]
    EmailTaken,

    #[error("User not found")]
    UserNotFound,

    #[error("Credential store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn join_violations(violations: &[PolicyViolation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl AuthError {
    /// Stable machine-readable code for transports
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::Throttled { .. } => "RATE_LIMIT_EXCEEDED",
            AuthError::SessionInvalid => "SESSION_INVALID",
            AuthError::TokenExpired => "TOKEN_EXPIRED",
            AuthError::TokenMalformed => "TOKEN_MALFORMED",
            AuthError::TokenInvalid => "INVALID_TOKEN",
            AuthError::Forbidden { .. } => "PERMISSION_DENIED",
            AuthError::WeakInput(_) => "WEAK_PASSWORD",
            AuthError::InvalidInput(_) => "INVALID_INPUT",
            AuthError::EmailTaken => "EMAIL_TAKEN",
            AuthError::UserNotFound => "USER_NOT_FOUND",
            AuthError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            AuthError::Configuration(_) => "CONFIGURATION_ERROR",
            AuthError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// True for "who are you" failures
    pub fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidCredentials
                | AuthError::SessionInvalid
                | AuthError::TokenExpired
                | AuthError::TokenMalformed
                | AuthError::TokenInvalid
        )
    }

    /// True for "you may not do that" failures
    pub fn is_authorization_failure(&self) -> bool {
        matches!(self, AuthError::Forbidden { .. })
    }

    /// Retry hint carried by `Throttled`
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            AuthError::Throttled { retry_after_secs } => {
                Some(Duration::from_secs(*retry_after_secs))
            }
            _ => None,
        }
    }

    pub(crate) fn forbidden(reason: impl Into<String>) -> Self {
        AuthError::Forbidden {
            reason: reason.into(),
        }
    }
}

/// Failures reported by a [`CredentialStore`](crate::store::CredentialStore)
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(_) => AuthError::EmailTaken,
            StoreError::NotFound(_) => AuthError::UserNotFound,
            other => AuthError::StoreUnavailable(other.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for AuthError {
    fn from(err: tokio::task::JoinError) -> Self {
        AuthError::Internal(format!("blocking task failed: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_groups() {
        assert!(AuthError::InvalidCredentials.is_authentication_failure());
        assert!(AuthError::TokenExpired.is_authentication_failure());
        assert!(!AuthError::InvalidCredentials.is_authorization_failure());

        let denied = AuthError::forbidden("users:delete required");
        assert!(denied.is_authorization_failure());
        assert!(!denied.is_authentication_failure());
        assert_eq!(denied.code(), "PERMISSION_DENIED");
    }

    #[test]
    fn test_store_error_conversion() {
        let err: AuthError = StoreError::Timeout(Duration::from_millis(50)).into();
        assert!(matches!(err, AuthError::StoreUnavailable(_)));

        let err: AuthError = StoreError::Conflict("email".into()).into();
        assert!(matches!(err, AuthError::EmailTaken));
    }

    #[test]
    fn test_throttled_retry_hint() {
        let err = AuthError::Throttled {
            retry_after_secs: 120,
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(120)));
        assert_eq!(AuthError::SessionInvalid.retry_after(), None);
        assert!(err.to_string().contains("120"));
    }

    #[test]
    fn test_weak_input_message_lists_every_rule() {
        let err = AuthError::WeakInput(vec![
            PolicyViolation::MissingDigit,
            PolicyViolation::MissingSymbol,
        ]);
        let message = err.to_string();
        assert!(message.contains("digit"));
        assert!(message.contains("symbol"));
    }
}
