//! Password hashing (bcrypt) and password strength policy

use crate::config::PasswordSettings;
use crate::error::{AuthError, AuthResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::OnceCell;

/// Minimum length enforced by the strength policy
pub const POLICY_MIN_LENGTH: usize = 8;

/// A single failed strength rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "rule")]
pub enum PolicyViolation {
    TooShort { min: usize },
    MissingLowercase,
    MissingUppercase,
    MissingDigit,
    MissingSymbol,
}

impl fmt::Display for PolicyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyViolation::TooShort { min } => {
                write!(f, "password must be at least {} characters long", min)
            }
            PolicyViolation::MissingLowercase => {
                write!(f, "password must contain a lowercase letter")
            }
            PolicyViolation::MissingUppercase => {
                write!(f, "password must contain an uppercase letter")
            }
            PolicyViolation::MissingDigit => write!(f, "password must contain a digit"),
            PolicyViolation::MissingSymbol => write!(f, "password must contain a symbol"),
        }
    }
}

/// Check a candidate password against every strength rule.
///
/// Rules are evaluated independently so the caller gets the full list at
/// once; an empty vector means the password is acceptable.
pub fn validate_strength(plaintext: &str) -> Vec<PolicyViolation> {
    let mut violations = Vec::new();

    if plaintext.chars().count() < POLICY_MIN_LENGTH {
        violations.push(PolicyViolation::TooShort {
            min: POLICY_MIN_LENGTH,
        });
    }
    if !plaintext.chars().any(|c| c.is_lowercase()) {
        violations.push(PolicyViolation::MissingLowercase);
    }
    if !plaintext.chars().any(|c| c.is_uppercase()) {
        violations.push(PolicyViolation::MissingUppercase);
    }
    if !plaintext.chars().any(|c| c.is_ascii_digit()) {
        violations.push(PolicyViolation::MissingDigit);
    }
    if !plaintext.chars().any(|c| c.is_ascii_punctuation()) {
        violations.push(PolicyViolation::MissingSymbol);
    }

    violations
}

/// Reject a password that fails the strength policy
pub fn ensure_strong(plaintext: &str) -> AuthResult<()> {
    let violations = validate_strength(plaintext);
    if violations.is_empty() {
        Ok(())
    } else {
        Err(AuthError::WeakInput(violations))
    }
}

/// bcrypt hasher with a configurable work factor.
///
/// All bcrypt work runs on the blocking pool.
pub struct PasswordHasher {
    cost: u32,
    min_length: usize,
    dummy_hash: OnceCell<String>,
}

impl PasswordHasher {
    pub fn new(settings: &PasswordSettings) -> Self {
        Self {
            cost: settings.bcrypt_cost,
            min_length: settings.min_hash_length,
            dummy_hash: OnceCell::new(),
        }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Hash a plaintext password
    pub async fn hash(&self, plaintext: &str) -> AuthResult<String> {
        if plaintext.chars().count() < self.min_length {
            return Err(AuthError::WeakInput(vec![PolicyViolation::TooShort {
                min: self.min_length,
            }]));
        }

        let cost = self.cost;
        let plaintext = plaintext.to_owned();
        tokio::task::spawn_blocking(move || bcrypt::hash(plaintext, cost))
            .await?
            .map_err(|e| AuthError::Internal(format!("Failed to hash password: {}", e)))
    }

    /// Verify a candidate against a stored hash; false when no hash is stored
    pub async fn verify(&self, plaintext: &str, hash: Option<&str>) -> bool {
        let hash = match hash {
            Some(h) if !h.is_empty() => h.to_owned(),
            _ => return false,
        };

        let plaintext = plaintext.to_owned();
        match tokio::task::spawn_blocking(move || bcrypt::verify(plaintext, &hash)).await {
            Ok(Ok(matches)) => matches,
            Ok(Err(e)) => {
                tracing::warn!("Stored password hash could not be verified: {}", e);
                false
            }
            Err(e) => {
                tracing::error!("Password verification task failed: {}", e);
                false
            }
        }
    }

    /// Spend the same bcrypt effort as a real verification.
    ///
    /// Used when the account does not exist so that timing does not reveal it.
    pub async fn verify_dummy(&self, plaintext: &str) {
        let cost = self.cost;
        let dummy = self
            .dummy_hash
            .get_or_try_init(|| async move {
                tokio::task::spawn_blocking(move || bcrypt::hash("garage-auth-dummy", cost))
                    .await
                    .map_err(AuthError::from)?
                    .map_err(|e| AuthError::Internal(e.to_string()))
            })
            .await;

        if let Ok(hash) = dummy {
            let _ = self.verify(plaintext, Some(hash.as_str())).await;
        }
    }
}
