//! Login attempt records and request origin details

use crate::user::normalize_email;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a request came from, as reported by the transport
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    /// Client IP address
    pub address: Option<String>,
    /// Client user agent
    pub agent: Option<String>,
}

impl ClientInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }
}

/// One login attempt, kept for throttling and auditing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginAttempt {
    /// Normalized email that was attempted
    pub email: String,
    pub success: bool,
    pub origin_address: Option<String>,
    pub origin_agent: Option<String>,
    pub attempted_at: DateTime<Utc>,
}

impl LoginAttempt {
    /// Failed attempt for an email, timestamped now
    pub fn failure(email: &str) -> Self {
        Self {
            email: normalize_email(email),
            success: false,
            origin_address: None,
            origin_agent: None,
            attempted_at: Utc::now(),
        }
    }

    /// Successful attempt for an email, timestamped now
    pub fn success(email: &str) -> Self {
        Self {
            success: true,
            ..Self::failure(email)
        }
    }

    pub fn with_client(mut self, client: &ClientInfo) -> Self {
        self.origin_address = client.address.clone();
        self.origin_agent = client.agent.clone();
        self
    }

    pub fn at(mut self, attempted_at: DateTime<Utc>) -> Self {
        self.attempted_at = attempted_at;
        self
    }

    /// Emit the attempt on the audit log target
    pub fn log(&self) {
        let address = self.origin_address.as_deref().unwrap_or("-");
        if self.success {
            tracing::info!(
                target: "audit",
                email = %self.email,
                address,
                "Login succeeded"
            );
        } else {
            tracing::warn!(
                target: "audit",
                email = %self.email,
                address,
                "Login failed"
            );
        }
    }
}

/// Query over recorded attempts in a trailing window
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptQuery {
    /// Restrict to one normalized email
    pub email: Option<String>,
    /// Restrict to one origin address
    pub origin_address: Option<String>,
    /// Count failures only
    pub failed_only: bool,
    /// Only attempts at or after this instant
    pub since: DateTime<Utc>,
}

impl AttemptQuery {
    pub fn matches(&self, attempt: &LoginAttempt) -> bool {
        if attempt.attempted_at < self.since {
            return false;
        }
        if self.failed_only && attempt.success {
            return false;
        }
        if let Some(email) = &self.email {
            if &attempt.email != email {
                return false;
            }
        }
        if let Some(address) = &self.origin_address {
            if attempt.origin_address.as_ref() != Some(address) {
                return false;
            }
        }
        true
    }
}
