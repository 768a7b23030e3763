//! Configuration for the credential layer
//!
//! Every component receives its own section at construction time; nothing
//! here is process-global. Files are TOML, missing files fall back to the
//! defaults, and a handful of settings can be overridden from the
//! environment.

use anyhow::{anyhow, Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_JWT_SECRET: &str = "GARAGE_AUTH_JWT_SECRET";
pub const ENV_BCRYPT_COST: &str = "GARAGE_AUTH_BCRYPT_COST";
pub const ENV_ACCESS_TTL_SECS: &str = "GARAGE_AUTH_ACCESS_TTL_SECS";
pub const ENV_SESSION_TTL_SECS: &str = "GARAGE_AUTH_SESSION_TTL_SECS";

/// Minimum length of the HMAC signing secret, in bytes
pub const MIN_SECRET_BYTES: usize = 32;

/// Work factor bounds accepted by bcrypt
pub const MIN_BCRYPT_COST: u32 = 4;
pub const MAX_BCRYPT_COST: u32 = 31;

/// Upper bound for every lifetime, window and retention setting (ten years)
pub const MAX_DURATION_SECS: u64 = 10 * 365 * 86_400;

/// Full configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Access token settings
    pub tokens: TokenSettings,
    /// Session handle settings
    pub sessions: SessionSettings,
    /// Password hashing settings
    pub passwords: PasswordSettings,
    /// Brute-force throttling settings
    pub throttle: ThrottleSettings,
    /// Credential store settings
    pub storage: StorageSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenSettings {
    /// HMAC secret used to sign access tokens
    pub signing_secret: Option<String>,
    /// `iss` claim written and required
    pub issuer: String,
    /// `aud` claim written and required
    pub audience: String,
    /// Access token lifetime in seconds
    pub access_ttl_secs: u64,
    /// Clock skew tolerated on `exp`, in seconds
    pub leeway_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Session handle lifetime in seconds
    pub ttl_secs: u64,
    /// Random bytes per handle before hex encoding
    pub handle_bytes: usize,
    /// Number of handle characters shown when listing sessions
    pub display_prefix_len: usize,
    /// How long revoked sessions are kept before the sweep deletes them
    pub revoked_retention_secs: u64,
    /// Interval of the background sweep
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordSettings {
    /// bcrypt work factor
    pub bcrypt_cost: u32,
    /// Shortest plaintext the hasher accepts
    pub min_hash_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleSettings {
    /// Trailing window for failed-attempt counting, in seconds
    pub window_secs: u64,
    /// Failed attempts per identity tolerated inside the window
    pub max_failures: usize,
    /// Attempts of any outcome tolerated per origin address inside the window
    pub max_origin_attempts: usize,
    /// Also key the identity counter by origin address
    pub key_by_origin: bool,
    /// Login attempts older than this are purged by the sweep
    pub attempt_retention_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// JSON snapshot used by the admin tool
    pub snapshot_path: PathBuf,
    /// Upper bound on every store call, in milliseconds
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Emit JSON lines instead of the compact format
    pub json: bool,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            signing_secret: None,
            issuer: "garage-backoffice".to_string(),
            audience: "garage-backoffice-app".to_string(),
            access_ttl_secs: 24 * 60 * 60,
            leeway_secs: 0,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ttl_secs: 7 * 24 * 60 * 60,
            handle_bytes: 64,
            display_prefix_len: 8,
            revoked_retention_secs: 24 * 60 * 60,
            sweep_interval_secs: 15 * 60,
        }
    }
}

impl Default for PasswordSettings {
    fn default() -> Self {
        Self {
            bcrypt_cost: 12,
            min_hash_length: 6,
        }
    }
}

impl Default for ThrottleSettings {
    fn default() -> Self {
        Self {
            window_secs: 15 * 60,
            max_failures: 5,
            max_origin_attempts: 30,
            key_by_origin: true,
            attempt_retention_secs: 30 * 24 * 60 * 60,
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from("./garage_auth_data/store.json"),
            timeout_ms: 5_000,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Values above the validated bound are clamped to it
fn seconds(secs: u64) -> Duration {
    Duration::seconds(secs.min(MAX_DURATION_SECS) as i64)
}

impl TokenSettings {
    pub fn access_ttl(&self) -> Duration {
        seconds(self.access_ttl_secs)
    }
}

impl SessionSettings {
    pub fn ttl(&self) -> Duration {
        seconds(self.ttl_secs)
    }

    pub fn revoked_retention(&self) -> Duration {
        seconds(self.revoked_retention_secs)
    }
}

impl ThrottleSettings {
    pub fn window(&self) -> Duration {
        seconds(self.window_secs)
    }

    pub fn attempt_retention(&self) -> Duration {
        seconds(self.attempt_retention_secs)
    }
}

impl StorageSettings {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }
}

impl AuthConfig {
    /// Load configuration from a TOML file, or defaults if it does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: AuthConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create config directory: {}", parent.display())
                })?;
            }
        }

        let content =
            toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Builder used by tests and embedders that do not read a file
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.tokens.signing_secret = Some(secret.into());
        self
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(secret) = lookup(ENV_JWT_SECRET) {
            self.tokens.signing_secret = Some(secret);
        }

        if let Some(cost) = lookup(ENV_BCRYPT_COST) {
            self.passwords.bcrypt_cost = cost
                .trim()
                .parse()
                .with_context(|| format!("{} must be an integer, got '{}'", ENV_BCRYPT_COST, cost))?;
        }

        if let Some(ttl) = lookup(ENV_ACCESS_TTL_SECS) {
            self.tokens.access_ttl_secs = ttl.trim().parse().with_context(|| {
                format!("{} must be a number of seconds, got '{}'", ENV_ACCESS_TTL_SECS, ttl)
            })?;
        }

        if let Some(ttl) = lookup(ENV_SESSION_TTL_SECS) {
            self.sessions.ttl_secs = ttl.trim().parse().with_context(|| {
                format!("{} must be a number of seconds, got '{}'", ENV_SESSION_TTL_SECS, ttl)
            })?;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        match &self.tokens.signing_secret {
            None => {
                return Err(anyhow!(
                    "Signing secret is required (set tokens.signing_secret or {})",
                    ENV_JWT_SECRET
                ))
            }
            Some(secret) if secret.len() < MIN_SECRET_BYTES => {
                return Err(anyhow!(
                    "Signing secret must be at least {} bytes",
                    MIN_SECRET_BYTES
                ))
            }
            Some(_) => {}
        }

        if self.tokens.issuer.trim().is_empty() || self.tokens.audience.trim().is_empty() {
            return Err(anyhow!("Token issuer and audience cannot be empty"));
        }

        if self.tokens.access_ttl_secs == 0 {
            return Err(anyhow!("Access token TTL cannot be 0"));
        }

        if self.sessions.ttl_secs == 0 {
            return Err(anyhow!("Session TTL cannot be 0"));
        }

        // 32 bytes of entropy is the floor for an unguessable handle
        if self.sessions.handle_bytes < 32 {
            return Err(anyhow!("Session handles need at least 32 random bytes"));
        }

        if self.sessions.display_prefix_len == 0
            || self.sessions.display_prefix_len >= self.sessions.handle_bytes * 2
        {
            return Err(anyhow!(
                "Display prefix length must be between 1 and the handle length"
            ));
        }

        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&self.passwords.bcrypt_cost) {
            return Err(anyhow!(
                "Password hash cost must be between {} and {}",
                MIN_BCRYPT_COST,
                MAX_BCRYPT_COST
            ));
        }

        if self.throttle.window_secs == 0 {
            return Err(anyhow!("Throttle window cannot be 0"));
        }

        if self.throttle.max_failures == 0 || self.throttle.max_origin_attempts == 0 {
            return Err(anyhow!("Throttle limits cannot be 0"));
        }

        let durations = [
            ("tokens.access_ttl_secs", self.tokens.access_ttl_secs),
            ("sessions.ttl_secs", self.sessions.ttl_secs),
            ("sessions.revoked_retention_secs", self.sessions.revoked_retention_secs),
            ("throttle.window_secs", self.throttle.window_secs),
            ("throttle.attempt_retention_secs", self.throttle.attempt_retention_secs),
        ];
        for (name, secs) in durations {
            if secs > MAX_DURATION_SECS {
                return Err(anyhow!(
                    "{} cannot exceed {} seconds, got {}",
                    name,
                    MAX_DURATION_SECS,
                    secs
                ));
            }
        }

        if self.storage.timeout_ms == 0 {
            return Err(anyhow!("Store timeout cannot be 0"));
        }

        Ok(())
    }
}
