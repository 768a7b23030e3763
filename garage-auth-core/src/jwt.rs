//! Access token signing/verification (HS256) and session handle generation

use crate::config::TokenSettings;
use crate::error::{AuthError, AuthResult};
use crate::rbac::derive_permissions;
use crate::user::{Role, User};
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Claims carried by an access token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (user id)
    pub sub: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    /// Permissions of the role when the token was issued
    pub permissions: Vec<String>,
    /// Issued at (timestamp)
    pub iat: i64,
    /// Expiration time (timestamp)
    pub exp: i64,
    /// Unique token identifier
    pub jti: String,
    pub iss: String,
    pub aud: String,
}

impl AccessClaims {
    pub fn user_id(&self) -> AuthResult<Uuid> {
        Uuid::parse_str(&self.sub).map_err(|_| AuthError::TokenInvalid)
    }
}

/// Signs and verifies access tokens, mints session handles
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
    access_ttl: Duration,
    handle_bytes: usize,
}

impl JwtService {
    pub fn new(settings: &TokenSettings, handle_bytes: usize) -> AuthResult<Self> {
        let secret = settings
            .signing_secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AuthError::Configuration("signing secret is not set".to_string()))?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[settings.issuer.as_str()]);
        validation.set_audience(&[settings.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.leeway = settings.leeway_secs;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            issuer: settings.issuer.clone(),
            audience: settings.audience.clone(),
            access_ttl: settings.access_ttl(),
            handle_bytes,
        })
    }

    /// Access token lifetime
    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    /// Issue a signed access token for a user
    pub fn issue_access_token(&self, user: &User) -> AuthResult<String> {
        let now = Utc::now();
        let expiration = now + self.access_ttl;

        let claims = AccessClaims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            permissions: derive_permissions(user.role).into_iter().collect(),
            iat: now.timestamp(),
            exp: expiration.timestamp(),
            jti: Uuid::new_v4().to_string(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("Failed to sign access token: {}", e)))?;

        tracing::debug!(user_id = %user.id, expires_at = %expiration, "Issued access token");
        Ok(token)
    }

    /// Verify an access token and return its claims
    pub fn verify_access_token(&self, token: &str) -> AuthResult<AccessClaims> {
        decode::<AccessClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                ErrorKind::InvalidSignature
                | ErrorKind::InvalidIssuer
                | ErrorKind::InvalidAudience
                | ErrorKind::InvalidAlgorithm
                | ErrorKind::ImmatureSignature => AuthError::TokenInvalid,
                _ => AuthError::TokenMalformed,
            })
    }

    /// Generate a new opaque session handle from the OS random source
    pub fn issue_session_handle(&self) -> String {
        let mut bytes = vec![0u8; self.handle_bytes];
        OsRng.fill_bytes(&mut bytes);
        hex::encode(bytes)
    }
}
