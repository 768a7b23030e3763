//! Garage Auth Core - credential, session and permission layer
//!
//! This crate provides the authentication components of the garage back
//! office:
//! - Password hashing and strength policy
//! - Signed access tokens and rotating session handles
//! - Brute-force throttling of login attempts
//! - Role/permission checks
//! - The `CredentialStore` boundary with an in-memory implementation

pub mod accounts;
pub mod audit;
pub mod config;
pub mod error;
pub mod guard;
pub mod jwt;
pub mod logging;
pub mod password;
pub mod rbac;
pub mod service;
pub mod session;
pub mod store;
pub mod sweeper;
pub mod user;

pub use audit::{AttemptQuery, ClientInfo, LoginAttempt};
pub use config::AuthConfig;
pub use error::{AuthError, AuthResult, StoreError, StoreResult};
pub use guard::BruteForceGuard;
pub use jwt::{AccessClaims, JwtService};
pub use logging::init_logging;
pub use password::{ensure_strong, validate_strength, PasswordHasher, PolicyViolation};
pub use rbac::{
    derive_permissions, has_permission, role_catalog, role_satisfies, Principal, RoleInfo,
};
pub use service::{AuthService, LoginOutcome};
pub use session::{IssuedSession, SessionRecord, SessionRegistry, SessionSummary, SweepReport};
pub use store::{CredentialStore, MemoryStore, SessionPurge, TimedStore};
pub use sweeper::spawn_sweeper;
pub use user::{
    NewUser, ProfileUpdate, Role, User, UserFilter, UserPage, UserStats, UserUpdate, UserView,
};
