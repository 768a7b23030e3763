//! User accounts and roles

use crate::error::{AuthError, AuthResult};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use uuid::Uuid;

/// Back-office role, ordered by privilege
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Workshop mechanic: reads orders, updates service orders
    Mechanic,
    /// Front-desk operator: clients, vehicles, orders and sales
    Operator,
    /// Workshop manager: everything except user administration
    Manager,
    /// Full administrative access
    Admin,
}

impl Role {
    /// Every role, lowest privilege first
    pub const ALL: [Role; 4] = [Role::Mechanic, Role::Operator, Role::Manager, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Operator => "operator",
            Role::Mechanic => "mechanic",
        }
    }

    /// Numeric privilege rank (higher is more privileged)
    pub fn rank(&self) -> u8 {
        match self {
            Role::Admin => 4,
            Role::Manager => 3,
            Role::Operator => 2,
            Role::Mechanic => 1,
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::Operator
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "operator" => Ok(Role::Operator),
            "mechanic" => Ok(Role::Mechanic),
            other => Err(AuthError::InvalidInput(vec![format!(
                "role must be one of admin, manager, operator, mechanic (got '{}')",
                other
            )])),
        }
    }
}

/// Stored user account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: Role,
    pub active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User as shown to callers, without the password hash
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserView {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Build a fresh account from validated input and a password hash
    pub fn new(input: NewUser, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: normalize_email(&input.email),
            name: input.name.trim().to_string(),
            password_hash,
            role: input.role,
            active: input.active,
            last_login: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn view(&self) -> UserView {
        UserView {
            id: self.id,
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.role,
            active: self.active,
            last_login: self.last_login,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Input for account creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl NewUser {
    pub fn new(email: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        Self {
            email: email.into(),
            name: name.into(),
            role,
            active: true,
        }
    }

    pub fn validate(&self) -> AuthResult<()> {
        let mut errors = Vec::new();
        check_email(&self.email, &mut errors);
        check_name(&self.name, &mut errors);
        into_result(errors)
    }
}

/// Administrative update; `None` leaves the field untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Option<Role>,
    pub active: Option<bool>,
}

/// Self-service profile update
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub email: Option<String>,
    pub name: Option<String>,
}

impl UserUpdate {
    /// Apply onto an account, validating the resulting fields
    pub fn apply(&self, user: &mut User) -> AuthResult<()> {
        let mut errors = Vec::new();
        if let Some(email) = &self.email {
            check_email(email, &mut errors);
        }
        if let Some(name) = &self.name {
            check_name(name, &mut errors);
        }
        into_result(errors)?;

        if let Some(email) = &self.email {
            user.email = normalize_email(email);
        }
        if let Some(name) = &self.name {
            user.name = name.trim().to_string();
        }
        if let Some(role) = self.role {
            user.role = role;
        }
        if let Some(active) = self.active {
            user.active = active;
        }
        user.updated_at = Utc::now();
        Ok(())
    }
}

impl From<ProfileUpdate> for UserUpdate {
    fn from(update: ProfileUpdate) -> Self {
        Self {
            email: update.email,
            name: update.name,
            role: None,
            active: None,
        }
    }
}

/// Filters for listing and counting users
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub active: Option<bool>,
    /// Case-insensitive substring of name or email
    pub search: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl UserFilter {
    pub fn matches(&self, user: &User) -> bool {
        if let Some(role) = self.role {
            if user.role != role {
                return false;
            }
        }
        if let Some(active) = self.active {
            if user.active != active {
                return false;
            }
        }
        if let Some(search) = &self.search {
            let needle = search.trim().to_lowercase();
            if !needle.is_empty()
                && !user.name.to_lowercase().contains(&needle)
                && !user.email.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        true
    }
}

/// Account counts for the administration overview
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    pub total: usize,
    pub active: usize,
    pub inactive: usize,
    pub by_role: BTreeMap<Role, usize>,
}

impl UserStats {
    /// Count one consistent listing of users
    pub fn tally<'a>(users: impl IntoIterator<Item = &'a User>) -> Self {
        let mut stats = Self::default();
        for role in Role::ALL {
            stats.by_role.insert(role, 0);
        }
        for user in users {
            stats.total += 1;
            if user.active {
                stats.active += 1;
            } else {
                stats.inactive += 1;
            }
            *stats.by_role.entry(user.role).or_default() += 1;
        }
        stats
    }
}

/// One page of a user listing with the number of matches before paging
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPage {
    pub users: Vec<UserView>,
    pub total: usize,
}

/// Lowercase and trim an email for storage and lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$")
            .unwrap_or_else(|e| panic!("email pattern is a valid regex: {}", e))
    })
}

fn check_email(email: &str, errors: &mut Vec<String>) {
    let email = email.trim();
    if email.is_empty() {
        errors.push("email is required".to_string());
    } else if !email_regex().is_match(email) {
        errors.push("email must be a valid address".to_string());
    }
}

fn check_name(name: &str, errors: &mut Vec<String>) {
    let name = name.trim();
    if name.is_empty() {
        errors.push("name is required".to_string());
    } else if name.chars().count() < 2 {
        errors.push("name must be at least 2 characters".to_string());
    }
}

fn into_result(errors: Vec<String>) -> AuthResult<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AuthError::InvalidInput(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User::new(
            NewUser::new("  Ana@Garage.Example ", "Ana Souza", Role::Mechanic),
            "hash".to_string(),
        )
    }

    #[test]
    fn test_role_ordering() {
        assert!(Role::Admin > Role::Manager);
        assert!(Role::Manager > Role::Operator);
        assert!(Role::Operator > Role::Mechanic);
        assert_eq!(Role::Admin.rank(), 4);
        assert_eq!(Role::Mechanic.rank(), 1);
    }

    #[test]
    fn test_role_string_conversion() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert!("superuser".parse::<Role>().is_err());
        assert_eq!(Role::default(), Role::Operator);
    }

    #[test]
    fn test_role_serde_lowercase() {
        let json = serde_json::to_string(&Role::Manager).unwrap();
        assert_eq!(json, "\"manager\"");
        let role: Role = serde_json::from_str("\"mechanic\"").unwrap();
        assert_eq!(role, Role::Mechanic);
    }

    #[test]
    fn test_new_user_normalizes_email() {
        let user = sample_user();
        assert_eq!(user.email, "ana@garage.example");
        assert!(user.active);
        assert!(user.last_login.is_none());
    }

    #[test]
    fn test_view_has_no_password_hash() {
        let user = sample_user();
        let json = serde_json::to_value(user.view()).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["email"], "ana@garage.example");
    }

    #[test]
    fn test_new_user_validation() {
        assert!(NewUser::new("ana@garage.example", "Ana", Role::Operator)
            .validate()
            .is_ok());

        let err = NewUser::new("not-an-email", "A", Role::Operator)
            .validate()
            .unwrap_err();
        match err {
            AuthError::InvalidInput(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_update_apply() {
        let mut user = sample_user();
        let update = UserUpdate {
            name: Some("  Ana S. ".to_string()),
            role: Some(Role::Manager),
            ..Default::default()
        };
        update.apply(&mut user).unwrap();
        assert_eq!(user.name, "Ana S.");
        assert_eq!(user.role, Role::Manager);
        assert_eq!(user.email, "ana@garage.example");

        let bad = UserUpdate {
            email: Some("broken".to_string()),
            ..Default::default()
        };
        assert!(bad.apply(&mut user).is_err());
        assert_eq!(user.email, "ana@garage.example");
    }

    #[test]
    fn test_filter_matches() {
        let user = sample_user();
        assert!(UserFilter::default().matches(&user));
        assert!(UserFilter {
            search: Some("SOUZA".to_string()),
            ..Default::default()
        }
        .matches(&user));
        assert!(!UserFilter {
            role: Some(Role::Admin),
            ..Default::default()
        }
        .matches(&user));
        assert!(!UserFilter {
            active: Some(false),
            ..Default::default()
        }
        .matches(&user));
    }
}
