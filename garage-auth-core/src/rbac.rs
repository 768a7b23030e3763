//! Role-Based Access Control for the back office
//!
//! Permissions are `resource:action` strings. Each role has an explicit
//! literal list; roles do not inherit from each other.

use crate::error::{AuthError, AuthResult};
use crate::user::Role;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

const ADMIN_PERMISSIONS: &[&str] = &[
    "users:create",
    "users:read",
    "users:update",
    "users:delete",
    "clients:create",
    "clients:read",
    "clients:update",
    "clients:delete",
    "suppliers:create",
    "suppliers:read",
    "suppliers:update",
    "suppliers:delete",
    "mechanics:create",
    "mechanics:read",
    "mechanics:update",
    "mechanics:delete",
    "vehicles:create",
    "vehicles:read",
    "vehicles:update",
    "vehicles:delete",
    "products:create",
    "products:read",
    "products:update",
    "products:delete",
    "service_orders:create",
    "service_orders:read",
    "service_orders:update",
    "service_orders:delete",
    "sales:create",
    "sales:read",
    "sales:update",
    "sales:delete",
    "inventory:create",
    "inventory:read",
    "inventory:update",
    "inventory:delete",
    "financial:create",
    "financial:read",
    "financial:update",
    "financial:delete",
    "reports:read",
    "config:read",
    "config:update",
];

const MANAGER_PERMISSIONS: &[&str] = &[
    "clients:create",
    "clients:read",
    "clients:update",
    "clients:delete",
    "suppliers:create",
    "suppliers:read",
    "suppliers:update",
    "suppliers:delete",
    "mechanics:read",
    "mechanics:update",
    "vehicles:create",
    "vehicles:read",
    "vehicles:update",
    "vehicles:delete",
    "products:create",
    "products:read",
    "products:update",
    "products:delete",
    "service_orders:create",
    "service_orders:read",
    "service_orders:update",
    "service_orders:delete",
    "sales:create",
    "sales:read",
    "sales:update",
    "sales:delete",
    "inventory:create",
    "inventory:read",
    "inventory:update",
    "financial:create",
    "financial:read",
    "financial:update",
    "reports:read",
];

const OPERATOR_PERMISSIONS: &[&str] = &[
    "clients:create",
    "clients:read",
    "clients:update",
    "vehicles:create",
    "vehicles:read",
    "vehicles:update",
    "products:read",
    "service_orders:create",
    "service_orders:read",
    "service_orders:update",
    "sales:create",
    "sales:read",
    "sales:update",
    "inventory:read",
];

const MECHANIC_PERMISSIONS: &[&str] = &[
    "clients:read",
    "vehicles:read",
    "products:read",
    "service_orders:read",
    "service_orders:update",
];

/// The literal permission table for a role
pub fn permissions_for(role: Role) -> &'static [&'static str] {
    match role {
        Role::Admin => ADMIN_PERMISSIONS,
        Role::Manager => MANAGER_PERMISSIONS,
        Role::Operator => OPERATOR_PERMISSIONS,
        Role::Mechanic => MECHANIC_PERMISSIONS,
    }
}

/// Ordered permission set of a role, recomputed on every call
pub fn derive_permissions(role: Role) -> BTreeSet<String> {
    permissions_for(role).iter().map(|p| p.to_string()).collect()
}

/// True when `actual` ranks at least as high as `required`
pub fn role_satisfies(actual: Role, required: Role) -> bool {
    actual.rank() >= required.rank()
}

pub fn has_permission(role: Role, permission: &str) -> bool {
    permissions_for(role).contains(&permission)
}

/// Entry of the role catalog shown to administrators
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleInfo {
    pub value: Role,
    pub label: &'static str,
    pub description: &'static str,
}

/// Roles available for assignment, highest privilege first
pub fn role_catalog() -> Vec<RoleInfo> {
    vec![
        RoleInfo {
            value: Role::Admin,
            label: "Administrator",
            description: "Full access to the system, including user management",
        },
        RoleInfo {
            value: Role::Manager,
            label: "Manager",
            description: "Manages the workshop, reports and finances",
        },
        RoleInfo {
            value: Role::Operator,
            label: "Operator",
            description: "Handles clients, vehicles, service orders and sales",
        },
        RoleInfo {
            value: Role::Mechanic,
            label: "Mechanic",
            description: "Views and updates assigned service orders",
        },
    ]
}

/// An authenticated caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub permissions: BTreeSet<String>,
}

impl Principal {
    /// Principal for a role, with permissions taken from the table
    pub fn new(user_id: Uuid, email: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        Self {
            user_id,
            email: email.into(),
            name: name.into(),
            role,
            permissions: derive_permissions(role),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn can(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    pub fn require_role(&self, required: Role) -> AuthResult<()> {
        if role_satisfies(self.role, required) {
            Ok(())
        } else {
            tracing::info!(
                target: "audit",
                user_id = %self.user_id,
                role = %self.role,
                required = %required,
                "Authorization denied"
            );
            Err(AuthError::forbidden(format!("role {} or higher required", required)))
        }
    }

    pub fn require_any_role(&self, allowed: &[Role]) -> AuthResult<()> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            let names = allowed
                .iter()
                .map(|r| r.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            Err(AuthError::forbidden(format!("one of roles [{}] required", names)))
        }
    }

    pub fn require_permission(&self, permission: &str) -> AuthResult<()> {
        if self.can(permission) {
            Ok(())
        } else {
            tracing::info!(
                target: "audit",
                user_id = %self.user_id,
                role = %self.role,
                permission,
                "Authorization denied"
            );
            Err(AuthError::forbidden(format!("permission {} required", permission)))
        }
    }
}
