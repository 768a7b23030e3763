//! Account administration and self-service operations

use crate::error::{AuthError, AuthResult};
use crate::password::ensure_strong;
use crate::rbac::Principal;
use crate::service::AuthService;
use crate::user::{
    normalize_email, NewUser, ProfileUpdate, Role, User, UserFilter, UserPage, UserStats, UserUpdate,
    UserView,
};
use chrono::Utc;
use uuid::Uuid;

impl AuthService {
    async fn load_user(&self, user_id: Uuid) -> AuthResult<User> {
        self.store
            .find_user_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// The caller's own account
    pub async fn profile(&self, user_id: Uuid) -> AuthResult<UserView> {
        Ok(self.load_user(user_id).await?.view())
    }

    /// Change the caller's own name or email
    pub async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> AuthResult<UserView> {
        let mut user = self.load_user(user_id).await?;
        UserUpdate::from(update).apply(&mut user)?;
        self.store.update_user(user.clone()).await?;

        tracing::info!(user_id = %user.id, "Profile updated");
        Ok(user.view())
    }

    /// Self-service password change; every session of the user is revoked
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> AuthResult<()> {
        let mut user = self.load_user(user_id).await?;
        if !self
            .hasher
            .verify(current_password, Some(user.password_hash.as_str()))
            .await
        {
            tracing::info!(target: "audit", user_id = %user_id, "Password change with wrong current password");
            return Err(AuthError::InvalidCredentials);
        }
        ensure_strong(new_password)?;

        user.password_hash = self.hasher.hash(new_password).await?;
        user.updated_at = Utc::now();
        self.store.update_user(user).await?;
        self.sessions.revoke_all_sessions(user_id).await?;

        tracing::info!(target: "audit", user_id = %user_id, "Password changed");
        Ok(())
    }

    /// Administrator password reset; every session of the target is revoked
    pub async fn reset_password(
        &self,
        actor: &Principal,
        user_id: Uuid,
        new_password: &str,
    ) -> AuthResult<()> {
        if !actor.is_admin() {
            return Err(AuthError::forbidden("only administrators can reset passwords"));
        }
        ensure_strong(new_password)?;

        let mut user = self.load_user(user_id).await?;
        user.password_hash = self.hasher.hash(new_password).await?;
        user.updated_at = Utc::now();
        self.store.update_user(user).await?;
        self.sessions.revoke_all_sessions(user_id).await?;

        tracing::info!(
            target: "audit",
            actor = %actor.user_id,
            user_id = %user_id,
            "Password reset by administrator"
        );
        Ok(())
    }

    pub async fn create_user(
        &self,
        actor: &Principal,
        input: NewUser,
        password: &str,
    ) -> AuthResult<UserView> {
        actor.require_permission("users:create")?;
        self.insert_new_user(input, password).await.map(|user| {
            tracing::info!(
                target: "audit",
                actor = %actor.user_id,
                user_id = %user.id,
                role = %user.role,
                "User created"
            );
            user.view()
        })
    }

    async fn insert_new_user(&self, input: NewUser, password: &str) -> AuthResult<User> {
        input.validate()?;
        ensure_strong(password)?;

        if self
            .store
            .find_user_by_email(&normalize_email(&input.email))
            .await?
            .is_some()
        {
            return Err(AuthError::EmailTaken);
        }

        let hash = self.hasher.hash(password).await?;
        let user = User::new(input, hash);
        self.store.insert_user(user.clone()).await?;
        Ok(user)
    }

    pub async fn update_user(
        &self,
        actor: &Principal,
        user_id: Uuid,
        update: UserUpdate,
    ) -> AuthResult<UserView> {
        actor.require_permission("users:update")?;

        let is_self = actor.user_id == user_id;
        if is_self && !actor.is_admin() && update.role.is_some() {
            return Err(AuthError::forbidden("you cannot change your own role"));
        }
        if is_self && update.active == Some(false) {
            return Err(AuthError::forbidden("you cannot deactivate your own account"));
        }

        let mut user = self.load_user(user_id).await?;
        let was_active = user.active;
        update.apply(&mut user)?;
        self.store.update_user(user.clone()).await?;

        if was_active && !user.active {
            self.sessions.revoke_all_sessions(user_id).await?;
        }

        tracing::info!(target: "audit", actor = %actor.user_id, user_id = %user_id, "User updated");
        Ok(user.view())
    }

    /// Deactivate an account and end all its sessions
    pub async fn deactivate_user(&self, actor: &Principal, user_id: Uuid) -> AuthResult<UserView> {
        self.update_user(
            actor,
            user_id,
            UserUpdate {
                active: Some(false),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn activate_user(&self, actor: &Principal, user_id: Uuid) -> AuthResult<UserView> {
        self.update_user(
            actor,
            user_id,
            UserUpdate {
                active: Some(true),
                ..Default::default()
            },
        )
        .await
    }

    /// Any account for holders of `users:read`, otherwise only one's own
    pub async fn get_user(&self, actor: &Principal, user_id: Uuid) -> AuthResult<UserView> {
        if actor.user_id != user_id {
            actor.require_permission("users:read")?;
        }
        Ok(self.load_user(user_id).await?.view())
    }

    pub async fn find_user_by_email(&self, actor: &Principal, email: &str) -> AuthResult<UserView> {
        let user = self
            .store
            .find_user_by_email(&normalize_email(email))
            .await?
            .ok_or(AuthError::UserNotFound)?;
        if actor.user_id != user.id {
            actor.require_permission("users:read")?;
        }
        Ok(user.view())
    }

    pub async fn list_users(&self, actor: &Principal, filter: &UserFilter) -> AuthResult<UserPage> {
        actor.require_role(Role::Manager)?;
        let users = self.store.list_users(filter).await?;
        let total = self.store.count_users(filter).await?;
        Ok(UserPage {
            users: users.iter().map(User::view).collect(),
            total,
        })
    }

    pub async fn user_stats(&self, actor: &Principal) -> AuthResult<UserStats> {
        actor.require_role(Role::Manager)?;
        let users = self.store.list_users(&UserFilter::default()).await?;
        Ok(UserStats::tally(&users))
    }

    /// Create the first administrator when the store has no users at all.
    ///
    /// Returns `None` when any account already exists.
    pub async fn ensure_default_admin(
        &self,
        email: &str,
        name: &str,
        password: &str,
    ) -> AuthResult<Option<UserView>> {
        if self.store.count_users(&UserFilter::default()).await? > 0 {
            tracing::debug!("Users exist, skipping default administrator");
            return Ok(None);
        }

        let user = self
            .insert_new_user(NewUser::new(email, name, Role::Admin), password)
            .await?;
        tracing::info!(target: "audit", user_id = %user.id, email = %user.email, "Created default administrator");
        Ok(Some(user.view()))
    }
}
