//! `SeaORM` implementation of the `AdminService` trait.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::db::{Store, UserPatch, UserSummary};
use crate::domain::{Identity, UserId, now_timestamp};
use crate::services::admin_guard::AdminGuard;
use crate::services::admin_service::{AdminService, CredentialChange};
use crate::services::auth_service::AuthError;
use crate::services::password::PasswordHasher;
use crate::services::policy::require_admin;
use crate::services::recovery::{RecoveryRequest, RecoveryWorkflow};
use crate::services::validation::{non_empty, require_field, validate_username};

pub struct SeaOrmAdminService {
    store: Store,
    hasher: PasswordHasher,
    guard: AdminGuard,
    recovery: RecoveryWorkflow,
}

impl SeaOrmAdminService {
    #[must_use]
    pub const fn new(
        store: Store,
        hasher: PasswordHasher,
        guard: AdminGuard,
        recovery: RecoveryWorkflow,
    ) -> Self {
        Self {
            store,
            hasher,
            guard,
            recovery,
        }
    }
}

#[async_trait]
impl AdminService for SeaOrmAdminService {
    async fn create_user(
        &self,
        actor: &Identity,
        username: &str,
        password: &str,
    ) -> Result<UserId, AuthError> {
        require_admin(actor)?;
        validate_username(username)?;
        require_field(password, "password")?;

        let hash = self.hasher.hash(password).await?;

        let _section = self.guard.enter().await;
        let id = self.store.insert_user(username, &hash, false).await?;

        info!(user_id = %id, actor = %actor.user_id, "User created");
        Ok(id)
    }

    async fn reset_password(
        &self,
        actor: &Identity,
        user_id: UserId,
        new_password: &str,
        note: &str,
    ) -> Result<(), AuthError> {
        require_admin(actor)?;
        require_field(new_password, "new_password")?;

        let hash = self.hasher.hash(new_password).await?;

        let mut patch = RecoveryWorkflow::resolution(hash, note);
        patch.must_reset = Some(true);
        patch.password_changed_at = Some(now_timestamp());

        self.recovery.resolve(user_id, patch).await?;

        info!(user_id = %user_id, actor = %actor.user_id, "Password reset by admin");
        Ok(())
    }

    async fn change_admin_credentials(
        &self,
        actor: &Identity,
        current_password: &str,
        change: CredentialChange<'_>,
    ) -> Result<(), AuthError> {
        require_admin(actor)?;
        require_field(current_password, "current_password")?;

        let new_username = non_empty(change.new_username);
        let new_password = non_empty(change.new_password);

        if new_username.is_none() && new_password.is_none() {
            return Err(AuthError::validation(
                "either new_username or new_password is required",
            ));
        }

        let verified = self
            .store
            .find_user_by_id(actor.user_id)
            .await?
            .ok_or(AuthError::NotFound)?;

        if !self.hasher.verify(current_password, &verified.password_hash).await {
            warn!(user_id = %verified.id, "Credential change rejected: current password incorrect");
            return Err(AuthError::Unauthorized);
        }

        if let Some(name) = new_username {
            validate_username(name)?;
        }

        let new_hash = match new_password {
            Some(password) => Some(self.hasher.hash(password).await?),
            None => None,
        };

        let section = self.guard.enter().await;

        // Re-read under the lock; a password changed since verification voids it.
        let user = self
            .store
            .find_user_by_id(actor.user_id)
            .await?
            .ok_or(AuthError::NotFound)?;
        if user.password_hash != verified.password_hash {
            return Err(AuthError::Unauthorized);
        }

        let mut patch = UserPatch::default();

        if let Some(name) = new_username.filter(|n| *n != user.username) {
            if self.store.username_taken_by_other(name, user.id).await? {
                return Err(AuthError::Conflict);
            }
            if user.is_admin {
                self.guard.ensure_sole_admin(&section, user.id).await?;
            }
            patch.username = Some(name.to_string());
        }

        if let Some(hash) = new_hash {
            patch.password_hash = Some(hash);
            patch.password_changed_at = Some(now_timestamp());
            patch.must_reset = Some(false);
        }

        if patch.is_empty() {
            return Ok(());
        }

        let renamed = patch.username.is_some();
        let repassworded = patch.password_hash.is_some();
        self.store.update_user_fields(user.id, patch).await?;

        info!(user_id = %user.id, renamed, repassworded, "Admin credentials updated");
        Ok(())
    }

    async fn list_users(&self, actor: &Identity) -> Result<Vec<UserSummary>, AuthError> {
        require_admin(actor)?;

        let users = self.store.list_users().await?;
        Ok(users.into_iter().map(UserSummary::from).collect())
    }

    async fn list_pending_recovery(
        &self,
        actor: &Identity,
    ) -> Result<Vec<RecoveryRequest>, AuthError> {
        require_admin(actor)?;
        self.recovery.pending().await
    }
}
