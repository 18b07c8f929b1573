//! Domain service for privileged operations.
//!
//! Every method takes the acting [`Identity`] and starts with the admin role
//! check; a valid non-admin identity gets [`AuthError::Forbidden`].

use crate::db::UserSummary;
use crate::domain::{Identity, UserId};
use crate::services::AuthError;
use crate::services::recovery::RecoveryRequest;

/// Requested changes to the acting admin's own credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct CredentialChange<'a> {
    pub new_username: Option<&'a str>,
    pub new_password: Option<&'a str>,
}

#[async_trait::async_trait]
pub trait AdminService: Send + Sync {
    /// Creates a non-admin user.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Conflict`] if the username is taken.
    async fn create_user(
        &self,
        actor: &Identity,
        username: &str,
        password: &str,
    ) -> Result<UserId, AuthError>;

    /// Sets a new password for any user, resolves their recovery request,
    /// stores `note`, and forces a password change on their next login.
    async fn reset_password(
        &self,
        actor: &Identity,
        user_id: UserId,
        new_password: &str,
        note: &str,
    ) -> Result<(), AuthError>;

    /// Changes the acting admin's username and/or password after verifying
    /// `current_password`. Both parts are validated first and committed in
    /// one write, so either both apply or neither does.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Unauthorized`] if `current_password` is wrong.
    /// Returns [`AuthError::Conflict`] if the new username is taken.
    /// Returns [`AuthError::AdminConflict`] if another admin record exists.
    async fn change_admin_credentials(
        &self,
        actor: &Identity,
        current_password: &str,
        change: CredentialChange<'_>,
    ) -> Result<(), AuthError>;

    /// All users ordered by id, without password hashes.
    async fn list_users(&self, actor: &Identity) -> Result<Vec<UserSummary>, AuthError>;

    /// Pending recovery requests, most recent first.
    async fn list_pending_recovery(
        &self,
        actor: &Identity,
    ) -> Result<Vec<RecoveryRequest>, AuthError>;
}
