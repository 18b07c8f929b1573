//! Domain service for authentication and self-service credential changes.
//!
//! Handles login, token-based identity, and a user's own password/username
//! changes. The error taxonomy defined here is shared by every service.

use serde::Serialize;
use thiserror::Error;

use crate::db::{StoreError, UserSummary};
use crate::domain::Identity;

/// Outcomes every credential operation can fail with.
///
/// `Unauthorized` is intentionally coarse: unknown user, wrong password,
/// missing/expired/forged token and missing admin flag at login all map to it.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authentication failed")]
    Unauthorized,

    #[error("Admin privileges required")]
    Forbidden,

    #[error("User not found")]
    NotFound,

    #[error("Username already taken")]
    Conflict,

    #[error("Operation would leave more than one administrator")]
    AdminConflict,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateUsername => Self::Conflict,
            StoreError::SecondAdmin => Self::AdminConflict,
            StoreError::NotFound(_) => Self::NotFound,
            StoreError::Db(e) => Self::Database(e.to_string()),
        }
    }
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Successful login: a bearer token plus whether the user has to change
/// their password before doing anything else.
#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    pub token: String,
    pub must_reset: bool,
    pub user: UserSummary,
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Verifies credentials and issues a session token.
    ///
    /// With `require_admin`, a valid non-admin login is refused the same way
    /// a wrong password is.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Unauthorized`] for every credential failure.
    /// Returns [`AuthError::Validation`] if username or password is empty.
    async fn login(
        &self,
        username: &str,
        password: &str,
        require_admin: bool,
    ) -> Result<LoginOutcome, AuthError>;

    /// Resolves a bearer token into the identity it was issued for.
    fn get_identity(&self, token: &str) -> Result<Identity, AuthError>;

    /// Changes the caller's own password after re-checking the old one.
    /// Clears `must_reset`.
    async fn change_own_password(
        &self,
        identity: &Identity,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError>;

    /// Renames the caller. Admin only; goes through the admin guard.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Conflict`] if another record owns `new_username`,
    /// [`AuthError::AdminConflict`] if a second admin record exists.
    async fn change_own_username(
        &self,
        identity: &Identity,
        new_username: &str,
        password: &str,
    ) -> Result<(), AuthError>;
}
