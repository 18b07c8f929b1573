//! Forgot-password workflow.
//!
//! A user files a request by username; an administrator resolves it by
//! setting a new password out-of-band. There is no expiry: a pending request
//! stays pending until an admin acts.

use serde::Serialize;
use tracing::{debug, info};

use super::AuthError;
use super::validation::validate_username;
use crate::db::{Store, UserPatch, UserRecord};
use crate::domain::{RecoveryStatus, UserId, now_timestamp};

/// One pending request as shown to an administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoveryRequest {
    pub user_id: UserId,
    pub username: String,
    pub requested_at: Option<String>,
    pub status: RecoveryStatus,
    pub admin_note: Option<String>,
}

impl From<UserRecord> for RecoveryRequest {
    fn from(record: UserRecord) -> Self {
        Self {
            user_id: record.id,
            username: record.username,
            requested_at: record.recovery_requested_at,
            status: record.recovery_status,
            admin_note: record.admin_note,
        }
    }
}

#[derive(Clone)]
pub struct RecoveryWorkflow {
    store: Store,
}

impl RecoveryWorkflow {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    /// Moves the named user to `pending` from any state, stamping the request
    /// time. An unknown username succeeds without touching anything, so the
    /// reply never reveals whether an account exists.
    pub async fn request(&self, username: &str) -> Result<(), AuthError> {
        validate_username(username)?;

        metrics::counter!("keyward_recovery_requests_total").increment(1);

        let Some(user) = self.store.find_user_by_username(username).await? else {
            debug!("Recovery requested for unknown username");
            return Ok(());
        };

        let patch = UserPatch {
            recovery_status: Some(RecoveryStatus::Pending),
            recovery_requested_at: Some(now_timestamp()),
            ..UserPatch::default()
        };
        self.store.update_user_fields(user.id, patch).await?;

        info!(user_id = %user.id, "Password recovery requested");
        Ok(())
    }

    /// Fields written when an admin resolves a request: the new hash, the
    /// note, and the `resolved` status. Callers may add to the patch before
    /// committing it as one write.
    #[must_use]
    pub fn resolution(password_hash: String, admin_note: &str) -> UserPatch {
        UserPatch {
            password_hash: Some(password_hash),
            recovery_status: Some(RecoveryStatus::Resolved),
            admin_note: Some(admin_note.to_string()),
            ..UserPatch::default()
        }
    }

    /// `pending -> resolved` for `user_id`.
    pub async fn resolve(&self, user_id: UserId, patch: UserPatch) -> Result<(), AuthError> {
        self.store.update_user_fields(user_id, patch).await?;
        info!(user_id = %user_id, "Password recovery resolved");
        Ok(())
    }

    /// Pending requests only, most recent first.
    pub async fn pending(&self) -> Result<Vec<RecoveryRequest>, AuthError> {
        let rows = self.store.list_pending_recovery().await?;
        Ok(rows.into_iter().map(RecoveryRequest::from).collect())
    }
}
