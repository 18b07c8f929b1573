//! First-run initialisation: make sure the administrator account exists.

use tracing::{info, warn};

use super::AuthError;
use super::admin_guard::AdminGuard;
use super::password::PasswordHasher;
use crate::config::AuthConfig;
use crate::db::{Store, UserPatch};
use crate::domain::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    Created(UserId),
    AlreadyPresent,
}

/// Creates the default admin from `[auth]` when no admin exists; otherwise
/// does nothing. Safe to call on every startup and from concurrent callers.
pub async fn bootstrap(
    store: &Store,
    hasher: &PasswordHasher,
    guard: &AdminGuard,
    config: &AuthConfig,
) -> Result<BootstrapOutcome, AuthError> {
    if guard.admin_exists().await? {
        return Ok(BootstrapOutcome::AlreadyPresent);
    }

    let hash = hasher.hash(&config.bootstrap_password).await?;

    let id = match guard.create_admin(&config.bootstrap_username, &hash).await {
        Ok(id) => id,
        // Lost the race to another bootstrap; the invariant holds either way.
        Err(AuthError::AdminConflict) => return Ok(BootstrapOutcome::AlreadyPresent),
        Err(e) => return Err(e),
    };

    if config.bootstrap_must_reset {
        let patch = UserPatch {
            must_reset: Some(true),
            ..UserPatch::default()
        };
        store.update_user_fields(id, patch).await?;
    }

    info!(
        username = %config.bootstrap_username,
        "Default administrator created"
    );
    warn!("Change the default administrator credentials after first login");

    Ok(BootstrapOutcome::Created(id))
}
