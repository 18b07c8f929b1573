//! Role checks invoked at the top of privileged operations.

use super::AuthError;
use crate::domain::Identity;

/// Passes only for an identity carrying the admin role.
pub const fn require_admin(identity: &Identity) -> Result<(), AuthError> {
    if identity.is_admin {
        Ok(())
    } else {
        Err(AuthError::Forbidden)
    }
}
