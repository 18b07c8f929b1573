//! Single-administrator invariant.
//!
//! At most one record carries `is_admin = true`, and bootstrap makes sure one
//! exists. Every operation that creates an admin or touches the current
//! admin's credentials runs its check and its write inside one
//! [`CriticalSection`]; the table's `users_single_admin` partial unique index
//! rejects anything that slips past at the row level.

use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

use super::AuthError;
use crate::db::Store;
use crate::domain::UserId;

/// Proof that the caller holds the identity-mutation lock. Dropping it
/// releases the lock, whichever way the operation exits.
pub struct CriticalSection<'a> {
    _guard: MutexGuard<'a, ()>,
}

#[derive(Clone)]
pub struct AdminGuard {
    store: Store,
    lock: Arc<Mutex<()>>,
}

impl AdminGuard {
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self {
            store,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Serialises identity-mutating read-modify-write sequences.
    pub async fn enter(&self) -> CriticalSection<'_> {
        CriticalSection {
            _guard: self.lock.lock().await,
        }
    }

    /// Refuses with [`AuthError::AdminConflict`] if any admin other than
    /// `actor` exists. Must be called inside a [`CriticalSection`].
    pub async fn ensure_sole_admin(
        &self,
        _section: &CriticalSection<'_>,
        actor: UserId,
    ) -> Result<(), AuthError> {
        let others = self.store.count_admins_excluding(Some(actor)).await?;
        if others > 0 {
            warn!(user_id = %actor, others, "Refusing change: another administrator exists");
            return Err(AuthError::AdminConflict);
        }
        Ok(())
    }

    /// The only way an admin row comes into existence. Exactly one of any
    /// number of concurrent callers can succeed; the rest get
    /// [`AuthError::AdminConflict`].
    pub async fn create_admin(&self, username: &str, password_hash: &str) -> Result<UserId, AuthError> {
        let _section = self.enter().await;

        if self.store.count_admins_excluding(None).await? > 0 {
            return Err(AuthError::AdminConflict);
        }

        let id = self.store.insert_user(username, password_hash, true).await?;
        info!(user_id = %id, "Administrator account created");
        Ok(id)
    }

    /// Whether an admin record currently exists.
    pub async fn admin_exists(&self) -> Result<bool, AuthError> {
        Ok(self.store.count_admins_excluding(None).await? > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn guard() -> AdminGuard {
        AdminGuard::new(Store::new("sqlite::memory:").await.unwrap())
    }

    #[tokio::test]
    async fn second_admin_is_refused() {
        let guard = guard().await;
        assert!(!guard.admin_exists().await.unwrap());

        guard.create_admin("admin", "h").await.unwrap();
        let err = guard.create_admin("root", "h").await.unwrap_err();
        assert!(matches!(err, AuthError::AdminConflict));
        assert!(guard.admin_exists().await.unwrap());
    }

    #[tokio::test]
    async fn sole_admin_passes_its_own_check() {
        let guard = guard().await;
        let id = guard.create_admin("admin", "h").await.unwrap();

        let section = guard.enter().await;
        assert!(guard.ensure_sole_admin(&section, id).await.is_ok());
    }

    #[tokio::test]
    async fn check_fails_for_a_non_admin_actor_when_an_admin_exists() {
        let guard = guard().await;
        guard.create_admin("admin", "h").await.unwrap();
        let user = guard.store.insert_user("alice", "h", false).await.unwrap();

        let section = guard.enter().await;
        let err = guard.ensure_sole_admin(&section, user).await.unwrap_err();
        assert!(matches!(err, AuthError::AdminConflict));
    }

    #[tokio::test]
    async fn concurrent_admin_creation_has_one_winner() {
        let guard = guard().await;

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let guard = guard.clone();
                tokio::spawn(async move { guard.create_admin(&format!("admin{i}"), "h").await })
            })
            .collect();

        let mut winners = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => winners += 1,
                Err(AuthError::AdminConflict) => conflicts += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        assert_eq!(winners, 1);
        assert_eq!(conflicts, 7);
        assert_eq!(guard.store.count_admins_excluding(None).await.unwrap(), 1);
    }
}
