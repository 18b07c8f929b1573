//! `SeaORM` implementation of the `AuthService` trait.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::db::{Store, UserPatch, UserRecord, UserSummary};
use crate::domain::{Identity, now_timestamp};
use crate::services::admin_guard::AdminGuard;
use crate::services::auth_service::{AuthError, AuthService, LoginOutcome};
use crate::services::password::PasswordHasher;
use crate::services::policy::require_admin;
use crate::services::token::TokenService;
use crate::services::validation::{require_field, validate_username};

pub struct SeaOrmAuthService {
    store: Store,
    hasher: PasswordHasher,
    tokens: Arc<TokenService>,
    guard: AdminGuard,
    rehash_on_login: bool,
}

impl SeaOrmAuthService {
    #[must_use]
    pub const fn new(
        store: Store,
        hasher: PasswordHasher,
        tokens: Arc<TokenService>,
        guard: AdminGuard,
        rehash_on_login: bool,
    ) -> Self {
        Self {
            store,
            hasher,
            tokens,
            guard,
            rehash_on_login,
        }
    }

    fn rejected(reason: &'static str) -> AuthError {
        metrics::counter!("keyward_login_total", "outcome" => "rejected").increment(1);
        // The reason stays in the server log; the caller only ever sees Unauthorized.
        warn!(reason, "Login rejected");
        AuthError::Unauthorized
    }

    fn identity_of(user: &UserRecord) -> Identity {
        Identity {
            user_id: user.id,
            username: user.username.clone(),
            is_admin: user.is_admin,
        }
    }
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn login(
        &self,
        username: &str,
        password: &str,
        require_admin: bool,
    ) -> Result<LoginOutcome, AuthError> {
        validate_username(username)?;
        require_field(password, "password")?;

        let Some(user) = self.store.find_user_by_username(username).await? else {
            self.hasher.verify_dummy(password).await;
            return Err(Self::rejected("unknown user"));
        };

        if !self.hasher.verify(password, &user.password_hash).await {
            return Err(Self::rejected("password mismatch"));
        }

        if require_admin && !user.is_admin {
            return Err(Self::rejected("admin login by non-admin"));
        }

        let now = now_timestamp();
        let mut patch = UserPatch {
            last_login_at: Some(now.clone()),
            ..UserPatch::default()
        };

        if self.rehash_on_login && self.hasher.needs_rehash(&user.password_hash) {
            patch.password_hash = Some(self.hasher.hash(password).await?);
            info!(user_id = %user.id, "Password hash upgraded to current parameters");
        }

        self.store.update_user_fields(user.id, patch).await?;

        let token = self.tokens.issue(&Self::identity_of(&user))?;
        let must_reset = user.must_reset;

        let mut summary = UserSummary::from(user);
        summary.last_login_at = Some(now);

        metrics::counter!("keyward_login_total", "outcome" => "success").increment(1);
        info!(user_id = %summary.id, must_reset, "User logged in");

        Ok(LoginOutcome {
            token,
            must_reset,
            user: summary,
        })
    }

    fn get_identity(&self, token: &str) -> Result<Identity, AuthError> {
        self.tokens
            .verify(token)
            .and_then(|claims| claims.identity())
            .map_err(|_| AuthError::Unauthorized)
    }

    async fn change_own_password(
        &self,
        identity: &Identity,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        require_field(old_password, "old_password")?;
        require_field(new_password, "new_password")?;

        let user = self
            .store
            .find_user_by_id(identity.user_id)
            .await?
            .ok_or(AuthError::NotFound)?;

        if !self.hasher.verify(old_password, &user.password_hash).await {
            warn!(user_id = %user.id, "Password change rejected: old password incorrect");
            return Err(AuthError::Unauthorized);
        }

        let patch = UserPatch {
            password_hash: Some(self.hasher.hash(new_password).await?),
            password_changed_at: Some(now_timestamp()),
            must_reset: Some(false),
            ..UserPatch::default()
        };
        self.store.update_user_fields(user.id, patch).await?;

        info!(user_id = %user.id, "Password changed");
        Ok(())
    }

    async fn change_own_username(
        &self,
        identity: &Identity,
        new_username: &str,
        password: &str,
    ) -> Result<(), AuthError> {
        require_admin(identity)?;
        require_field(new_username, "new_username")?;
        require_field(password, "password")?;

        let verified = self
            .store
            .find_user_by_id(identity.user_id)
            .await?
            .ok_or(AuthError::NotFound)?;

        if !self.hasher.verify(password, &verified.password_hash).await {
            warn!(user_id = %verified.id, "Username change rejected: password incorrect");
            return Err(AuthError::Unauthorized);
        }

        validate_username(new_username)?;

        let section = self.guard.enter().await;

        // Re-read under the lock; a password changed since verification voids it.
        let user = self
            .store
            .find_user_by_id(identity.user_id)
            .await?
            .ok_or(AuthError::NotFound)?;
        if user.password_hash != verified.password_hash {
            return Err(AuthError::Unauthorized);
        }

        if user.is_admin {
            self.guard.ensure_sole_admin(&section, user.id).await?;
        }

        if user.username == new_username {
            return Ok(());
        }

        if self
            .store
            .username_taken_by_other(new_username, user.id)
            .await?
        {
            return Err(AuthError::Conflict);
        }

        let patch = UserPatch {
            username: Some(new_username.to_string()),
            ..UserPatch::default()
        };
        self.store.update_user_fields(user.id, patch).await?;

        info!(user_id = %user.id, "Username changed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecurityConfig;
    use crate::services::token::TokenConfig;
    use chrono::Duration;

    struct Fixture {
        store: Store,
        hasher: PasswordHasher,
        auth: SeaOrmAuthService,
    }

    async fn fixture() -> Fixture {
        let store = Store::new("sqlite::memory:").await.unwrap();
        let hasher = PasswordHasher::new(&SecurityConfig {
            argon2_memory_cost_kib: 64,
            argon2_time_cost: 1,
            argon2_parallelism: 1,
            rehash_on_login: true,
        })
        .unwrap();
        let tokens = Arc::new(TokenService::new(&TokenConfig::new(
            "test-secret-test-secret-test-sec",
            Duration::hours(8),
        )));
        let auth = SeaOrmAuthService::new(
            store.clone(),
            hasher.clone(),
            tokens,
            AdminGuard::new(store.clone()),
            true,
        );
        Fixture {
            store,
            hasher,
            auth,
        }
    }

    impl Fixture {
        async fn add_user(&self, name: &str, password: &str, is_admin: bool) -> Identity {
            let hash = self.hasher.hash(password).await.unwrap();
            let id = self.store.insert_user(name, &hash, is_admin).await.unwrap();
            Identity {
                user_id: id,
                username: name.to_string(),
                is_admin,
            }
        }
    }

    #[tokio::test]
    async fn login_returns_token_for_valid_credentials() {
        let fx = fixture().await;
        let alice = fx.add_user("alice", "pw", false).await;

        let outcome = fx.auth.login("alice", "pw", false).await.unwrap();
        assert!(!outcome.must_reset);
        assert_eq!(outcome.user.id, alice.user_id);
        assert!(outcome.user.last_login_at.is_some());
        assert_eq!(fx.auth.get_identity(&outcome.token).unwrap(), alice);

        let stored = fx.store.find_user_by_id(alice.user_id).await.unwrap().unwrap();
        assert!(stored.last_login_at.is_some());
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let fx = fixture().await;
        fx.add_user("alice", "pw", false).await;

        let wrong = fx.auth.login("alice", "wrong", false).await.unwrap_err();
        let ghost = fx.auth.login("ghost", "x", false).await.unwrap_err();
        let not_admin = fx.auth.login("alice", "pw", true).await.unwrap_err();

        for err in [&wrong, &ghost, &not_admin] {
            assert!(matches!(err, AuthError::Unauthorized));
        }
        assert_eq!(wrong.to_string(), ghost.to_string());
        assert_eq!(wrong.to_string(), not_admin.to_string());
    }

    #[tokio::test]
    async fn admin_login_with_require_admin() {
        let fx = fixture().await;
        fx.add_user("admin", "pw", true).await;

        let outcome = fx.auth.login("admin", "pw", true).await.unwrap();
        assert!(fx.auth.get_identity(&outcome.token).unwrap().is_admin);
    }

    #[tokio::test]
    async fn login_rehashes_outdated_hash() {
        let fx = fixture().await;
        let weak = PasswordHasher::new(&SecurityConfig {
            argon2_memory_cost_kib: 32,
            argon2_time_cost: 1,
            argon2_parallelism: 1,
            rehash_on_login: true,
        })
        .unwrap();
        let old_hash = weak.hash("pw").await.unwrap();
        let id = fx.store.insert_user("alice", &old_hash, false).await.unwrap();

        fx.auth.login("alice", "pw", false).await.unwrap();

        let stored = fx.store.find_user_by_id(id).await.unwrap().unwrap();
        assert_ne!(stored.password_hash, old_hash);
        assert!(!fx.hasher.needs_rehash(&stored.password_hash));
        assert!(fx.auth.login("alice", "pw", false).await.is_ok());
    }

    #[tokio::test]
    async fn empty_credentials_are_validation_errors() {
        let fx = fixture().await;
        assert!(matches!(
            fx.auth.login("", "pw", false).await,
            Err(AuthError::Validation(_))
        ));
        assert!(matches!(
            fx.auth.login("alice", "", false).await,
            Err(AuthError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn get_identity_rejects_garbage() {
        let fx = fixture().await;
        assert!(matches!(
            fx.auth.get_identity("garbage"),
            Err(AuthError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn change_own_password_requires_old_password() {
        let fx = fixture().await;
        let alice = fx.add_user("alice", "old", false).await;

        let err = fx
            .auth
            .change_own_password(&alice, "nope", "new")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized));

        fx.auth
            .change_own_password(&alice, "old", "new")
            .await
            .unwrap();
        assert!(fx.auth.login("alice", "old", false).await.is_err());
        assert!(fx.auth.login("alice", "new", false).await.is_ok());

        let stored = fx.store.find_user_by_id(alice.user_id).await.unwrap().unwrap();
        assert!(stored.password_changed_at.is_some());
    }

    #[tokio::test]
    async fn change_own_password_clears_must_reset() {
        let fx = fixture().await;
        let alice = fx.add_user("alice", "old", false).await;
        let patch = UserPatch {
            must_reset: Some(true),
            ..UserPatch::default()
        };
        fx.store.update_user_fields(alice.user_id, patch).await.unwrap();

        fx.auth
            .change_own_password(&alice, "old", "new")
            .await
            .unwrap();

        let outcome = fx.auth.login("alice", "new", false).await.unwrap();
        assert!(!outcome.must_reset);
    }

    #[tokio::test]
    async fn change_own_password_for_vanished_user_is_not_found() {
        let fx = fixture().await;
        let ghost = Identity {
            user_id: crate::domain::UserId::new(404),
            username: "ghost".to_string(),
            is_admin: false,
        };
        let err = fx
            .auth
            .change_own_password(&ghost, "a", "b")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NotFound));
    }

    #[tokio::test]
    async fn admin_can_rename_self() {
        let fx = fixture().await;
        let admin = fx.add_user("admin", "pw", true).await;

        fx.auth
            .change_own_username(&admin, "root", "pw")
            .await
            .unwrap();
        assert!(fx.auth.login("root", "pw", true).await.is_ok());
        assert!(fx.auth.login("admin", "pw", true).await.is_err());
    }

    #[tokio::test]
    async fn rename_needs_admin_role_and_password() {
        let fx = fixture().await;
        let admin = fx.add_user("admin", "pw", true).await;
        let alice = fx.add_user("alice", "pw", false).await;

        let err = fx
            .auth
            .change_own_username(&alice, "alice2", "pw")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Forbidden));

        let err = fx
            .auth
            .change_own_username(&admin, "root", "wrong")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized));
    }

    #[tokio::test]
    async fn rename_onto_taken_name_conflicts_without_mutation() {
        let fx = fixture().await;
        let admin = fx.add_user("admin", "pw", true).await;
        fx.add_user("alice", "pw", false).await;

        let err = fx
            .auth
            .change_own_username(&admin, "alice", "pw")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Conflict));

        let stored = fx.store.find_user_by_id(admin.user_id).await.unwrap().unwrap();
        assert_eq!(stored.username, "admin");
    }

    #[tokio::test]
    async fn login_rejects_malformed_usernames() {
        let fx = fixture().await;
        fx.add_user("alice", "pw", false).await;

        let long = "a".repeat(500);
        for name in ["   ", "al ice", long.as_str()] {
            let err = fx.auth.login(name, "pw", false).await.unwrap_err();
            assert!(matches!(err, AuthError::Validation(_)), "{name:?}: {err:?}");
        }
    }

    #[tokio::test]
    async fn rename_checks_password_before_username_format() {
        let fx = fixture().await;
        let admin = fx.add_user("admin", "pw", true).await;

        let err = fx
            .auth
            .change_own_username(&admin, "ro ot", "wrong")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized));

        let err = fx
            .auth
            .change_own_username(&admin, "ro ot", "pw")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
    }
}
