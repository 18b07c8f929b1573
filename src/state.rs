use std::sync::Arc;
use tracing::warn;

use crate::config::Config;
use crate::db::Store;
use crate::services::{
    AdminGuard, AdminService, AuthService, BootstrapOutcome, PasswordHasher, RecoveryWorkflow,
    SeaOrmAdminService, SeaOrmAuthService, TokenConfig, TokenService, bootstrap,
};

/// Everything a request handler or CLI command needs, wired once at startup.
#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<Config>,

    pub store: Store,

    pub hasher: PasswordHasher,

    pub tokens: Arc<TokenService>,

    pub admin_guard: AdminGuard,

    pub recovery: RecoveryWorkflow,

    pub auth_service: Arc<dyn AuthService>,

    pub admin_service: Arc<dyn AdminService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        Self::with_store(config, store)
    }

    pub fn with_store(config: Config, store: Store) -> anyhow::Result<Self> {
        let hasher = PasswordHasher::new(&config.security)?;

        let (token_config, generated) = TokenConfig::from_auth_config(&config.auth);
        if generated {
            warn!(
                "No token secret configured; generated an ephemeral one. \
                 Sessions will not survive a restart"
            );
        }
        let tokens = Arc::new(TokenService::new(&token_config));

        let admin_guard = AdminGuard::new(store.clone());
        let recovery = RecoveryWorkflow::new(store.clone());

        let auth_service: Arc<dyn AuthService> = Arc::new(SeaOrmAuthService::new(
            store.clone(),
            hasher.clone(),
            tokens.clone(),
            admin_guard.clone(),
            config.security.rehash_on_login,
        ));

        let admin_service: Arc<dyn AdminService> = Arc::new(SeaOrmAdminService::new(
            store.clone(),
            hasher.clone(),
            admin_guard.clone(),
            recovery.clone(),
        ));

        Ok(Self {
            config: Arc::new(config),
            store,
            hasher,
            tokens,
            admin_guard,
            recovery,
            auth_service,
            admin_service,
        })
    }

    pub async fn bootstrap(&self) -> anyhow::Result<BootstrapOutcome> {
        let outcome = bootstrap(
            &self.store,
            &self.hasher,
            &self.admin_guard,
            &self.config.auth,
        )
        .await?;
        Ok(outcome)
    }
}
