use anyhow::Result;
use sea_orm::sqlx::ConnectOptions as _;
use sea_orm::sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, SqlxSqliteConnector, Statement,
};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::domain::UserId;

pub mod migrator;
pub mod repositories;

pub use repositories::user::{StoreError, UserPatch, UserRecord, UserSummary};

fn is_in_memory(db_url: &str) -> bool {
    db_url.contains(":memory:")
}

fn connect_options(db_url: &str, max_connections: u32, min_connections: u32) -> ConnectOptions {
    let mut opt = ConnectOptions::new(db_url.to_string());
    opt.max_connections(max_connections)
        .min_connections(min_connections)
        .idle_timeout(Duration::from_secs(300))
        .max_lifetime(Duration::from_secs(600))
        .connect_timeout(Duration::from_secs(10))
        .acquire_timeout(Duration::from_secs(10))
        .sqlx_logging(false);
    opt
}

/// Every sqlite in-memory connection is its own database, so the pool holds
/// exactly one connection that is never reaped or recycled.
fn memory_pool_options() -> SqlitePoolOptions {
    SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .acquire_timeout(Duration::from_secs(10))
}

async fn connect_in_memory(db_url: &str) -> Result<DatabaseConnection> {
    let connect = SqliteConnectOptions::from_str(db_url)?.disable_statement_logging();
    let pool = memory_pool_options().connect_with(connect).await?;
    Ok(SqlxSqliteConnector::from_sqlx_sqlite_pool(pool))
}

/// Durable home of user records.
///
/// Every mutation is a single statement against one row; there is no
/// multi-record transaction API. Cross-record rules (one admin) are the
/// admin guard's job, backed by the table's unique indexes.
#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        let in_memory = is_in_memory(db_url);

        if !in_memory {
            let path_str = db_url.trim_start_matches("sqlite:").trim_start_matches("//");
            let path_str = path_str.split('?').next().unwrap_or(path_str);
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let conn = if in_memory {
            connect_in_memory(db_url).await?
        } else {
            Database::connect(connect_options(db_url, max_connections, min_connections)).await?
        };

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    // ========== User Repository Methods ==========

    #[must_use]
    pub fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    pub async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, StoreError> {
        self.user_repo().find_by_username(username).await
    }

    pub async fn find_user_by_id(&self, id: UserId) -> Result<Option<UserRecord>, StoreError> {
        self.user_repo().find_by_id(id).await
    }

    pub async fn insert_user(
        &self,
        username: &str,
        password_hash: &str,
        is_admin: bool,
    ) -> Result<UserId, StoreError> {
        self.user_repo()
            .insert(username, password_hash, is_admin)
            .await
    }

    pub async fn update_user_fields(&self, id: UserId, patch: UserPatch) -> Result<(), StoreError> {
        self.user_repo().update_fields(id, patch).await
    }

    pub async fn list_users(&self) -> Result<Vec<UserRecord>, StoreError> {
        self.user_repo().list_all().await
    }

    pub async fn list_pending_recovery(&self) -> Result<Vec<UserRecord>, StoreError> {
        self.user_repo().list_pending_recovery().await
    }

    pub async fn count_admins_excluding(&self, exclude: Option<UserId>) -> Result<u64, StoreError> {
        self.user_repo().count_admins_excluding(exclude).await
    }

    pub async fn username_taken_by_other(
        &self,
        username: &str,
        owner: UserId,
    ) -> Result<bool, StoreError> {
        self.user_repo()
            .username_taken_by_other(username, owner)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RecoveryStatus;

    async fn memory_store() -> Store {
        Store::new("sqlite::memory:").await.unwrap()
    }

    #[test]
    fn in_memory_pool_keeps_its_only_connection() {
        let opt = memory_pool_options();
        assert_eq!(opt.get_max_connections(), 1);
        assert_eq!(opt.get_min_connections(), 1);
        assert_eq!(opt.get_idle_timeout(), None);
        assert_eq!(opt.get_max_lifetime(), None);
    }

    #[test]
    fn file_pool_recycles_connections() {
        let opt = connect_options("sqlite:/tmp/keyward.db", 5, 1);
        assert_eq!(opt.get_max_connections(), Some(5));
        assert_eq!(opt.get_idle_timeout(), Some(Duration::from_secs(300)));
        assert_eq!(opt.get_max_lifetime(), Some(Duration::from_secs(600)));
    }

    #[tokio::test]
    async fn in_memory_store_shares_one_database_across_clones() {
        let store = memory_store().await;
        let other = store.clone();
        let id = store.insert_user("alice", "h1", false).await.unwrap();
        assert!(other.find_user_by_id(id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn insert_assigns_increasing_ids() {
        let store = memory_store().await;
        let a = store.insert_user("alice", "h1", false).await.unwrap();
        let b = store.insert_user("bob", "h2", false).await.unwrap();
        assert!(a < b);

        let alice = store.find_user_by_id(a).await.unwrap().unwrap();
        assert_eq!(alice.username, "alice");
        assert_eq!(alice.recovery_status, RecoveryStatus::None);
        assert!(!alice.must_reset);
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let store = memory_store().await;
        store.insert_user("alice", "h1", false).await.unwrap();
        let err = store.insert_user("alice", "h2", false).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateUsername));
    }

    #[tokio::test]
    async fn username_lookup_is_case_sensitive() {
        let store = memory_store().await;
        store.insert_user("Alice", "h1", false).await.unwrap();
        assert!(store.find_user_by_username("alice").await.unwrap().is_none());
        assert!(store.find_user_by_username("Alice").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn second_admin_row_is_rejected_by_the_table() {
        let store = memory_store().await;
        store.insert_user("admin", "h1", true).await.unwrap();
        let err = store.insert_user("root", "h2", true).await.unwrap_err();
        assert!(matches!(err, StoreError::SecondAdmin));

        // Any number of non-admins is fine.
        store.insert_user("a", "h", false).await.unwrap();
        store.insert_user("b", "h", false).await.unwrap();
        assert_eq!(store.count_admins_excluding(None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn update_fields_on_missing_id_is_not_found() {
        let store = memory_store().await;
        let patch = UserPatch {
            must_reset: Some(true),
            ..UserPatch::default()
        };
        let err = store
            .update_user_fields(UserId::new(99), patch)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(id) if id == UserId::new(99)));

        let err = store
            .update_user_fields(UserId::new(99), UserPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn update_fields_touches_only_given_columns() {
        let store = memory_store().await;
        let id = store.insert_user("alice", "h1", false).await.unwrap();

        let patch = UserPatch {
            admin_note: Some("called".to_string()),
            must_reset: Some(true),
            ..UserPatch::default()
        };
        store.update_user_fields(id, patch).await.unwrap();

        let user = store.find_user_by_id(id).await.unwrap().unwrap();
        assert_eq!(user.admin_note.as_deref(), Some("called"));
        assert!(user.must_reset);
        assert_eq!(user.password_hash, "h1");
        assert_eq!(user.username, "alice");
    }

    #[tokio::test]
    async fn rename_onto_existing_username_conflicts() {
        let store = memory_store().await;
        store.insert_user("alice", "h", false).await.unwrap();
        let bob = store.insert_user("bob", "h", false).await.unwrap();

        let patch = UserPatch {
            username: Some("alice".to_string()),
            ..UserPatch::default()
        };
        let err = store.update_user_fields(bob, patch).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateUsername));
        assert!(store.username_taken_by_other("alice", bob).await.unwrap());
    }

    #[tokio::test]
    async fn pending_recovery_is_most_recent_first() {
        let store = memory_store().await;
        let a = store.insert_user("a", "h", false).await.unwrap();
        let b = store.insert_user("b", "h", false).await.unwrap();
        let c = store.insert_user("c", "h", false).await.unwrap();

        for (id, at) in [
            (a, "2026-01-01T00:00:00.000000Z"),
            (b, "2026-03-01T00:00:00.000000Z"),
            (c, "2026-02-01T00:00:00.000000Z"),
        ] {
            let patch = UserPatch {
                recovery_status: Some(RecoveryStatus::Pending),
                recovery_requested_at: Some(at.to_string()),
                ..UserPatch::default()
            };
            store.update_user_fields(id, patch).await.unwrap();
        }

        let resolved = UserPatch {
            recovery_status: Some(RecoveryStatus::Resolved),
            ..UserPatch::default()
        };
        store.update_user_fields(c, resolved).await.unwrap();

        let pending: Vec<_> = store
            .list_pending_recovery()
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.id)
            .collect();
        assert_eq!(pending, vec![b, a]);

        let all: Vec<_> = store
            .list_users()
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.id)
            .collect();
        assert_eq!(all, vec![a, b, c]);
    }
}
