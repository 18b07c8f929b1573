use std::fmt;

use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    Set, SqlErr,
};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::domain::{RecoveryStatus, UserId, now_timestamp};
use crate::entities::{prelude::Users, users};

/// Failures the credential store reports to its callers.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Username already exists")]
    DuplicateUsername,

    #[error("An administrator already exists")]
    SecondAdmin,

    #[error("User {0} not found")]
    NotFound(UserId),

    #[error("Database error: {0}")]
    Db(#[from] DbErr),
}

impl StoreError {
    /// Classifies a failed write. Unique violations on the partial admin index
    /// name the `is_admin` column; everything else unique is the username.
    fn from_write(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(msg)) if msg.contains("is_admin") => {
                Self::SecondAdmin
            }
            Some(SqlErr::UniqueConstraintViolation(_)) => Self::DuplicateUsername,
            _ => Self::Db(err),
        }
    }
}

/// Full user record, including the password hash. Stays inside the crate's
/// service layer; callers outside get a [`UserSummary`].
#[derive(Clone)]
pub struct UserRecord {
    pub id: UserId,
    pub username: String,
    pub password_hash: String,
    pub is_admin: bool,
    pub must_reset: bool,
    pub recovery_status: RecoveryStatus,
    pub recovery_requested_at: Option<String>,
    pub admin_note: Option<String>,
    pub last_login_at: Option<String>,
    pub password_changed_at: Option<String>,
    pub created_at: String,
}

impl fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRecord")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password_hash", &"<redacted>")
            .field("is_admin", &self.is_admin)
            .field("must_reset", &self.must_reset)
            .field("recovery_status", &self.recovery_status)
            .finish_non_exhaustive()
    }
}

impl From<users::Model> for UserRecord {
    fn from(model: users::Model) -> Self {
        Self {
            id: UserId::new(model.id),
            username: model.username,
            password_hash: model.password_hash,
            is_admin: model.is_admin,
            must_reset: model.must_reset,
            recovery_status: model.recovery_status.parse().unwrap_or_default(),
            recovery_requested_at: model.recovery_requested_at,
            admin_note: model.admin_note,
            last_login_at: model.last_login_at,
            password_changed_at: model.password_changed_at,
            created_at: model.created_at,
        }
    }
}

/// User data returned to callers (without the password hash)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    pub id: UserId,
    pub username: String,
    pub is_admin: bool,
    pub must_reset: bool,
    pub recovery_status: RecoveryStatus,
    pub recovery_requested_at: Option<String>,
    pub admin_note: Option<String>,
    pub last_login_at: Option<String>,
    pub password_changed_at: Option<String>,
    pub created_at: String,
}

impl From<UserRecord> for UserSummary {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id,
            username: record.username,
            is_admin: record.is_admin,
            must_reset: record.must_reset,
            recovery_status: record.recovery_status,
            recovery_requested_at: record.recovery_requested_at,
            admin_note: record.admin_note,
            last_login_at: record.last_login_at,
            password_changed_at: record.password_changed_at,
            created_at: record.created_at,
        }
    }
}

/// Partial update of one record. `None` leaves a column untouched.
///
/// The admin flag is deliberately absent: it is only ever written at insert
/// time, through the admin guard.
#[derive(Clone, Default)]
pub struct UserPatch {
    pub username: Option<String>,
    pub password_hash: Option<String>,
    pub must_reset: Option<bool>,
    pub recovery_status: Option<RecoveryStatus>,
    pub recovery_requested_at: Option<String>,
    pub admin_note: Option<String>,
    pub last_login_at: Option<String>,
    pub password_changed_at: Option<String>,
}

impl UserPatch {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.password_hash.is_none()
            && self.must_reset.is_none()
            && self.recovery_status.is_none()
            && self.recovery_requested_at.is_none()
            && self.admin_note.is_none()
            && self.last_login_at.is_none()
            && self.password_changed_at.is_none()
    }

    fn into_active_model(self) -> users::ActiveModel {
        let mut active: users::ActiveModel = Default::default();

        if let Some(username) = self.username {
            active.username = Set(username);
        }
        if let Some(hash) = self.password_hash {
            active.password_hash = Set(hash);
        }
        if let Some(must_reset) = self.must_reset {
            active.must_reset = Set(must_reset);
        }
        if let Some(status) = self.recovery_status {
            active.recovery_status = Set(status.as_str().to_string());
        }
        if let Some(at) = self.recovery_requested_at {
            active.recovery_requested_at = Set(Some(at));
        }
        if let Some(note) = self.admin_note {
            active.admin_note = Set(Some(note));
        }
        if let Some(at) = self.last_login_at {
            active.last_login_at = Set(Some(at));
        }
        if let Some(at) = self.password_changed_at {
            active.password_changed_at = Set(Some(at));
        }

        active
    }
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Exact, case-sensitive lookup.
    pub async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        let user = Users::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await?;

        Ok(user.map(UserRecord::from))
    }

    pub async fn find_by_id(&self, id: UserId) -> Result<Option<UserRecord>, StoreError> {
        let user = Users::find_by_id(id.value()).one(&self.conn).await?;
        Ok(user.map(UserRecord::from))
    }

    /// Inserts a new record. Uniqueness of the username and of the admin flag
    /// is enforced by the table itself, in the same statement.
    pub async fn insert(
        &self,
        username: &str,
        password_hash: &str,
        is_admin: bool,
    ) -> Result<UserId, StoreError> {
        let active = users::ActiveModel {
            username: Set(username.to_string()),
            password_hash: Set(password_hash.to_string()),
            is_admin: Set(is_admin),
            must_reset: Set(false),
            recovery_status: Set(RecoveryStatus::None.as_str().to_string()),
            recovery_requested_at: Set(None),
            admin_note: Set(None),
            last_login_at: Set(None),
            password_changed_at: Set(None),
            created_at: Set(now_timestamp()),
            ..Default::default()
        };

        let result = Users::insert(active)
            .exec(&self.conn)
            .await
            .map_err(StoreError::from_write)?;

        debug!(user_id = result.last_insert_id, is_admin, "Inserted user");
        Ok(UserId::new(result.last_insert_id))
    }

    /// Applies `patch` to one record in a single `UPDATE` statement.
    pub async fn update_fields(&self, id: UserId, patch: UserPatch) -> Result<(), StoreError> {
        if patch.is_empty() {
            return match self.find_by_id(id).await? {
                Some(_) => Ok(()),
                None => Err(StoreError::NotFound(id)),
            };
        }

        let result = Users::update_many()
            .set(patch.into_active_model())
            .filter(users::Column::Id.eq(id.value()))
            .exec(&self.conn)
            .await
            .map_err(StoreError::from_write)?;

        if result.rows_affected == 0 {
            return Err(StoreError::NotFound(id));
        }

        Ok(())
    }

    pub async fn list_all(&self) -> Result<Vec<UserRecord>, StoreError> {
        let rows = Users::find()
            .order_by_asc(users::Column::Id)
            .all(&self.conn)
            .await?;

        Ok(rows.into_iter().map(UserRecord::from).collect())
    }

    /// Pending recovery requests, most recent first.
    pub async fn list_pending_recovery(&self) -> Result<Vec<UserRecord>, StoreError> {
        let rows = Users::find()
            .filter(users::Column::RecoveryStatus.eq(RecoveryStatus::Pending.as_str()))
            .order_by_desc(users::Column::RecoveryRequestedAt)
            .order_by_desc(users::Column::Id)
            .all(&self.conn)
            .await?;

        Ok(rows.into_iter().map(UserRecord::from).collect())
    }

    /// Number of admin rows other than `exclude`.
    pub async fn count_admins_excluding(&self, exclude: Option<UserId>) -> Result<u64, StoreError> {
        let mut query = Users::find().filter(users::Column::IsAdmin.eq(true));
        if let Some(id) = exclude {
            query = query.filter(users::Column::Id.ne(id.value()));
        }

        Ok(query.count(&self.conn).await?)
    }

    /// Whether `username` belongs to a record other than `owner`.
    pub async fn username_taken_by_other(
        &self,
        username: &str,
        owner: UserId,
    ) -> Result<bool, StoreError> {
        let count = Users::find()
            .filter(users::Column::Username.eq(username))
            .filter(users::Column::Id.ne(owner.value()))
            .count(&self.conn)
            .await?;

        Ok(count > 0)
    }
}
