use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub username: String,

    /// Argon2id PHC string
    pub password_hash: String,

    /// At most one row may be true; backed by the `users_single_admin` partial index.
    pub is_admin: bool,

    /// Set by an admin reset, cleared by the user's next password change.
    pub must_reset: bool,

    /// `none`, `pending` or `resolved`
    pub recovery_status: String,

    pub recovery_requested_at: Option<String>,

    pub admin_note: Option<String>,

    pub last_login_at: Option<String>,

    pub password_changed_at: Option<String>,

    pub created_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
