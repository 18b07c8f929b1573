mod bootstrap;
mod init;
mod users;

pub use bootstrap::cmd_bootstrap;
pub use init::cmd_init;
pub use users::cmd_list_users;
