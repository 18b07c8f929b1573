//! List users command handler

use crate::config::Config;
use crate::db::Store;
use crate::domain::RecoveryStatus;

pub async fn cmd_list_users(config: &Config) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;
    let users = store.list_users().await?;

    if users.is_empty() {
        println!("No users yet.");
        println!();
        println!("Create the administrator with: keyward bootstrap");
        return Ok(());
    }

    println!("Users ({} total)", users.len());
    println!("{:-<70}", "");

    for user in users {
        let role = if user.is_admin { "admin" } else { "user" };

        let mut flags = Vec::new();
        if user.must_reset {
            flags.push("must reset");
        }
        if user.recovery_status == RecoveryStatus::Pending {
            flags.push("recovery pending");
        }
        let flags = if flags.is_empty() {
            String::new()
        } else {
            format!("  [{}]", flags.join(", "))
        };

        println!(
            "{:>4}  {:<24} {:<6} last login: {}{}",
            user.id.value(),
            user.username,
            role,
            user.last_login_at.as_deref().unwrap_or("never"),
            flags
        );
    }

    Ok(())
}
