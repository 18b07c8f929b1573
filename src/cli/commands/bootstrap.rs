//! Bootstrap command handler

use crate::config::Config;
use crate::services::BootstrapOutcome;
use crate::state::SharedState;

pub async fn cmd_bootstrap(config: Config) -> anyhow::Result<()> {
    let username = config.auth.bootstrap_username.clone();
    let state = SharedState::new(config).await?;

    match state.bootstrap().await? {
        BootstrapOutcome::Created(id) => {
            println!("✓ Administrator '{username}' created (id {id}).");
            println!("  Change the default password after the first login.");
        }
        BootstrapOutcome::AlreadyPresent => {
            println!("An administrator already exists; nothing to do.");
        }
    }
    Ok(())
}
