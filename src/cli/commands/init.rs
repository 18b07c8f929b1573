//! Init command handler

use std::path::Path;

use crate::config::Config;

pub fn cmd_init(path: Option<&Path>) -> anyhow::Result<()> {
    let created = match path {
        Some(path) if path.exists() => false,
        Some(path) => {
            Config::default().save_to_path(path)?;
            true
        }
        None => Config::create_default_if_missing()?,
    };

    if created {
        println!("✓ Config file created. Set auth.token_secret before running in production.");
    } else {
        println!("Config file already exists, left untouched.");
    }
    Ok(())
}
