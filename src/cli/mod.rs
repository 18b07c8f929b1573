//! CLI module - Command-line interface for Keyward
//!
//! This module provides a structured CLI using clap for argument parsing.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Keyward - credential and session service
#[derive(Parser)]
#[command(name = "keyward")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file to use instead of the default search paths
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run the HTTP API (default)
    Serve,

    /// Write a default config file
    Init,

    /// Create the default administrator if none exists, then exit
    Bootstrap,

    /// List user accounts
    #[command(alias = "ls")]
    Users,
}

pub use commands::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_the_default() {
        let cli = Cli::try_parse_from(["keyward"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn parses_subcommands_and_config_flag() {
        let cli =
            Cli::try_parse_from(["keyward", "bootstrap", "--config", "/tmp/k.toml"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Bootstrap));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/k.toml")));

        let cli = Cli::try_parse_from(["keyward", "ls"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Users));
    }

    #[test]
    fn rejects_unknown_subcommand() {
        assert!(Cli::try_parse_from(["keyward", "frobnicate"]).is_err());
    }
}
