//! CLI command definitions for the `chanops` binary.
//!
//! Commands are grouped by noun (`chanops channel export`, `chanops db clean`).

pub mod channel;
pub mod check;
pub mod db;
pub mod keys;
pub mod models;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Maintenance tooling for an AI-gateway channel database.
#[derive(Parser)]
#[command(name = "chanops", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Database DSN (Go MySQL DSN, sqlite:path, Postgres key=value, or URL).
    #[arg(long, env = "SQL_DSN", global = true, hide_env_values = true)]
    pub dsn: Option<String>,

    /// Path to config.toml (default: <config dir>/chanops/config.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Export, back up, restore and test channels.
    Channel {
        #[command(subcommand)]
        command: channel::ChannelCommand,
    },

    /// Export and validate API keys stored in channels.
    Keys {
        #[command(subcommand)]
        command: keys::KeysCommand,
    },

    /// Show known models and update channel model lists.
    Models {
        #[command(subcommand)]
        command: models::ModelsCommand,
    },

    /// Inspect, clean and reset database tables.
    Db {
        #[command(subcommand)]
        command: db::DbCommand,
    },

    /// Check the database container and connection.
    Check,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["chanops", "channel", "count", "--json", "-vv", "--dsn", "sqlite:x.db"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.dsn.as_deref(), Some("sqlite:x.db"));
    }

    #[test]
    fn test_clean_all_requires_confirm_all() {
        assert!(Cli::try_parse_from(["chanops", "db", "clean", "--all"]).is_err());
        assert!(Cli::try_parse_from(["chanops", "db", "clean", "--all", "--confirm-all"]).is_ok());
    }

    #[test]
    fn test_reset_modes_conflict() {
        assert!(Cli::try_parse_from(["chanops", "db", "reset", "--backup-only", "--reset-only"]).is_err());
    }

    #[test]
    fn test_remove_invalid_conflicts_with_file_source() {
        let parsed = Cli::try_parse_from(["chanops", "keys", "test", "--from-file", "k.txt", "--remove-invalid"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_repeatable_type_filter() {
        let cli = Cli::try_parse_from(["chanops", "models", "update", "--type", "24", "--type", "36", "--dry-run"]).unwrap();
        match cli.command {
            Commands::Models {
                command: models::ModelsCommand::Update { types, dry_run, .. },
            } => {
                assert_eq!(types, vec![24, 36]);
                assert!(dry_run);
            }
            _ => panic!("expected models update"),
        }
    }
}
