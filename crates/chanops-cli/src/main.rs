//! chanops entry point.
//!
//! Binary name: `chanops`
//!
//! Loads `.env`, parses arguments, sets up tracing, resolves configuration and
//! the database DSN, then dispatches to the command handlers.

mod cli;
mod state;

use std::process::ExitCode;

use anyhow::anyhow;
use clap::Parser;
use clap_complete::generate;

use chanops_infra::config::{load_config, resolve_dsn};
use chanops_observe::conventions::verbosity_filter;
use chanops_observe::tracing_setup::{init_tracing, shutdown_tracing};

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_tracing(verbosity_filter(cli.verbose, cli.quiet), cli.otel)
        .map_err(|e| anyhow!("failed to initialize tracing: {e}"))?;

    let code = run(cli).await;
    shutdown_tracing();
    code
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    // Shell completions don't need a database
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "chanops", &mut std::io::stdout());
        return Ok(ExitCode::SUCCESS);
    }

    let config = load_config(cli.config.as_deref()).await;
    let dsn = resolve_dsn(cli.dsn.as_deref(), &config);

    // `check` reports a failed connection instead of aborting on it
    if let Commands::Check = &cli.command {
        return cli::check::run_check(&config, &dsn, cli.json).await;
    }

    let state = AppState::init(config, &dsn).await?;

    let result = match cli.command {
        Commands::Channel { command } => cli::channel::handle_channel_command(command, &state, cli.json).await,
        Commands::Keys { command } => cli::keys::handle_keys_command(command, &state, cli.json).await,
        Commands::Models { command } => cli::models::handle_models_command(command, &state, cli.json).await,
        Commands::Db { command } => cli::db::handle_db_command(command, &state, cli.json).await,
        Commands::Check | Commands::Completions { .. } => Ok(ExitCode::SUCCESS),
    };

    state.close().await;
    result
}
