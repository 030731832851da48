//! Database subcommands: table overview, statistics, cleaning, channel reset.

use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use comfy_table::{Cell, Color};
use console::style;
use dialoguer::{MultiSelect, Select};

use chanops_core::catalog;
use chanops_core::service::channel::ResetOptions;
use chanops_core::service::cleaner::{CleanSelection, post_clean_notes, requires_typed_confirmation};
use chanops_types::error::CleanError;
use chanops_types::table::{Importance, TableCategory, TableStats};

use super::output;
use crate::state::AppState;

#[derive(Subcommand)]
pub enum DbCommand {
    /// List tables grouped by category with row counts.
    Tables,

    /// Summarize table sizes.
    Stats,

    /// Empty tables, backing each one up first.
    Clean {
        /// Tables to clean.
        #[arg(conflicts_with_all = ["logs", "business", "all"])]
        tables: Vec<String>,

        /// Clean the log tables (logs, quota_data, midjourneys, tasks).
        #[arg(long, conflicts_with_all = ["business", "all"])]
        logs: bool,

        /// Clean the log tables plus redemptions and topups.
        #[arg(long, conflicts_with = "all")]
        business: bool,

        /// Clean every table. Requires --confirm-all.
        #[arg(long, requires = "confirm_all")]
        all: bool,

        /// Acknowledge that --all empties the whole database.
        #[arg(long)]
        confirm_all: bool,

        /// Don't write SQL backups before cleaning.
        #[arg(long)]
        no_backup: bool,

        /// Skip the confirmation prompts.
        #[arg(long, short)]
        yes: bool,
    },

    /// Back up and empty the channels table.
    Reset {
        /// Write the backup without deleting anything.
        #[arg(long, conflicts_with = "reset_only")]
        backup_only: bool,

        /// Delete every channel without writing a backup.
        #[arg(long)]
        reset_only: bool,

        /// Show the planned operations and change nothing.
        #[arg(long)]
        dry_run: bool,

        /// Skip the confirmation prompt.
        #[arg(long, short)]
        yes: bool,
    },

    /// List channel backups, newest first.
    Backups,
}

pub async fn handle_db_command(cmd: DbCommand, state: &AppState, json: bool) -> Result<ExitCode> {
    match cmd {
        DbCommand::Tables => list_tables(state, json).await,
        DbCommand::Stats => show_stats(state, json).await,
        DbCommand::Clean {
            tables,
            logs,
            business,
            all,
            confirm_all: _,
            no_backup,
            yes,
        } => {
            let selection = if all {
                Some(CleanSelection::All)
            } else if business {
                Some(CleanSelection::Business)
            } else if logs {
                Some(CleanSelection::Logs)
            } else if !tables.is_empty() {
                Some(CleanSelection::Tables(tables))
            } else {
                None
            };
            clean_tables(state, selection, !no_backup, yes, json).await
        }
        DbCommand::Reset {
            backup_only,
            reset_only,
            dry_run,
            yes,
        } => {
            let options = ResetOptions {
                backup: !reset_only,
                reset: !backup_only,
                dry_run,
            };
            reset_channels(state, options, yes, json).await
        }
        DbCommand::Backups => list_backups(state, json).await,
    }
}

fn importance_color(importance: Importance) -> Color {
    match importance {
        Importance::Critical => Color::Red,
        Importance::High => Color::Yellow,
        Importance::Medium => Color::Blue,
        Importance::Low => Color::Green,
        Importance::Unknown => Color::DarkGrey,
    }
}

async fn list_tables(state: &AppState, json: bool) -> Result<ExitCode> {
    let spinner = output::spinner("Counting rows...", json)?;
    let stats = state.cleaner_service.table_stats().await;
    spinner.finish_and_clear();
    let stats = stats.context("failed to read tables")?;

    if json {
        output::print_json(&stats)?;
        return Ok(ExitCode::SUCCESS);
    }

    println!();
    for category in TableCategory::ALL {
        let tables: Vec<&TableStats> = stats.iter().filter(|t| t.category == category).collect();
        if tables.is_empty() {
            continue;
        }
        println!("  {}", style(category.title()).bold().underlined());
        let mut table = output::new_table(&["Table", "Rows", "Importance", "Description", "Impact"]);
        for t in tables {
            let impact = catalog::lookup(&t.name).map_or("", |info| info.impact);
            table.add_row(vec![
                Cell::new(&t.name).fg(Color::Cyan),
                Cell::new(output::format_count(t.rows)),
                Cell::new(t.importance).fg(importance_color(t.importance)),
                Cell::new(&t.description),
                Cell::new(impact).fg(Color::DarkGrey),
            ]);
        }
        println!("{table}");
        println!();
    }
    Ok(ExitCode::SUCCESS)
}

async fn show_stats(state: &AppState, json: bool) -> Result<ExitCode> {
    let spinner = output::spinner("Counting rows...", json)?;
    let stats = state.cleaner_service.database_stats().await;
    spinner.finish_and_clear();
    let stats = stats.context("failed to read tables")?;

    if json {
        output::print_json(&stats)?;
        return Ok(ExitCode::SUCCESS);
    }

    println!();
    println!("  {}", style("Database statistics").bold().underlined());
    println!("  Backend:        {}", state.db_pool.backend);
    println!("  Tables:         {}", stats.total_tables);
    println!("  Total records:  {}", output::format_count(stats.total_records));
    println!("  Empty tables:   {}", stats.empty_tables);
    if !stats.empty_sample.is_empty() {
        println!("                  {}", style(stats.empty_sample.join(", ")).dim());
    }

    if !stats.large_tables.is_empty() {
        println!();
        println!("  {}", style("Large tables").yellow().bold());
        for t in &stats.large_tables {
            println!("    {:<20} {:>12} rows", t.name, output::format_count(t.rows));
        }
    }

    println!();
    let mut table = output::new_table(&["Category", "Tables", "Rows"]);
    for total in &stats.categories {
        table.add_row(vec![
            Cell::new(total.category.title()).fg(Color::Cyan),
            Cell::new(total.tables),
            Cell::new(output::format_count(total.rows)),
        ]);
    }
    println!("{table}");
    println!();
    Ok(ExitCode::SUCCESS)
}

/// Interactive fallback when no tables were named on the command line.
fn choose_selection(stats: &[TableStats]) -> Result<Option<CleanSelection>> {
    let items = [
        "All tables",
        "Log tables",
        "Business tables (logs, redemptions, topups)",
        "Choose tables...",
        "Cancel",
    ];
    let choice = Select::new()
        .with_prompt("What do you want to clean?")
        .items(&items)
        .default(1)
        .interact()?;

    let selection = match choice {
        0 => Some(CleanSelection::All),
        1 => Some(CleanSelection::Logs),
        2 => Some(CleanSelection::Business),
        3 => {
            let labels: Vec<String> = stats
                .iter()
                .map(|t| format!("{} ({} rows, {})", t.name, output::format_count(t.rows), t.importance))
                .collect();
            let picked = MultiSelect::new()
                .with_prompt("Select tables (space to toggle, enter to confirm)")
                .items(&labels)
                .interact()?;
            if picked.is_empty() {
                None
            } else {
                Some(CleanSelection::Tables(
                    picked.into_iter().map(|i| stats[i].name.clone()).collect(),
                ))
            }
        }
        _ => None,
    };
    Ok(selection)
}

async fn clean_tables(
    state: &AppState,
    selection: Option<CleanSelection>,
    backup: bool,
    yes: bool,
    json: bool,
) -> Result<ExitCode> {
    let stats = state.cleaner_service.table_stats().await.context("failed to read tables")?;
    let existing: Vec<String> = stats.iter().map(|t| t.name.clone()).collect();

    let selection = match selection {
        Some(selection) => selection,
        None if yes || json => bail!("no tables selected; name tables or use --logs, --business or --all"),
        None => match choose_selection(&stats)? {
            Some(selection) => selection,
            None => {
                output::cancelled();
                return Ok(ExitCode::SUCCESS);
            }
        },
    };
    if selection == CleanSelection::All && !yes && !json {
        output::warn(format!("{}", style("Every table in the database will be emptied.").red().bold()));
    }

    let (selected, missing) = selection.resolve(&existing);
    if !json {
        for name in &missing {
            output::warn(format!("Table '{name}' does not exist, skipping"));
        }
    }
    if selected.is_empty() {
        if let Some(first) = missing.into_iter().next() {
            return Err(CleanError::UnknownTable(first).into());
        }
        output::info("Nothing to clean.");
        return Ok(ExitCode::SUCCESS);
    }

    if !json {
        println!();
        let mut table = output::new_table(&["Table", "Rows", "Importance", "Category"]);
        for t in stats.iter().filter(|t| selected.contains(&t.name)) {
            table.add_row(vec![
                Cell::new(&t.name).fg(Color::Cyan),
                Cell::new(output::format_count(t.rows)),
                Cell::new(t.importance).fg(importance_color(t.importance)),
                Cell::new(t.category),
            ]);
        }
        println!("{table}");
        println!();
        if backup {
            output::info(format!(
                "SQL backups go to {}",
                style(state.config.backup.dir.join("clean_<timestamp>").display()).cyan()
            ));
        } else {
            output::warn("No backups will be written.");
        }
    }

    let confirmed = if requires_typed_confirmation(&selected) {
        if !yes {
            output::warn(format!("{}", style("The selection includes CRITICAL tables.").red().bold()));
        }
        output::confirm_phrase(format!("Clean {} table(s)", selected.len()), "CLEAN", yes)?
    } else {
        output::confirm(format!("Clean {} table(s)?", selected.len()), yes)?
    };
    if !confirmed {
        output::cancelled();
        return Ok(ExitCode::SUCCESS);
    }

    let spinner = output::spinner("Cleaning tables...", json)?;
    let report = state.cleaner_service.clean(&selected, backup).await;
    spinner.finish_and_clear();
    let report = report.context("clean failed")?;

    if json {
        output::print_json(&report)?;
    } else {
        println!();
        let mut table = output::new_table(&["", "Table", "Rows removed", "Backup / error"]);
        for outcome in &report.outcomes {
            let detail = match (&outcome.error, &outcome.backup_file) {
                (Some(error), _) => Cell::new(error).fg(Color::Red),
                (None, Some(file)) => Cell::new(file).fg(Color::DarkGrey),
                (None, None) => Cell::new(""),
            };
            table.add_row(vec![
                if outcome.success {
                    Cell::new("✓").fg(Color::Green)
                } else {
                    Cell::new("✗").fg(Color::Red)
                },
                Cell::new(&outcome.table).fg(Color::Cyan),
                Cell::new(output::format_count(outcome.rows_removed)),
                detail,
            ]);
        }
        println!("{table}");
        println!();
        output::success(format!(
            "Cleaned {}/{} table(s), {} row(s) removed",
            report.succeeded(),
            report.outcomes.len(),
            output::format_count(report.rows_removed())
        ));
        if let Some(dir) = &report.backup_dir {
            output::info(format!("Backups: {}", style(dir.display()).cyan()));
        }

        let notes = post_clean_notes(&report.outcomes);
        if !notes.is_empty() {
            println!();
            println!("  {}", style("Next steps").bold());
            for (table, note) in notes {
                println!("    {} {note}", style(format!("{table}:")).yellow());
            }
        }
        println!();
    }

    Ok(if report.succeeded() == report.outcomes.len() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn reset_channels(state: &AppState, options: ResetOptions, yes: bool, json: bool) -> Result<ExitCode> {
    let current = state.channel_service.count().await.context("failed to count channels")?;

    if !json {
        println!();
        output::info(format!("{} channel(s) in the database", style(current).bold()));
        println!();
        println!("  {}", style("Planned operations").bold());
        if options.backup {
            println!(
                "    1. Back up channels to {}",
                style(state.channel_service.backup_dir().join("reset_backup_<timestamp>.json").display()).cyan()
            );
        }
        if options.reset {
            println!("    {}. Delete every channel", if options.backup { 2 } else { 1 });
        }
        println!();
        if options.reset && !options.backup {
            output::warn(format!(
                "{}",
                style("No backup will be written. Deleted channels cannot be recovered.").red().bold()
            ));
        }
    }

    if options.dry_run {
        let report = state.channel_service.reset(options).await?;
        if json {
            output::print_json(&report)?;
        } else {
            output::info("Dry run, nothing changed.");
            println!();
        }
        return Ok(ExitCode::SUCCESS);
    }

    if options.reset && !output::confirm_phrase("This deletes every channel", "RESET", yes)? {
        output::cancelled();
        return Ok(ExitCode::SUCCESS);
    }

    let spinner = output::spinner("Resetting channels...", json)?;
    let report = state.channel_service.reset(options).await;
    spinner.finish_and_clear();
    let report = report.context("reset failed")?;

    if json {
        output::print_json(&report)?;
        return Ok(ExitCode::SUCCESS);
    }

    if let Some(backup) = &report.backup {
        output::success(format!(
            "Backed up {} channel(s) to {}",
            backup.channels,
            style(backup.path.display()).cyan()
        ));
    }
    if options.reset {
        output::success(format!("Deleted {} channel(s)", report.deleted));
        if let Some(backup) = &report.backup {
            output::info(format!(
                "Restore with: chanops channel restore {}",
                backup.path.display()
            ));
        }
    }
    println!();
    Ok(ExitCode::SUCCESS)
}

async fn list_backups(state: &AppState, json: bool) -> Result<ExitCode> {
    let backups = state.channel_service.list_backups().await.context("failed to list backups")?;

    if json {
        let entries: Vec<_> = backups
            .iter()
            .map(|b| {
                serde_json::json!({
                    "name": b.file_name(),
                    "path": b.path,
                    "size": b.size,
                    "modified": b.modified.map(|m| m.to_rfc3339()),
                })
            })
            .collect();
        output::print_json(&entries)?;
        return Ok(ExitCode::SUCCESS);
    }

    println!();
    if backups.is_empty() {
        output::info(format!(
            "No backups in {}",
            style(state.channel_service.backup_dir().display()).cyan()
        ));
        println!();
        return Ok(ExitCode::SUCCESS);
    }

    let mut table = output::new_table(&["File", "Size", "Modified"]);
    for backup in &backups {
        let modified = backup
            .modified
            .map(|m| m.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        table.add_row(vec![
            Cell::new(backup.file_name()).fg(Color::Cyan),
            Cell::new(output::format_size(backup.size)),
            Cell::new(modified).fg(Color::DarkGrey),
        ]);
    }
    println!("  Backups in {}", style(state.channel_service.backup_dir().display()).cyan());
    println!("{table}");
    println!();
    Ok(ExitCode::SUCCESS)
}
