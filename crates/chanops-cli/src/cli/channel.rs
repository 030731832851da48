//! Channel subcommands: list, count, export, backup, import, restore, test.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Subcommand;
use comfy_table::{Cell, Color};
use console::style;

use chanops_core::export::ExportFormat;
use chanops_core::service::channel::ImportOptions;
use chanops_types::backup::ImportReport;
use chanops_types::channel::ChannelFilter;
use chanops_types::probe::{ChannelTestResult, TestSummary};

use super::output;
use crate::state::AppState;

#[derive(Subcommand)]
pub enum ChannelCommand {
    /// List channels.
    #[command(alias = "ls")]
    List {
        /// Only channels of this type (repeatable).
        #[arg(long = "type")]
        types: Vec<i64>,

        /// Only channels with this status code.
        #[arg(long)]
        status: Option<i64>,
    },

    /// Print the number of channels.
    Count,

    /// Export channels to JSON, CSV or TXT.
    Export {
        /// Only channels of this type (repeatable).
        #[arg(long = "type")]
        types: Vec<i64>,

        /// Only channels with this status code.
        #[arg(long)]
        status: Option<i64>,

        /// Output format: json, csv or txt.
        #[arg(long, short, default_value = "json")]
        format: ExportFormat,

        /// Output path (default: channels_export_<timestamp>.<ext>).
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Write keys and other secrets in clear text.
        #[arg(long)]
        no_mask: bool,
    },

    /// Write a full, unmasked JSON backup of every channel.
    Backup {
        /// Output path (default: <backup dir>/channels_backup_<timestamp>.json).
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Merge channels from a backup file.
    Import {
        /// Backup file to read.
        file: PathBuf,

        /// Overwrite channels that already exist.
        #[arg(long)]
        update_existing: bool,

        /// Report what would change without writing.
        #[arg(long)]
        dry_run: bool,

        /// Skip the confirmation prompt.
        #[arg(long, short)]
        yes: bool,
    },

    /// Replace every channel with the contents of a backup file.
    Restore {
        /// Backup file to read.
        file: PathBuf,

        /// Show the backup without changing anything.
        #[arg(long)]
        dry_run: bool,

        /// Skip the confirmation prompt.
        #[arg(long, short)]
        yes: bool,
    },

    /// Probe channel keys against the Gemini API.
    Test {
        /// Test a single channel.
        #[arg(long)]
        channel_id: Option<i64>,

        /// Channel type to test (repeatable; default: configured Gemini types).
        #[arg(long = "type", conflicts_with = "channel_id")]
        types: Vec<i64>,

        /// Only channels with this status code.
        #[arg(long)]
        status: Option<i64>,

        /// Model to test with (default: resolved per channel).
        #[arg(long, short)]
        model: Option<String>,

        /// Concurrent probes (default: [tester] workers).
        #[arg(long, short)]
        workers: Option<usize>,

        /// Write the results as JSON to this file.
        #[arg(long)]
        export: Option<PathBuf>,
    },
}

pub async fn handle_channel_command(cmd: ChannelCommand, state: &AppState, json: bool) -> Result<ExitCode> {
    match cmd {
        ChannelCommand::List { types, status } => list_channels(state, types, status, json).await,
        ChannelCommand::Count => count_channels(state, json).await,
        ChannelCommand::Export {
            types,
            status,
            format,
            output,
            no_mask,
        } => {
            let filter = ChannelFilter {
                id: None,
                types,
                status,
            };
            export_channels(state, &filter, format, output, !no_mask, json).await
        }
        ChannelCommand::Backup { output } => backup_channels(state, output, json).await,
        ChannelCommand::Import {
            file,
            update_existing,
            dry_run,
            yes,
        } => import_channels(state, file, update_existing, dry_run, yes, json).await,
        ChannelCommand::Restore { file, dry_run, yes } => restore_channels(state, file, dry_run, yes, json).await,
        ChannelCommand::Test {
            channel_id,
            types,
            status,
            model,
            workers,
            export,
        } => {
            let filter = match channel_id {
                Some(id) => ChannelFilter {
                    id: Some(id),
                    types: Vec::new(),
                    status,
                },
                None => state.gemini_filter(&types, status),
            };
            test_channels(state, &filter, model.as_deref(), workers, export, json).await
        }
    }
}

async fn list_channels(state: &AppState, types: Vec<i64>, status: Option<i64>, json: bool) -> Result<ExitCode> {
    let filter = ChannelFilter { id: None, types, status };
    let channels = state.channel_service.list(&filter).await.context("failed to list channels")?;

    if json {
        let masked: Vec<_> = channels.iter().map(|c| c.masked()).collect();
        output::print_json(&masked)?;
        return Ok(ExitCode::SUCCESS);
    }

    if channels.is_empty() {
        println!();
        output::info("No channels found.");
        println!();
        return Ok(ExitCode::SUCCESS);
    }

    let mut table = output::new_table(&["ID", "Name", "Type", "Status", "Keys", "Models"]);
    for channel in &channels {
        let status_color = match channel.status {
            1 => Color::Green,
            2 | 3 => Color::Red,
            _ => Color::DarkGrey,
        };
        table.add_row(vec![
            Cell::new(channel.id),
            Cell::new(&channel.name).fg(Color::Cyan),
            Cell::new(channel.type_name()),
            Cell::new(channel.status_name()).fg(status_color),
            Cell::new(channel.keys().len()),
            Cell::new(output::truncate(&channel.models, 60)).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!("  {} channel(s)", style(channels.len()).bold());
    println!();
    Ok(ExitCode::SUCCESS)
}

async fn count_channels(state: &AppState, json: bool) -> Result<ExitCode> {
    let count = state.channel_service.count().await.context("failed to count channels")?;
    if json {
        output::print_json(&serde_json::json!({ "channels": count }))?;
    } else {
        println!();
        output::info(format!("{} channel(s) in the database", style(count).bold()));
        println!();
    }
    Ok(ExitCode::SUCCESS)
}

async fn export_channels(
    state: &AppState,
    filter: &ChannelFilter,
    format: ExportFormat,
    path: Option<PathBuf>,
    mask: bool,
    json: bool,
) -> Result<ExitCode> {
    let spinner = output::spinner("Exporting channels...", json)?;
    let written = state.channel_service.export(filter, format, mask, path).await;
    spinner.finish_and_clear();
    let written = written.context("failed to export channels")?;

    if json {
        output::print_json(&serde_json::json!({
            "path": written.path,
            "channels": written.channels,
            "format": format.to_string(),
            "masked": mask,
        }))?;
        return Ok(ExitCode::SUCCESS);
    }

    println!();
    output::success(format!(
        "Exported {} channel(s) to {}",
        style(written.channels).bold(),
        style(written.path.display()).cyan()
    ));
    if !mask {
        output::warn("Secrets are written in clear text. Keep this file safe.");
    }
    println!();
    Ok(ExitCode::SUCCESS)
}

async fn backup_channels(state: &AppState, path: Option<PathBuf>, json: bool) -> Result<ExitCode> {
    let spinner = output::spinner("Backing up channels...", json)?;
    let written = state.channel_service.backup(path).await;
    spinner.finish_and_clear();
    let written = written.context("failed to back up channels")?;

    if json {
        output::print_json(&written)?;
    } else {
        println!();
        output::success(format!(
            "Backed up {} channel(s) to {}",
            style(written.channels).bold(),
            style(written.path.display()).cyan()
        ));
        println!();
    }
    Ok(ExitCode::SUCCESS)
}

async fn import_channels(
    state: &AppState,
    file: PathBuf,
    update_existing: bool,
    dry_run: bool,
    yes: bool,
    json: bool,
) -> Result<ExitCode> {
    let backup = state
        .channel_service
        .load_backup(&file)
        .await
        .with_context(|| format!("failed to read backup {}", file.display()))?;

    let options = ImportOptions {
        update_existing,
        dry_run: true,
    };

    if !dry_run && !yes {
        let preview = state.channel_service.import(&backup, options).await?;
        print_import_report(&preview);
        if !output::confirm(format!("Import {} channel(s)?", preview.success), false)? {
            output::cancelled();
            return Ok(ExitCode::SUCCESS);
        }
    }

    let report = state
        .channel_service
        .import(&backup, ImportOptions { update_existing, dry_run })
        .await
        .context("import failed")?;

    if json {
        output::print_json(&report)?;
    } else {
        print_import_report(&report);
    }
    Ok(if report.failed == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn print_import_report(report: &ImportReport) {
    println!();
    if report.dry_run {
        output::info(format!("{}", style("Dry run, nothing written").yellow()));
    }
    println!("  Total:    {}", report.total);
    println!("  Success:  {}", style(report.success).green());
    println!("  Skipped:  {}", style(report.skipped).yellow());
    println!("  Failed:   {}", style(report.failed).red());
    for error in &report.errors {
        println!("    {} {error}", style("✗").red());
    }
    println!();
}

async fn restore_channels(state: &AppState, file: PathBuf, dry_run: bool, yes: bool, json: bool) -> Result<ExitCode> {
    let backup = state
        .channel_service
        .load_backup(&file)
        .await
        .with_context(|| format!("failed to read backup {}", file.display()))?;

    if !json {
        println!();
        println!("  Backup file:  {}", style(file.display()).cyan());
        println!("  Exported at:  {}", backup.export_time);
        println!("  Version:      {}", backup.export_version);
        println!("  Channels:     {}", style(backup.total_channels).bold());
        println!();
    }

    if !dry_run {
        if !json {
            output::warn("Restoring deletes every current channel first.");
        }
        if !output::confirm("Restore channels from this backup?", yes)? {
            output::cancelled();
            return Ok(ExitCode::SUCCESS);
        }
    }

    let spinner = output::spinner("Restoring channels...", json || dry_run)?;
    let report = state.channel_service.restore(&backup, dry_run).await;
    spinner.finish_and_clear();
    let report = report.context("restore failed")?;

    if json {
        output::print_json(&report)?;
        return Ok(if report.failed == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE });
    }

    if report.dry_run {
        output::info(format!(
            "Dry run: {} channel(s) would replace the current table.",
            report.total
        ));
        println!();
        return Ok(ExitCode::SUCCESS);
    }

    if let Some(snapshot) = &report.snapshot {
        output::info(format!("Pre-restore snapshot: {}", style(snapshot).cyan()));
    }
    output::info(format!("Deleted {} existing channel(s)", report.deleted));
    output::success(format!("Restored {}/{} channel(s)", report.restored, report.total));
    for error in &report.errors {
        output::failure(error);
    }
    println!();
    Ok(if report.failed == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

async fn test_channels(
    state: &AppState,
    filter: &ChannelFilter,
    model: Option<&str>,
    workers: Option<usize>,
    export: Option<PathBuf>,
    json: bool,
) -> Result<ExitCode> {
    let channels = state.channel_service.list(filter).await.context("failed to load channels")?;
    if channels.is_empty() {
        if json {
            output::print_json(&TestSummary::from_records::<ChannelTestResult>(&[]))?;
        } else {
            println!();
            output::warn("No channels match the selection.");
            println!();
        }
        return Ok(ExitCode::SUCCESS);
    }

    let tester = state.tester(workers)?;
    if !json {
        println!();
        output::info(format!(
            "Testing {} channel(s) with {} worker(s)",
            style(channels.len()).bold(),
            tester.workers()
        ));
        println!();
    }

    let results = tester
        .test_channels(channels, model, |done, total, result| {
            if !json {
                print_channel_progress(done, total, result);
            }
        })
        .await;
    let summary = TestSummary::from_records(&results);

    if let Some(path) = &export {
        state
            .channel_service
            .save_test_report(path, &results)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    if json {
        output::print_json(&serde_json::json!({
            "summary": summary,
            "results": results,
        }))?;
    } else {
        print_summary(&summary, "channels");
        if let Some(path) = &export {
            output::success(format!("Results written to {}", style(path.display()).cyan()));
            println!();
        }
    }

    Ok(if summary.all_passed() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn print_channel_progress(done: usize, total: usize, result: &ChannelTestResult) {
    let icon = if result.success { "✅" } else { "❌" };
    let key = match result.key_index {
        Some(index) => format!(" [key {index}/{}]", result.total_keys),
        None => String::new(),
    };
    println!(
        "  [{done}/{total}] {icon} {}{key}: {} ({} ms)",
        result.channel_name, result.message, result.response_time_ms
    );
}

/// Summary block shared by channel and key batches.
pub fn print_summary(summary: &TestSummary, noun: &str) {
    println!();
    println!("  {}", style("Summary").bold().underlined());
    println!("  Total {noun}:   {}", summary.total);
    println!("  Successful:     {}", style(summary.successful).green());
    println!("  Failed:         {}", style(summary.failed).red());
    println!("  Success rate:   {:.1}%", summary.success_rate);
    if let Some(avg) = summary.average_response_ms {
        println!("  Avg response:   {avg:.0} ms");
    }

    if !summary.failures.is_empty() {
        println!();
        println!("  {}", style("Failed").red().bold());
        for failure in &summary.failures {
            println!("    {} {}: {}", style("✗").red(), failure.label, failure.message);
        }
    }
    if !summary.fastest.is_empty() {
        println!();
        println!("  {}", style("Fastest").green().bold());
        for entry in &summary.fastest {
            println!("    {} ({} ms)", entry.label, entry.response_time_ms);
        }
    }
    if !summary.slowest.is_empty() {
        println!();
        println!("  {}", style("Slowest").yellow().bold());
        for entry in &summary.slowest {
            println!("    {} ({} ms)", entry.label, entry.response_time_ms);
        }
    }
    println!();
}
