//! Key subcommands: export keys from channels and validate them in bulk.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use console::style;

use chanops_core::export::KeyExportFormat;
use chanops_core::export::keys::render_simple;
use chanops_core::export::report::render_key_results;
use chanops_core::probe::KeyProbe;
use chanops_core::probe::runner::KeyCandidate;
use chanops_core::service::keys::{KeyExportSummary, KeyPrunePlan, PruneReport};
use chanops_types::backup::SOURCE_BACKUP;
use chanops_types::channel::mask_key_preview;
use chanops_types::probe::{KeyTestResult, TestSummary};
use chanops_types::time::{display_timestamp, file_timestamp};

use super::output;
use crate::state::AppState;

#[derive(Subcommand)]
pub enum KeysCommand {
    /// Export keys stored in channels.
    Export {
        /// Channel type (repeatable; default: configured Gemini types).
        #[arg(long = "type")]
        types: Vec<i64>,

        /// Only channels with this status code (default: enabled only).
        #[arg(long)]
        status: Option<i64>,

        /// Include keys from disabled channels.
        #[arg(long, conflicts_with = "status")]
        include_disabled: bool,

        /// Output format: simple, detailed or csv.
        #[arg(long, short, default_value = "simple")]
        format: KeyExportFormat,

        /// Output path (default: api_keys_<timestamp>.<ext>).
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Validate keys from the database or from a file.
    Test {
        /// Read keys from this file (one per line, `#` comments allowed).
        #[arg(long)]
        from_file: Option<PathBuf>,

        /// Channel type when reading from the database (repeatable).
        #[arg(long = "type", conflicts_with = "from_file")]
        types: Vec<i64>,

        /// Include keys from disabled channels.
        #[arg(long, conflicts_with = "from_file")]
        include_disabled: bool,

        /// Write the extracted keys to exported_keys_<timestamp>.txt first.
        #[arg(long, conflicts_with = "from_file")]
        export_first: bool,

        /// Model to test with (default: [tester] model).
        #[arg(long, short)]
        model: Option<String>,

        /// Concurrent probes (default: [tester] workers).
        #[arg(long, short)]
        workers: Option<usize>,

        /// Write a text report to this file.
        #[arg(long)]
        save_results: Option<PathBuf>,

        /// Remove rejected keys from their channels afterwards.
        #[arg(long, conflicts_with = "from_file")]
        remove_invalid: bool,

        /// Skip the confirmation prompt.
        #[arg(long, short)]
        yes: bool,
    },

    /// Probe a single key.
    Probe {
        /// The API key.
        key: String,

        /// Model to test with (default: [tester] model).
        #[arg(long, short)]
        model: Option<String>,
    },
}

pub async fn handle_keys_command(cmd: KeysCommand, state: &AppState, json: bool) -> Result<ExitCode> {
    match cmd {
        KeysCommand::Export {
            types,
            status,
            include_disabled,
            format,
            output,
        } => {
            let status = status.or((!include_disabled).then_some(1));
            export_keys(state, &types, status, format, output, json).await
        }
        KeysCommand::Test {
            from_file,
            types,
            include_disabled,
            export_first,
            model,
            workers,
            save_results,
            remove_invalid,
            yes,
        } => {
            let options = KeyTestOptions {
                from_file,
                types,
                status: (!include_disabled).then_some(1),
                export_first,
                model,
                workers,
                save_results,
                remove_invalid,
                yes,
            };
            test_keys(state, options, json).await
        }
        KeysCommand::Probe { key, model } => probe_key(state, &key, model.as_deref(), json).await,
    }
}

async fn export_keys(
    state: &AppState,
    types: &[i64],
    status: Option<i64>,
    format: KeyExportFormat,
    path: Option<PathBuf>,
    json: bool,
) -> Result<ExitCode> {
    let filter = state.gemini_filter(types, status);
    let keys = state.key_service.extract(&filter).await.context("failed to read channels")?;
    if keys.is_empty() {
        if json {
            output::print_json(&serde_json::json!({ "total_keys": 0 }))?;
        } else {
            println!();
            output::warn("No keys found for the selected channels.");
            println!();
        }
        return Ok(ExitCode::SUCCESS);
    }

    let result = state
        .key_service
        .export(&keys, format, path)
        .await
        .context("failed to export keys")?;

    if json {
        output::print_json(&result)?;
        return Ok(ExitCode::SUCCESS);
    }

    println!();
    output::success(format!(
        "Exported {} key(s) as {} to {}",
        style(result.summary.total_keys).bold(),
        result.format,
        style(result.path.display()).cyan()
    ));
    print_export_summary(&result.summary);
    Ok(ExitCode::SUCCESS)
}

fn print_export_summary(summary: &KeyExportSummary) {
    println!();
    println!("  Total keys:        {}", summary.total_keys);
    println!("  Unique channels:   {}", summary.unique_channels);
    println!("  From enabled:      {}", style(summary.enabled).green());
    println!("  From disabled:     {}", style(summary.disabled).yellow());
    if !summary.samples.is_empty() {
        println!();
        println!("  {}", style("Samples").bold());
        for sample in &summary.samples {
            println!("    {}", style(sample).dim());
        }
    }
    println!();
}

struct KeyTestOptions {
    from_file: Option<PathBuf>,
    types: Vec<i64>,
    status: Option<i64>,
    export_first: bool,
    model: Option<String>,
    workers: Option<usize>,
    save_results: Option<PathBuf>,
    remove_invalid: bool,
    yes: bool,
}

async fn test_keys(state: &AppState, options: KeyTestOptions, json: bool) -> Result<ExitCode> {
    let candidates: Vec<KeyCandidate> = match &options.from_file {
        Some(path) => state
            .key_service
            .read_key_file(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?
            .into_iter()
            .map(KeyCandidate::bare)
            .collect(),
        None => {
            let filter = state.gemini_filter(&options.types, options.status);
            let keys = state.key_service.extract(&filter).await.context("failed to read channels")?;
            if options.export_first && !keys.is_empty() {
                let path = PathBuf::from(format!("exported_keys_{}.txt", file_timestamp()));
                let content = render_simple(keys.iter().map(|k| k.api_key.as_str()));
                state.key_service.write(&path, &content).await?;
                if !json {
                    println!();
                    output::success(format!("Exported {} key(s) to {}", keys.len(), style(path.display()).cyan()));
                }
            }
            keys.into_iter().map(KeyCandidate::from).collect()
        }
    };

    if candidates.is_empty() {
        if json {
            output::print_json(&TestSummary::from_records::<KeyTestResult>(&[]))?;
        } else {
            println!();
            output::warn("No keys to test.");
            println!();
        }
        return Ok(ExitCode::FAILURE);
    }

    let tester = state.tester(options.workers)?;
    let model = options.model.clone().unwrap_or_else(|| tester.default_model().to_string());
    if !json {
        println!();
        output::info(format!(
            "Testing {} key(s) with {} using {} worker(s)",
            style(candidates.len()).bold(),
            style(&model).cyan(),
            tester.workers()
        ));
        println!();
    }

    let results = tester
        .test_keys(candidates, Some(model.as_str()), |done, total, result| {
            if !json {
                print_key_progress(done, total, result);
            }
        })
        .await;
    let summary = TestSummary::from_records(&results);

    if let Some(path) = &options.save_results {
        let report = render_key_results(&results, &model, &display_timestamp());
        state
            .key_service
            .write(path, &report)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    let prune = if options.remove_invalid {
        remove_invalid_keys(state, &results, options.yes, json).await?
    } else {
        None
    };

    if json {
        output::print_json(&serde_json::json!({
            "model": model,
            "summary": summary,
            "results": masked_results(&results),
            "pruning": prune,
        }))?;
    } else {
        println!();
        println!("  {}", style("Summary").bold().underlined());
        println!("  Total keys:     {}", summary.total);
        println!("  Valid:          {}", style(summary.successful).green());
        println!("  Invalid:        {}", style(summary.failed).red());
        println!("  Success rate:   {:.1}%", summary.success_rate);
        if let Some(avg) = summary.average_response_ms {
            println!("  Avg response:   {avg:.0} ms");
        }
        println!();
        if let Some(path) = &options.save_results {
            output::success(format!("Results written to {}", style(path.display()).cyan()));
            println!();
        }
    }

    Ok(if summary.successful > 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn print_key_progress(done: usize, total: usize, result: &KeyTestResult) {
    let verdict = if result.result.success {
        style("VALID").green().bold()
    } else {
        style("INVALID").red().bold()
    };
    println!(
        "  [{done}/{total}] {verdict} key #{} ({}): {} ({} ms)",
        result.index,
        mask_key_preview(&result.key),
        result.result.message,
        result.result.response_time_ms
    );
}

fn masked_results(results: &[KeyTestResult]) -> Vec<KeyTestResult> {
    results
        .iter()
        .map(|r| {
            let mut masked = r.clone();
            masked.key = mask_key_preview(&r.key);
            if let Some(source) = masked.source.as_mut() {
                source.api_key = masked.key.clone();
            }
            masked
        })
        .collect()
}

/// Plan, confirm, snapshot and apply key pruning.
async fn remove_invalid_keys(
    state: &AppState,
    results: &[KeyTestResult],
    yes: bool,
    json: bool,
) -> Result<Option<PruneReport>> {
    let plans = state
        .key_service
        .plan_pruning(results)
        .await
        .context("failed to plan key cleanup")?;
    if plans.is_empty() {
        if !json {
            output::info("No rejected keys to remove.");
            println!();
        }
        return Ok(None);
    }

    if !json {
        print_prune_plan(&plans);
    }
    let removed: usize = plans.iter().map(|p| p.removed.len()).sum();
    if !output::confirm(
        format!("Remove {removed} key(s) from {} channel(s)?", plans.len()),
        yes,
    )? {
        output::cancelled();
        return Ok(None);
    }

    let snapshot = state
        .channel_service
        .snapshot("pre_cleanup_backup", SOURCE_BACKUP)
        .await
        .context("failed to write the pre-cleanup backup, nothing was changed")?;
    if !json {
        output::success(format!(
            "Backed up {} channel(s) to {}",
            snapshot.channels,
            style(snapshot.path.display()).cyan()
        ));
    }

    let report = state.key_service.apply_pruning(&plans).await;
    if !json {
        output::success(format!(
            "Removed {} key(s) from {} channel(s), {} channel(s) disabled",
            report.keys_removed, report.channels_updated, report.channels_disabled
        ));
        for error in &report.errors {
            output::failure(error);
        }
        println!();
    }
    if report.channels_updated == 0 && report.failed > 0 {
        bail!("key cleanup failed for every channel");
    }
    Ok(Some(report))
}

fn print_prune_plan(plans: &[KeyPrunePlan]) {
    println!();
    println!("  {}", style("Key cleanup plan").bold().underlined());
    for plan in plans {
        let action = if plan.disable {
            style("no keys left, will be disabled").red().to_string()
        } else {
            format!("{} key(s) left", plan.remaining.len())
        };
        println!(
            "  [{}] {}: remove {} key(s), {action}",
            plan.channel_id,
            style(&plan.channel_name).cyan(),
            plan.removed.len()
        );
        for key in &plan.removed {
            println!("      - {}", style(mask_key_preview(key)).dim());
        }
    }
    println!();
}

async fn probe_key(state: &AppState, key: &str, model: Option<&str>, json: bool) -> Result<ExitCode> {
    let key = key.trim();
    if key.is_empty() {
        bail!("the key is empty");
    }
    let model = model.unwrap_or(state.config.tester.model.as_str());
    let probe = state.probe()?;

    let spinner = output::spinner(format!("Probing key with {model}..."), json)?;
    let result = probe.probe(key, model, None).await;
    spinner.finish_and_clear();

    if json {
        output::print_json(&serde_json::json!({
            "key": mask_key_preview(key),
            "model": model,
            "result": result,
        }))?;
    } else {
        println!();
        let line = format!("{} ({} ms)", result.message, result.response_time_ms);
        if result.success {
            output::success(line);
        } else {
            output::failure(line);
        }
        println!();
    }
    Ok(if result.success { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
