//! Model subcommands.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Subcommand;
use comfy_table::{Cell, Color};
use console::style;

use chanops_core::service::models::{GEMINI_25_MODELS, TESTER_MODELS};

use super::output;
use crate::state::AppState;

#[derive(Subcommand)]
pub enum ModelsCommand {
    /// List the models the key tester knows.
    #[command(alias = "ls")]
    List,

    /// Set the model list of Gemini channels to the Gemini 2.5 models.
    Update {
        /// Channel type to update (repeatable; default: configured Gemini types).
        #[arg(long = "type")]
        types: Vec<i64>,

        /// Show the changes without writing them.
        #[arg(long)]
        dry_run: bool,

        /// Skip the confirmation prompt.
        #[arg(long, short)]
        yes: bool,
    },
}

pub async fn handle_models_command(cmd: ModelsCommand, state: &AppState, json: bool) -> Result<ExitCode> {
    match cmd {
        ModelsCommand::List => list_models(json),
        ModelsCommand::Update { types, dry_run, yes } => update_models(state, &types, dry_run, yes, json).await,
    }
}

fn list_models(json: bool) -> Result<ExitCode> {
    if json {
        output::print_json(TESTER_MODELS)?;
        return Ok(ExitCode::SUCCESS);
    }
    println!();
    println!("  {}", style("Supported test models").bold());
    for (i, model) in TESTER_MODELS.iter().enumerate() {
        println!("  {:>2}. {}", i + 1, style(model).cyan());
    }
    println!();
    Ok(ExitCode::SUCCESS)
}

async fn update_models(state: &AppState, types: &[i64], dry_run: bool, yes: bool, json: bool) -> Result<ExitCode> {
    let types = state.gemini_types(types);
    let plans = state
        .model_service
        .plan_update(&types, GEMINI_25_MODELS)
        .await
        .context("failed to load channels")?;
    let pending = plans.iter().filter(|p| p.changed).count();

    if !json {
        println!();
        if plans.is_empty() {
            output::warn(format!("No channels of type {types:?} found."));
            println!();
            return Ok(ExitCode::SUCCESS);
        }

        let mut table = output::new_table(&["ID", "Name", "Current models", "Action"]);
        for plan in &plans {
            let action = if plan.changed {
                Cell::new("update").fg(Color::Yellow)
            } else {
                Cell::new("up to date").fg(Color::Green)
            };
            table.add_row(vec![
                Cell::new(plan.channel_id),
                Cell::new(&plan.channel_name).fg(Color::Cyan),
                Cell::new(output::truncate(&plan.current, 70)).fg(Color::DarkGrey),
                action,
            ]);
        }
        println!("{table}");
        println!();
        println!("  New model list: {}", style(GEMINI_25_MODELS.join(",")).cyan());
        println!();
    }

    if dry_run || pending == 0 {
        if json {
            output::print_json(&serde_json::json!({ "dry_run": dry_run, "plans": plans }))?;
        } else if pending == 0 {
            output::success("All channels are up to date.");
            println!();
        } else {
            output::info(format!("Dry run: {pending} channel(s) would be updated."));
            println!();
        }
        return Ok(ExitCode::SUCCESS);
    }

    if !output::confirm(format!("Update the model list of {pending} channel(s)?"), yes)? {
        output::cancelled();
        return Ok(ExitCode::SUCCESS);
    }

    let report = state.model_service.apply(&plans).await;
    if json {
        output::print_json(&report)?;
    } else {
        output::success(format!(
            "Updated {} channel(s), {} already up to date",
            report.updated, report.unchanged
        ));
        for error in &report.errors {
            output::failure(error);
        }
        println!();
    }
    Ok(if report.failed == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
