//! `chanops check`: is the database container up, and can we reach it?

use std::process::ExitCode;

use anyhow::Result;
use console::style;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use chanops_core::repository::channel::ChannelRepository;
use chanops_infra::process::compose_service_status;
use chanops_infra::sql::channel::SqlChannelRepository;
use chanops_infra::sql::dsn::mask_dsn;
use chanops_infra::sql::pool::DatabasePool;
use chanops_types::config::ChanopsConfig;

use super::output;

#[derive(Debug, Serialize)]
struct CheckReport {
    compose_file: String,
    service: String,
    tool: Option<String>,
    service_running: bool,
    service_error: Option<String>,
    dsn: String,
    backend: Option<String>,
    database_ok: bool,
    channels: Option<i64>,
    database_error: Option<String>,
}

impl CheckReport {
    fn healthy(&self) -> bool {
        self.service_running && self.database_ok
    }
}

pub async fn run_check(config: &ChanopsConfig, dsn: &SecretString, json: bool) -> Result<ExitCode> {
    let compose = &config.compose;
    let mut report = CheckReport {
        compose_file: compose.file.display().to_string(),
        service: compose.service.clone(),
        tool: None,
        service_running: false,
        service_error: None,
        dsn: mask_dsn(dsn.expose_secret()),
        backend: None,
        database_ok: false,
        channels: None,
        database_error: None,
    };

    let spinner = output::spinner("Checking containers...", json)?;
    match compose_service_status(&compose.file, &compose.service).await {
        Ok(status) => {
            report.tool = Some(status.tool);
            report.service_running = status.running;
        }
        Err(e) => report.service_error = Some(format!("docker compose unavailable: {e}")),
    }

    spinner.set_message("Connecting to the database...");
    match DatabasePool::connect(dsn, 1).await {
        Ok(pool) => {
            report.backend = Some(pool.backend.to_string());
            let repo = SqlChannelRepository::new(pool.clone());
            match repo.count().await {
                Ok(count) => {
                    report.database_ok = true;
                    report.channels = Some(count);
                }
                Err(e) => report.database_error = Some(e.to_string()),
            }
            pool.close().await;
        }
        Err(e) => report.database_error = Some(e.to_string()),
    }
    spinner.finish_and_clear();

    if json {
        output::print_json(&report)?;
    } else {
        print_report(&report);
    }
    Ok(if report.healthy() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn print_report(report: &CheckReport) {
    println!();
    println!("  {}", style("Deployment check").bold().underlined());
    println!();

    let service = style(&report.service).cyan();
    match (&report.service_error, report.service_running) {
        (Some(error), _) => output::failure(error),
        (None, true) => output::success(format!(
            "Service {service} is up ({})",
            report.tool.as_deref().unwrap_or("compose")
        )),
        (None, false) => output::failure(format!(
            "Service {service} is not running (compose file: {})",
            report.compose_file
        )),
    }

    output::info(format!("DSN: {}", style(&report.dsn).dim()));
    match (&report.database_error, report.channels) {
        (Some(error), _) => output::failure(format!("Database unreachable: {error}")),
        (None, Some(count)) => output::success(format!(
            "{} reachable, {} channel(s)",
            report.backend.as_deref().unwrap_or("database"),
            style(count).bold()
        )),
        (None, None) => output::failure("Database check did not complete"),
    }
    println!();
}
