//! Shared terminal helpers: tables, spinners, prompts and formatting.

use std::time::Duration;

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use dialoguer::{Confirm, Input};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

/// Table with the house style and a white header row.
pub fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(headers.iter().map(|h| Cell::new(h).fg(Color::White)).collect::<Vec<_>>());
    table
}

/// Steady-ticking spinner on stderr. Hidden in JSON mode.
pub fn spinner(message: impl Into<String>, json: bool) -> Result<ProgressBar> {
    if json {
        return Ok(ProgressBar::hidden());
    }
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.set_message(message.into());
    spinner.enable_steady_tick(Duration::from_millis(80));
    Ok(spinner)
}

/// y/N prompt. `yes` answers it without asking.
pub fn confirm(prompt: impl Into<String>, yes: bool) -> Result<bool> {
    if yes {
        return Ok(true);
    }
    Ok(Confirm::new().with_prompt(prompt.into()).default(false).interact()?)
}

/// Prompt that only passes when the operator types `word` exactly.
pub fn confirm_phrase(prompt: impl Into<String>, word: &str, yes: bool) -> Result<bool> {
    if yes {
        return Ok(true);
    }
    let typed: String = Input::new()
        .with_prompt(format!("{} (type {word} to continue)", prompt.into()))
        .allow_empty(true)
        .interact_text()?;
    Ok(typed.trim() == word)
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn cancelled() {
    println!("  Cancelled.");
}

pub fn success(message: impl std::fmt::Display) {
    println!("  {} {message}", style("✓").green().bold());
}

pub fn info(message: impl std::fmt::Display) {
    println!("  {} {message}", style("i").blue().bold());
}

pub fn warn(message: impl std::fmt::Display) {
    println!("  {} {message}", style("!").yellow().bold());
}

pub fn failure(message: impl std::fmt::Display) {
    println!("  {} {message}", style("✗").red().bold());
}

/// Format bytes into a human-readable size string.
pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Thousands-separated count, e.g. `12,345`.
pub fn format_count(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if n < 0 {
        out.insert(0, '-');
    }
    out
}

/// Truncate to `max` characters with a trailing ellipsis.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let head: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{head}...")
    }
}
