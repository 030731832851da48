//! Timestamp formatting shared by reports, backups and generated file names.

use chrono::{DateTime, Local, TimeZone};

/// Human-readable local time: `2025-01-31 14:05:09`.
pub fn display_timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Compact local time for file names: `20250131_140509`.
pub fn file_timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Format a unix timestamp (seconds) as local time. Zero means "never" and
/// renders empty.
pub fn format_unix(secs: i64) -> String {
    if secs == 0 {
        return String::new();
    }
    match Local.timestamp_opt(secs, 0).single() {
        Some(dt) => format_local(&dt),
        None => secs.to_string(),
    }
}

fn format_local(dt: &DateTime<Local>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}
