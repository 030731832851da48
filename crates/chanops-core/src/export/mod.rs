//! Renderers for every file the tool writes.
//!
//! Rendering is pure: each function turns domain values into a `String`, and
//! the services decide where it lands.

pub mod channels;
pub mod keys;
pub mod report;
pub mod sql;

use std::fmt;
use std::str::FromStr;

/// Output format of `channel export`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
    Txt,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Txt => "txt",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            "txt" | "text" => Ok(ExportFormat::Txt),
            other => Err(format!("invalid export format: '{other}' (expected json, csv or txt)")),
        }
    }
}

/// Output format of `keys export`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyExportFormat {
    /// One key per line.
    #[default]
    Simple,
    /// Keys annotated with their source channel.
    Detailed,
    Csv,
}

impl KeyExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            KeyExportFormat::Csv => "csv",
            KeyExportFormat::Simple | KeyExportFormat::Detailed => "txt",
        }
    }
}

impl fmt::Display for KeyExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyExportFormat::Simple => write!(f, "simple"),
            KeyExportFormat::Detailed => write!(f, "detailed"),
            KeyExportFormat::Csv => write!(f, "csv"),
        }
    }
}

impl FromStr for KeyExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "simple" => Ok(KeyExportFormat::Simple),
            "detailed" => Ok(KeyExportFormat::Detailed),
            "csv" => Ok(KeyExportFormat::Csv),
            other => Err(format!(
                "invalid key export format: '{other}' (expected simple, detailed or csv)"
            )),
        }
    }
}
