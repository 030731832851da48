//! Configuration types for chanops.
//!
//! `ChanopsConfig` is the `config.toml` read at startup. Every section and
//! field has a default, so an empty file is a valid configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::channel::DEFAULT_TEST_MODEL;

/// DSN used when nothing else is configured.
pub const DEFAULT_DSN: &str = "root:123456@tcp(localhost:3306)/new-api";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChanopsConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub tester: TesterConfig,
    #[serde(default)]
    pub backup: BackupConfig,
    #[serde(default)]
    pub compose: ComposeConfig,
}

/// Database connection settings: either a full `dsn` or discrete MySQL fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub dsn: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl DatabaseConfig {
    /// Build a Go-style MySQL DSN from the discrete fields, if any are set.
    pub fn discrete_dsn(&self) -> Option<String> {
        if self.host.is_none() && self.user.is_none() && self.name.is_none() {
            return None;
        }
        Some(format!(
            "{}:{}@tcp({}:{})/{}",
            self.user.as_deref().unwrap_or("root"),
            self.password.as_deref().unwrap_or(""),
            self.host.as_deref().unwrap_or("localhost"),
            self.port.unwrap_or(3306),
            self.name.as_deref().unwrap_or("new-api"),
        ))
    }

    /// The configured DSN: explicit `dsn` wins over discrete fields.
    pub fn configured_dsn(&self) -> Option<String> {
        self.dsn
            .clone()
            .filter(|d| !d.trim().is_empty())
            .or_else(|| self.discrete_dsn())
    }
}

/// Defaults for the key tester.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TesterConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Override for the Gemini API base URL.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Channel types treated as Gemini channels when no type is given.
    #[serde(default = "default_gemini_types")]
    pub gemini_types: Vec<i64>,
}

fn default_model() -> String {
    DEFAULT_TEST_MODEL.to_string()
}

fn default_workers() -> usize {
    5
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_gemini_types() -> Vec<i64> {
    vec![24, 36]
}

impl Default for TesterConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            workers: default_workers(),
            timeout_secs: default_timeout_secs(),
            base_url: None,
            gemini_types: default_gemini_types(),
        }
    }
}

/// Where backups land.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupConfig {
    #[serde(default = "default_backup_dir")]
    pub dir: PathBuf,
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from("./backups")
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            dir: default_backup_dir(),
        }
    }
}

/// docker-compose deployment used by `check`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposeConfig {
    #[serde(default = "default_compose_file")]
    pub file: PathBuf,
    #[serde(default = "default_service")]
    pub service: String,
}

fn default_compose_file() -> PathBuf {
    PathBuf::from("../docker-compose.yml")
}

fn default_service() -> String {
    "mysql".to_string()
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            file: default_compose_file(),
            service: default_service(),
        }
    }
}
