//! Configuration loading and DSN resolution.
//!
//! Reads `config.toml` from `--config` or the platform config directory
//! (`~/.config/chanops/` on Linux) and falls back to defaults when the file
//! is missing or malformed.

use std::path::{Path, PathBuf};

use secrecy::SecretString;

use chanops_types::config::{ChanopsConfig, DEFAULT_DSN};
use chanops_types::error::ConfigError;

/// `<config_dir>/chanops/config.toml`, when the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("chanops").join("config.toml"))
}

/// Load configuration from `path`, or from the default location.
///
/// - A missing file gives [`ChanopsConfig::default()`].
/// - A file that can't be read or parsed logs a warning and gives the default.
pub async fn load_config(path: Option<&Path>) -> ChanopsConfig {
    let Some(config_path) = path.map(Path::to_path_buf).or_else(default_config_path) else {
        return ChanopsConfig::default();
    };

    match read_config(&config_path).await {
        Ok(Some(config)) => config,
        Ok(None) => {
            tracing::debug!("No config found at {}, using defaults", config_path.display());
            ChanopsConfig::default()
        }
        Err(err) => {
            tracing::warn!("{err}, using defaults");
            ChanopsConfig::default()
        }
    }
}

/// Read and parse one config file. `Ok(None)` when it doesn't exist.
pub async fn read_config(path: &Path) -> Result<Option<ChanopsConfig>, ConfigError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(ConfigError::Read(format!("{}: {err}", path.display()))),
    };
    toml::from_str(&content)
        .map(Some)
        .map_err(|err| ConfigError::Parse(format!("{}: {err}", path.display())))
}

/// Resolve the DSN to connect with.
///
/// Priority:
/// 1. `--dsn` / `SQL_DSN`
/// 2. `[database] dsn` from the config file
/// 3. the config's discrete host/port/user/password/name fields
/// 4. [`DEFAULT_DSN`]
pub fn resolve_dsn(flag: Option<&str>, config: &ChanopsConfig) -> SecretString {
    let dsn = flag
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .or_else(|| config.database.configured_dsn())
        .unwrap_or_else(|| DEFAULT_DSN.to_string());
    SecretString::from(dsn)
}
