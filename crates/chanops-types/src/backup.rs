//! Backup document format and the reports produced when loading one.

use serde::{Deserialize, Serialize};

use crate::channel::Channel;

/// Version stamped into every backup document.
pub const BACKUP_FORMAT_VERSION: &str = "1.0.0";

/// `database_info` label for full backups.
pub const SOURCE_BACKUP: &str = "MySQL Docker Compose";
/// `database_info` label for exports.
pub const SOURCE_EXPORT: &str = "Export";
/// `database_info` label for the snapshot taken before a reset.
pub const SOURCE_RESET: &str = "Reset Operation";

/// A JSON snapshot of the channels table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelBackup {
    pub export_time: String,
    pub export_version: String,
    pub total_channels: usize,
    pub database_info: String,
    #[serde(default)]
    pub channels: Vec<Channel>,
}

impl ChannelBackup {
    pub fn new(export_time: String, database_info: &str, channels: Vec<Channel>) -> Self {
        Self {
            export_time,
            export_version: BACKUP_FORMAT_VERSION.to_string(),
            total_channels: channels.len(),
            database_info: database_info.to_string(),
            channels,
        }
    }
}

/// Outcome of importing a backup into the channels table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
    pub dry_run: bool,
}

impl ImportReport {
    pub fn record_failure(&mut self, channel: &Channel, error: impl std::fmt::Display) {
        self.failed += 1;
        self.errors
            .push(format!("{} (ID:{}): {error}", channel.name, channel.id));
    }
}

/// Outcome of replacing the channels table with a backup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreReport {
    pub total: usize,
    pub restored: usize,
    pub failed: usize,
    pub deleted: u64,
    pub errors: Vec<String>,
    /// Where the pre-restore snapshot was written, if one was taken.
    pub snapshot: Option<String>,
    pub dry_run: bool,
}
