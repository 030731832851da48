//! Channel management service.
//!
//! Export, backup, import, restore and reset of the `channels` table. Every
//! destructive operation writes a JSON snapshot into the backup directory
//! before touching a row.

use std::path::{Path, PathBuf};

use serde::Serialize;

use chanops_types::backup::{
    ChannelBackup, ImportReport, RestoreReport, SOURCE_BACKUP, SOURCE_EXPORT, SOURCE_RESET,
};
use chanops_types::channel::{Channel, ChannelFilter};
use chanops_types::error::ChannelError;
use chanops_types::probe::ChannelTestResult;
use chanops_types::time::{display_timestamp, file_timestamp};

use crate::export::report::ChannelTestReport;
use crate::export::{self, ExportFormat};
use crate::repository::channel::ChannelRepository;
use crate::service::fs::{FileEntry, FileSystem};

/// A file written by the service and how many channels it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrittenFile {
    pub path: PathBuf,
    pub channels: usize,
}

/// How an import treats channels that already exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOptions {
    pub update_existing: bool,
    pub dry_run: bool,
}

/// Which steps of a reset run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetOptions {
    pub backup: bool,
    pub reset: bool,
    pub dry_run: bool,
}

impl Default for ResetOptions {
    fn default() -> Self {
        Self {
            backup: true,
            reset: true,
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResetReport {
    pub channels_before: i64,
    pub backup: Option<WrittenFile>,
    pub deleted: u64,
    pub dry_run: bool,
}

/// Service for the channel lifecycle operations.
///
/// Generic over the repository and filesystem ports so it can be tested
/// without a database or a disk.
pub struct ChannelService<R: ChannelRepository, F: FileSystem> {
    repo: R,
    fs: F,
    backup_dir: PathBuf,
}

impl<R: ChannelRepository, F: FileSystem> ChannelService<R, F> {
    pub fn new(repo: R, fs: F, backup_dir: PathBuf) -> Self {
        Self {
            repo,
            fs,
            backup_dir,
        }
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub async fn list(&self, filter: &ChannelFilter) -> Result<Vec<Channel>, ChannelError> {
        Ok(self.repo.list(filter).await?)
    }

    pub async fn count(&self) -> Result<i64, ChannelError> {
        Ok(self.repo.count().await?)
    }

    /// Export filtered channels. Secrets are masked unless `mask` is false.
    pub async fn export(
        &self,
        filter: &ChannelFilter,
        format: ExportFormat,
        mask: bool,
        output: Option<PathBuf>,
    ) -> Result<WrittenFile, ChannelError> {
        let mut channels = self.repo.list(filter).await?;
        if mask {
            channels = channels.iter().map(Channel::masked).collect();
        }

        let count = channels.len();
        let export_time = display_timestamp();
        let content = match format {
            ExportFormat::Json => {
                let backup = ChannelBackup::new(export_time, SOURCE_EXPORT, channels);
                export::channels::render_json(&backup)?
            }
            ExportFormat::Csv => export::channels::render_csv(&channels)?,
            ExportFormat::Txt => export::channels::render_txt(&channels, &export_time),
        };

        let path = output.unwrap_or_else(|| {
            PathBuf::from(format!("channels_export_{}.{}", file_timestamp(), format.extension()))
        });
        self.write(&path, &content).await?;

        tracing::info!(path = %path.display(), channels = count, %format, masked = mask, "exported channels");
        Ok(WrittenFile {
            path,
            channels: count,
        })
    }

    /// Write a full, unmasked backup of every channel.
    pub async fn backup(&self, output: Option<PathBuf>) -> Result<WrittenFile, ChannelError> {
        let path = output.unwrap_or_else(|| self.timestamped_path("channels_backup"));
        self.write_backup(&path, SOURCE_BACKUP).await
    }

    /// Write a timestamped snapshot named `<prefix>_<ts>.json` into the backup directory.
    pub async fn snapshot(&self, prefix: &str, source: &str) -> Result<WrittenFile, ChannelError> {
        let path = self.timestamped_path(prefix);
        self.write_backup(&path, source).await
    }

    /// Read and parse a backup document.
    pub async fn load_backup(&self, path: &Path) -> Result<ChannelBackup, ChannelError> {
        if !self.fs.exists(path).await {
            return Err(ChannelError::Io(format!("{}: file not found", path.display())));
        }
        let content = self
            .fs
            .read_file(path)
            .await
            .map_err(|e| ChannelError::Io(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&content)
            .map_err(|e| ChannelError::InvalidBackup(format!("{}: {e}", path.display())))
    }

    /// Merge a backup into the table.
    ///
    /// A channel exists when its name matches, or its id matches and is
    /// positive. Existing channels are skipped unless `update_existing`;
    /// new ones get a fresh id. Failures are collected, not fatal.
    pub async fn import(
        &self,
        backup: &ChannelBackup,
        options: ImportOptions,
    ) -> Result<ImportReport, ChannelError> {
        let mut report = ImportReport {
            total: backup.channels.len(),
            dry_run: options.dry_run,
            ..Default::default()
        };

        for channel in &backup.channels {
            let existing = match self.repo.find_existing(&channel.name, channel.id).await {
                Ok(existing) => existing,
                Err(e) => {
                    report.record_failure(channel, e);
                    continue;
                }
            };

            match existing {
                Some(existing) if !options.update_existing => {
                    tracing::debug!(channel_id = existing.id, name = %channel.name, "channel exists, skipping");
                    report.skipped += 1;
                }
                Some(existing) => {
                    if options.dry_run {
                        report.success += 1;
                        continue;
                    }
                    let mut updated = channel.clone();
                    updated.id = existing.id;
                    match self.repo.update(&updated).await {
                        Ok(()) => report.success += 1,
                        Err(e) => report.record_failure(channel, e),
                    }
                }
                None => {
                    if options.dry_run {
                        report.success += 1;
                        continue;
                    }
                    match self.repo.insert(channel, false).await {
                        Ok(id) => {
                            tracing::debug!(channel_id = id, name = %channel.name, "channel imported");
                            report.success += 1;
                        }
                        Err(e) => report.record_failure(channel, e),
                    }
                }
            }
        }

        tracing::info!(
            total = report.total,
            success = report.success,
            skipped = report.skipped,
            failed = report.failed,
            dry_run = report.dry_run,
            "import finished"
        );
        Ok(report)
    }

    /// Replace the whole table with a backup, preserving channel ids.
    ///
    /// A pre-restore snapshot is attempted first; if it cannot be written the
    /// restore still proceeds.
    pub async fn restore(
        &self,
        backup: &ChannelBackup,
        dry_run: bool,
    ) -> Result<RestoreReport, ChannelError> {
        let mut report = RestoreReport {
            total: backup.channels.len(),
            dry_run,
            ..Default::default()
        };
        if dry_run {
            return Ok(report);
        }

        match self.snapshot("pre_restore_backup", SOURCE_BACKUP).await {
            Ok(file) => report.snapshot = Some(file.path.display().to_string()),
            Err(e) => tracing::warn!(error = %e, "pre-restore snapshot failed, continuing"),
        }

        report.deleted = self.repo.delete_all().await?;

        for channel in &backup.channels {
            match self.repo.insert(channel, true).await {
                Ok(_) => report.restored += 1,
                Err(e) => {
                    report.failed += 1;
                    report
                        .errors
                        .push(format!("{} (ID:{}): {e}", channel.name, channel.id));
                }
            }
        }

        tracing::info!(
            restored = report.restored,
            failed = report.failed,
            deleted = report.deleted,
            "restore finished"
        );
        Ok(report)
    }

    /// Back up and/or empty the channels table.
    ///
    /// When both steps run, a failed backup aborts before anything is deleted.
    pub async fn reset(&self, options: ResetOptions) -> Result<ResetReport, ChannelError> {
        let channels_before = self.repo.count().await?;
        let mut report = ResetReport {
            channels_before,
            backup: None,
            deleted: 0,
            dry_run: options.dry_run,
        };
        if options.dry_run {
            return Ok(report);
        }

        if options.backup {
            report.backup = Some(self.snapshot("reset_backup", SOURCE_RESET).await?);
        }
        if options.reset {
            report.deleted = self.repo.delete_all().await?;
            tracing::warn!(deleted = report.deleted, "channels table emptied");
        }
        Ok(report)
    }

    /// JSON files in the backup directory, newest first.
    pub async fn list_backups(&self) -> Result<Vec<FileEntry>, ChannelError> {
        let entries = match self.fs.list_dir(&self.backup_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(ChannelError::Io(format!("{}: {e}", self.backup_dir.display())));
            }
        };
        let mut backups: Vec<FileEntry> = entries
            .into_iter()
            .filter(|e| e.path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        backups.sort_by(|a, b| {
            b.modified
                .cmp(&a.modified)
                .then_with(|| b.file_name().cmp(&a.file_name()))
        });
        Ok(backups)
    }

    /// Write the JSON report of a channel test batch.
    pub async fn save_test_report(&self, path: &Path, results: &[ChannelTestResult]) -> Result<(), ChannelError> {
        let test_time = display_timestamp();
        let json = ChannelTestReport::new(&test_time, results).to_json()?;
        self.write(path, &json).await?;
        tracing::info!(path = %path.display(), results = results.len(), "test report written");
        Ok(())
    }

    fn timestamped_path(&self, prefix: &str) -> PathBuf {
        self.backup_dir
            .join(format!("{prefix}_{}.json", file_timestamp()))
    }

    async fn write_backup(&self, path: &Path, source: &str) -> Result<WrittenFile, ChannelError> {
        let channels = self.repo.list(&ChannelFilter::default()).await?;
        let backup = ChannelBackup::new(display_timestamp(), source, channels);
        let json = export::channels::render_json(&backup)?;
        self.write(path, &json).await?;

        tracing::info!(path = %path.display(), channels = backup.total_channels, source, "backup written");
        Ok(WrittenFile {
            path: path.to_path_buf(),
            channels: backup.total_channels,
        })
    }

    async fn write(&self, path: &Path, content: &str) -> Result<(), ChannelError> {
        self.fs
            .write_file(path, content)
            .await
            .map_err(|e| ChannelError::Io(format!("{}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryChannelRepository, MemoryFileSystem};

    fn channel(id: i64, name: &str, channel_type: i64) -> Channel {
        Channel {
            id,
            name: name.to_string(),
            channel_type,
            key: format!("AIzaSy-{name}-secret-key"),
            status: 1,
            ..Default::default()
        }
    }

    fn service(
        channels: Vec<Channel>,
    ) -> ChannelService<MemoryChannelRepository, MemoryFileSystem> {
        ChannelService::new(
            MemoryChannelRepository::with_channels(channels),
            MemoryFileSystem::new(),
            PathBuf::from("/backups"),
        )
    }

    fn backup_of(channels: Vec<Channel>) -> ChannelBackup {
        ChannelBackup::new("2025-01-01 00:00:00".to_string(), SOURCE_BACKUP, channels)
    }

    #[tokio::test]
    async fn test_export_json_masks_by_default() {
        let svc = service(vec![channel(1, "alpha", 24), channel(2, "beta", 1)]);
        let filter = ChannelFilter {
            types: vec![24],
            ..Default::default()
        };
        let out = PathBuf::from("/exports/out.json");
        let written = svc
            .export(&filter, ExportFormat::Json, true, Some(out.clone()))
            .await
            .unwrap();
        assert_eq!(written.channels, 1);

        let doc: ChannelBackup = serde_json::from_str(&svc.fs.content(&out).unwrap()).unwrap();
        assert_eq!(doc.database_info, "Export");
        assert_eq!(doc.channels[0].name, "alpha");
        assert!(doc.channels[0].key.contains("***masked***"));
    }

    #[tokio::test]
    async fn test_export_unmasked_csv() {
        let svc = service(vec![channel(1, "alpha", 24)]);
        let out = PathBuf::from("/exports/out.csv");
        svc.export(&ChannelFilter::default(), ExportFormat::Csv, false, Some(out.clone()))
            .await
            .unwrap();
        assert!(svc.fs.content(&out).unwrap().contains("AIzaSy-alpha-secret-key"));
    }

    #[tokio::test]
    async fn test_backup_default_path_in_backup_dir() {
        let svc = service(vec![channel(1, "alpha", 24)]);
        let written = svc.backup(None).await.unwrap();
        assert!(written.path.starts_with("/backups"));
        let name = written.path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("channels_backup_") && name.ends_with(".json"));
        let doc: ChannelBackup = serde_json::from_str(&svc.fs.content(&written.path).unwrap()).unwrap();
        assert_eq!(doc.database_info, "MySQL Docker Compose");
        assert_eq!(doc.channels[0].key, "AIzaSy-alpha-secret-key");
    }

    #[tokio::test]
    async fn test_save_test_report() {
        use chanops_types::probe::ProbeOutcome;

        let svc = service(vec![]);
        let result = ChannelTestResult {
            channel_id: 3,
            channel_name: "gemini-a".to_string(),
            channel_type: 24,
            model: "gemini-2.5-flash".to_string(),
            success: false,
            outcome: ProbeOutcome::RateLimited,
            message: "Rate limit exceeded (429)".to_string(),
            response_time_ms: 120,
            test_time: "2025-01-01 00:00:00".to_string(),
            key_index: None,
            total_keys: 1,
        };
        let out = PathBuf::from("/reports/test.json");
        svc.save_test_report(&out, &[result]).await.unwrap();

        let doc: serde_json::Value = serde_json::from_str(&svc.fs.content(&out).unwrap()).unwrap();
        assert_eq!(doc["total_channels"], 1);
        assert_eq!(doc["failed"], 1);
        assert_eq!(doc["results"][0]["channel_name"], "gemini-a");
    }

    #[tokio::test]
    async fn test_load_backup_rejects_garbage() {
        let svc = ChannelService::new(
            MemoryChannelRepository::with_channels(vec![]),
            MemoryFileSystem::new().with_file("/in/bad.json", "{not json"),
            PathBuf::from("/backups"),
        );
        let err = svc.load_backup(Path::new("/in/bad.json")).await.unwrap_err();
        assert!(matches!(err, ChannelError::InvalidBackup(_)));
        let err = svc.load_backup(Path::new("/in/missing.json")).await.unwrap_err();
        assert!(matches!(err, ChannelError::Io(_)));
    }

    #[tokio::test]
    async fn test_import_skips_existing_and_inserts_new() {
        let svc = service(vec![channel(1, "alpha", 24)]);
        let backup = backup_of(vec![channel(1, "alpha", 24), channel(50, "gamma", 24)]);

        let report = svc.import(&backup, ImportOptions::default()).await.unwrap();

        assert_eq!(report.total, 2);
        assert_eq!(report.success, 1);
        assert_eq!(report.skipped, 1);
        let rows = svc.repo.snapshot();
        assert_eq!(rows.len(), 2);
        let gamma = rows.iter().find(|c| c.name == "gamma").unwrap();
        assert_eq!(gamma.id, 2, "new channels get a fresh id");
    }

    #[tokio::test]
    async fn test_import_matches_by_id() {
        let svc = service(vec![channel(7, "old-name", 24)]);
        let mut incoming = channel(7, "new-name", 24);
        incoming.models = "gemini-2.5-pro".to_string();

        let report = svc
            .import(
                &backup_of(vec![incoming]),
                ImportOptions {
                    update_existing: true,
                    dry_run: false,
                },
            )
            .await
            .unwrap();

        assert_eq!(report.success, 1);
        let rows = svc.repo.snapshot();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, 7);
        assert_eq!(rows[0].name, "new-name");
        assert_eq!(rows[0].models, "gemini-2.5-pro");
    }

    #[tokio::test]
    async fn test_import_update_keeps_stored_id() {
        let svc = service(vec![channel(3, "alpha", 24)]);
        let report = svc
            .import(
                &backup_of(vec![channel(0, "alpha", 36)]),
                ImportOptions {
                    update_existing: true,
                    dry_run: false,
                },
            )
            .await
            .unwrap();
        assert_eq!(report.success, 1);
        let rows = svc.repo.snapshot();
        assert_eq!(rows[0].id, 3);
        assert_eq!(rows[0].channel_type, 36);
    }

    #[tokio::test]
    async fn test_import_dry_run_writes_nothing() {
        let svc = service(vec![channel(1, "alpha", 24)]);
        let report = svc
            .import(
                &backup_of(vec![channel(0, "beta", 24), channel(0, "gamma", 24)]),
                ImportOptions {
                    update_existing: false,
                    dry_run: true,
                },
            )
            .await
            .unwrap();
        assert!(report.dry_run);
        assert_eq!(report.success, 2);
        assert_eq!(svc.repo.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn test_import_collects_failures() {
        let svc = ChannelService::new(
            MemoryChannelRepository::with_channels(vec![]).failing_on("broken"),
            MemoryFileSystem::new(),
            PathBuf::from("/backups"),
        );
        let report = svc
            .import(
                &backup_of(vec![channel(4, "broken", 24), channel(5, "fine", 24)]),
                ImportOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(report.success, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.errors, vec!["broken (ID:4): query error: injected failure"]);
    }

    #[tokio::test]
    async fn test_restore_replaces_table_and_snapshots_first() {
        let svc = service(vec![channel(1, "alpha", 24), channel(2, "beta", 24)]);
        let backup = backup_of(vec![channel(10, "restored-a", 24), channel(11, "restored-b", 36)]);

        let report = svc.restore(&backup, false).await.unwrap();

        assert_eq!(report.deleted, 2);
        assert_eq!(report.restored, 2);
        let snapshot = report.snapshot.unwrap();
        assert!(snapshot.contains("pre_restore_backup_"));
        let pre: ChannelBackup =
            serde_json::from_str(&svc.fs.content(Path::new(&snapshot)).unwrap()).unwrap();
        assert_eq!(pre.total_channels, 2);

        let ids: Vec<i64> = svc.repo.snapshot().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![10, 11]);
    }

    #[tokio::test]
    async fn test_restore_proceeds_when_snapshot_fails() {
        let svc = ChannelService::new(
            MemoryChannelRepository::with_channels(vec![channel(1, "alpha", 24)]),
            MemoryFileSystem::read_only(),
            PathBuf::from("/backups"),
        );
        let report = svc
            .restore(&backup_of(vec![channel(5, "beta", 24)]), false)
            .await
            .unwrap();
        assert!(report.snapshot.is_none());
        assert_eq!(report.restored, 1);
        assert_eq!(svc.repo.snapshot()[0].name, "beta");
    }

    #[tokio::test]
    async fn test_restore_dry_run_touches_nothing() {
        let svc = service(vec![channel(1, "alpha", 24)]);
        let report = svc
            .restore(&backup_of(vec![channel(5, "beta", 24)]), true)
            .await
            .unwrap();
        assert!(report.dry_run);
        assert_eq!(report.restored, 0);
        assert_eq!(svc.repo.snapshot()[0].name, "alpha");
        assert!(svc.fs.paths().is_empty());
    }

    #[tokio::test]
    async fn test_reset_backs_up_then_deletes() {
        let svc = service(vec![channel(1, "alpha", 24), channel(2, "beta", 24)]);
        let report = svc.reset(ResetOptions::default()).await.unwrap();
        assert_eq!(report.channels_before, 2);
        assert_eq!(report.deleted, 2);
        let backup = report.backup.unwrap();
        let doc: ChannelBackup = serde_json::from_str(&svc.fs.content(&backup.path).unwrap()).unwrap();
        assert_eq!(doc.database_info, "Reset Operation");
        assert_eq!(svc.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reset_aborts_when_backup_fails() {
        let svc = ChannelService::new(
            MemoryChannelRepository::with_channels(vec![channel(1, "alpha", 24)]),
            MemoryFileSystem::read_only(),
            PathBuf::from("/backups"),
        );
        assert!(svc.reset(ResetOptions::default()).await.is_err());
        assert_eq!(svc.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reset_backup_only_and_dry_run() {
        let svc = service(vec![channel(1, "alpha", 24)]);
        let dry = svc
            .reset(ResetOptions {
                dry_run: true,
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(dry.backup.is_none());
        assert!(svc.fs.paths().is_empty());

        let backup_only = svc
            .reset(ResetOptions {
                backup: true,
                reset: false,
                dry_run: false,
            })
            .await
            .unwrap();
        assert!(backup_only.backup.is_some());
        assert_eq!(backup_only.deleted, 0);
        assert_eq!(svc.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_backups_only_json() {
        let svc = ChannelService::new(
            MemoryChannelRepository::with_channels(vec![]),
            MemoryFileSystem::new()
                .with_file("/backups/reset_backup_20250101_000000.json", "{}")
                .with_file("/backups/reset_backup_20250202_000000.json", "{}")
                .with_file("/backups/notes.txt", "x")
                .with_file("/elsewhere/other.json", "{}"),
            PathBuf::from("/backups"),
        );
        let names: Vec<String> = svc
            .list_backups()
            .await
            .unwrap()
            .iter()
            .map(FileEntry::file_name)
            .collect();
        assert_eq!(
            names,
            vec![
                "reset_backup_20250202_000000.json",
                "reset_backup_20250101_000000.json"
            ]
        );
    }
}
