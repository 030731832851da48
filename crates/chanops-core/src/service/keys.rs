//! API key extraction, export and pruning.
//!
//! Keys live inside each channel's newline-delimited key blob. This service
//! pulls them out for export or batch testing, and writes back the blobs of
//! channels whose keys were definitively rejected.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Serialize;

use chanops_types::channel::{
    Channel, ChannelFilter, ChannelStatus, is_structured_credential, mask_key_preview, split_keys,
};
use chanops_types::error::ChannelError;
use chanops_types::probe::{ExtractedKey, KeyTestResult};
use chanops_types::time::file_timestamp;

use crate::export::{KeyExportFormat, keys as key_export};
use crate::repository::channel::ChannelRepository;
use crate::service::fs::FileSystem;

/// Counts shown after a key export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyExportSummary {
    pub total_keys: usize,
    pub unique_channels: usize,
    pub enabled: usize,
    pub disabled: usize,
    /// Masked previews of the first few keys.
    pub samples: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyExportResult {
    pub path: PathBuf,
    pub format: String,
    pub summary: KeyExportSummary,
}

/// Planned rewrite of one channel's key blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyPrunePlan {
    pub channel_id: i64,
    pub channel_name: String,
    pub removed: Vec<String>,
    pub remaining: Vec<String>,
    /// No keys remain, so the channel is auto-disabled instead.
    pub disable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    pub channels_updated: usize,
    pub channels_disabled: usize,
    pub keys_removed: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

/// Pull every probe-able key out of the given channels.
pub fn extract_keys(channels: &[Channel]) -> Vec<ExtractedKey> {
    channels
        .iter()
        .flat_map(|channel| {
            split_keys(&channel.key)
                .into_iter()
                .filter(|key| !is_structured_credential(key))
                .map(move |key| ExtractedKey {
                    channel_id: channel.id,
                    channel_name: channel.name.clone(),
                    channel_type: channel.channel_type,
                    channel_status: channel.status,
                    api_key: key.to_string(),
                    models: channel.models.clone(),
                })
        })
        .collect()
}

pub fn summarize(keys: &[ExtractedKey]) -> KeyExportSummary {
    let unique_channels: HashSet<i64> = keys.iter().map(|k| k.channel_id).collect();
    let enabled = keys.iter().filter(|k| k.is_enabled()).count();
    KeyExportSummary {
        total_keys: keys.len(),
        unique_channels: unique_channels.len(),
        enabled,
        disabled: keys.len() - enabled,
        samples: keys
            .iter()
            .take(5)
            .map(|k| mask_key_preview(&k.api_key))
            .collect(),
    }
}

/// Work out which keys to drop from which channels.
///
/// Only keys whose probe was a definitive rejection (400/403) and that came
/// from a known channel are removed. Channels left without keys are marked
/// for auto-disable rather than deleted.
pub fn plan_pruning(channels: &[Channel], results: &[KeyTestResult]) -> Vec<KeyPrunePlan> {
    let mut rejected: BTreeMap<i64, HashSet<&str>> = BTreeMap::new();
    for result in results {
        if result.result.success || !result.result.outcome.is_definitive_rejection() {
            continue;
        }
        if let Some(source) = &result.source {
            rejected
                .entry(source.channel_id)
                .or_default()
                .insert(result.key.as_str());
        }
    }

    let mut plans = Vec::new();
    for (channel_id, keys) in &rejected {
        let Some(channel) = channels.iter().find(|c| c.id == *channel_id) else {
            tracing::warn!(channel_id, "channel disappeared before pruning");
            continue;
        };
        let (removed, remaining): (Vec<&str>, Vec<&str>) = split_keys(&channel.key)
            .into_iter()
            .partition(|k| !is_structured_credential(k) && keys.contains(k));
        if removed.is_empty() {
            continue;
        }
        plans.push(KeyPrunePlan {
            channel_id: channel.id,
            channel_name: channel.name.clone(),
            disable: remaining.is_empty(),
            removed: removed.into_iter().map(str::to_string).collect(),
            remaining: remaining.into_iter().map(str::to_string).collect(),
        });
    }
    plans
}

/// Service for key export and pruning.
pub struct KeyService<R: ChannelRepository, F: FileSystem> {
    repo: R,
    fs: F,
}

impl<R: ChannelRepository, F: FileSystem> KeyService<R, F> {
    pub fn new(repo: R, fs: F) -> Self {
        Self { repo, fs }
    }

    /// Keys from channels matching the filter, in channel id order.
    pub async fn extract(&self, filter: &ChannelFilter) -> Result<Vec<ExtractedKey>, ChannelError> {
        let channels = self.repo.list(filter).await?;
        let keys = extract_keys(&channels);
        tracing::info!(channels = channels.len(), keys = keys.len(), "extracted keys");
        Ok(keys)
    }

    /// Write keys in the chosen format. The default file name is
    /// `api_keys_<ts>.<ext>`.
    pub async fn export(
        &self,
        keys: &[ExtractedKey],
        format: KeyExportFormat,
        output: Option<PathBuf>,
    ) -> Result<KeyExportResult, ChannelError> {
        let content = key_export::render_keys(keys, format)?;
        let path = output.unwrap_or_else(|| {
            PathBuf::from(format!("api_keys_{}.{}", file_timestamp(), format.extension()))
        });
        self.write(&path, &content).await?;
        Ok(KeyExportResult {
            path,
            format: format.to_string(),
            summary: summarize(keys),
        })
    }

    /// Read a plain key list file.
    pub async fn read_key_file(&self, path: &Path) -> Result<Vec<String>, ChannelError> {
        let content = self
            .fs
            .read_file(path)
            .await
            .map_err(|e| ChannelError::Io(format!("{}: {e}", path.display())))?;
        Ok(key_export::parse_key_list(&content))
    }

    /// Save text to a file, creating parent directories.
    pub async fn write(&self, path: &Path, content: &str) -> Result<(), ChannelError> {
        self.fs
            .write_file(path, content)
            .await
            .map_err(|e| ChannelError::Io(format!("{}: {e}", path.display())))
    }

    /// Plan pruning against the current state of the affected channels.
    pub async fn plan_pruning(&self, results: &[KeyTestResult]) -> Result<Vec<KeyPrunePlan>, ChannelError> {
        let ids: HashSet<i64> = results
            .iter()
            .filter_map(|r| r.source.as_ref().map(|s| s.channel_id))
            .collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let channels: Vec<Channel> = self
            .repo
            .list(&ChannelFilter::default())
            .await?
            .into_iter()
            .filter(|c| ids.contains(&c.id))
            .collect();
        Ok(plan_pruning(&channels, results))
    }

    /// Write the planned key blobs back, one statement per channel.
    pub async fn apply_pruning(&self, plans: &[KeyPrunePlan]) -> PruneReport {
        let mut report = PruneReport::default();
        for plan in plans {
            let status = plan.disable.then_some(ChannelStatus::AutoDisabled.code());
            let blob = plan.remaining.join("\n");
            match self.repo.update_key(plan.channel_id, &blob, status).await {
                Ok(()) => {
                    report.channels_updated += 1;
                    report.keys_removed += plan.removed.len();
                    if plan.disable {
                        report.channels_disabled += 1;
                    }
                    tracing::info!(
                        channel_id = plan.channel_id,
                        removed = plan.removed.len(),
                        disabled = plan.disable,
                        "pruned invalid keys"
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    report
                        .errors
                        .push(format!("{} (ID:{}): {e}", plan.channel_name, plan.channel_id));
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryChannelRepository, MemoryFileSystem};
    use chanops_types::probe::{ProbeOutcome, ProbeResult};

    fn channel(id: i64, status: i64, key: &str) -> Channel {
        Channel {
            id,
            name: format!("gemini-{id}"),
            channel_type: 24,
            status,
            key: key.to_string(),
            models: "gemini-2.5-flash".to_string(),
            ..Default::default()
        }
    }

    fn result_for(channel: &Channel, key: &str, result: ProbeResult) -> KeyTestResult {
        KeyTestResult {
            index: 1,
            key: key.to_string(),
            source: extract_keys(std::slice::from_ref(channel))
                .into_iter()
                .find(|k| k.api_key == key),
            model: "gemini-2.5-flash".to_string(),
            result,
        }
    }

    fn rejected() -> ProbeResult {
        ProbeResult::failed(ProbeOutcome::BadRequest, "Invalid API key (400 Bad Request)", 40)
    }

    #[test]
    fn test_extract_skips_structured_and_blank() {
        let channels = vec![
            channel(1, 1, "k1\n\n{\"type\":\"service_account\"}\nk2"),
            channel(2, 2, "k3"),
        ];
        let keys = extract_keys(&channels);
        let raw: Vec<&str> = keys.iter().map(|k| k.api_key.as_str()).collect();
        assert_eq!(raw, vec!["k1", "k2", "k3"]);
        assert_eq!(keys[2].channel_status, 2);
    }

    #[test]
    fn test_summary() {
        let channels = vec![channel(1, 1, "AIzaSyA1234567890abcd\nk2"), channel(2, 2, "k3")];
        let summary = summarize(&extract_keys(&channels));
        assert_eq!(summary.total_keys, 3);
        assert_eq!(summary.unique_channels, 2);
        assert_eq!(summary.enabled, 2);
        assert_eq!(summary.disabled, 1);
        assert_eq!(summary.samples[0], "AIzaSyA123...abcd");
    }

    #[test]
    fn test_plan_removes_only_definitive_rejections() {
        let ch = channel(1, 1, "bad\nlimited\ngood");
        let results = vec![
            result_for(&ch, "bad", rejected()),
            result_for(
                &ch,
                "limited",
                ProbeResult::failed(ProbeOutcome::RateLimited, "Rate limit exceeded (429)", 30),
            ),
            result_for(&ch, "good", ProbeResult::valid(100)),
        ];
        let plans = plan_pruning(&[ch], &results);
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].removed, vec!["bad"]);
        assert_eq!(plans[0].remaining, vec!["limited", "good"]);
        assert!(!plans[0].disable);
    }

    #[test]
    fn test_plan_disables_emptied_channel_but_keeps_structured() {
        let emptied = channel(1, 1, "bad-1\nbad-2");
        let structured = channel(2, 1, "bad-3\n{\"sa\":true}");
        let mut results: Vec<KeyTestResult> = ["bad-1", "bad-2"]
            .iter()
            .map(|k| result_for(&emptied, k, rejected()))
            .collect();
        results.push(result_for(&structured, "bad-3", rejected()));

        let plans = plan_pruning(&[emptied, structured], &results);
        assert_eq!(plans.len(), 2);
        assert!(plans[0].disable);
        assert!(plans[0].remaining.is_empty());
        assert!(!plans[1].disable);
        assert_eq!(plans[1].remaining, vec!["{\"sa\":true}"]);
    }

    #[test]
    fn test_plan_ignores_file_sourced_keys() {
        let ch = channel(1, 1, "bad");
        let mut result = result_for(&ch, "bad", rejected());
        result.source = None;
        assert!(plan_pruning(&[ch], &[result]).is_empty());
    }

    #[tokio::test]
    async fn test_apply_pruning_updates_blobs_and_status() {
        let channels = vec![channel(1, 1, "bad\ngood"), channel(2, 1, "bad-only")];
        let svc = KeyService::new(
            MemoryChannelRepository::with_channels(channels.clone()),
            MemoryFileSystem::new(),
        );
        let results = vec![
            result_for(&channels[0], "bad", rejected()),
            result_for(&channels[0], "good", ProbeResult::valid(80)),
            result_for(&channels[1], "bad-only", rejected()),
        ];

        let plans = svc.plan_pruning(&results).await.unwrap();
        let report = svc.apply_pruning(&plans).await;

        assert_eq!(report.channels_updated, 2);
        assert_eq!(report.channels_disabled, 1);
        assert_eq!(report.keys_removed, 2);
        let rows = svc.repo.snapshot();
        assert_eq!(rows[0].key, "good");
        assert_eq!(rows[0].status, 1);
        assert_eq!(rows[1].key, "");
        assert_eq!(rows[1].status, 3);
    }

    #[tokio::test]
    async fn test_export_and_read_back() {
        let svc = KeyService::new(
            MemoryChannelRepository::with_channels(vec![channel(1, 1, "k1\nk2")]),
            MemoryFileSystem::new(),
        );
        let keys = svc
            .extract(&ChannelFilter {
                types: vec![24],
                status: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();
        let out = PathBuf::from("/keys/export.txt");
        let result = svc
            .export(&keys, KeyExportFormat::Simple, Some(out.clone()))
            .await
            .unwrap();
        assert_eq!(result.summary.total_keys, 2);
        assert_eq!(svc.read_key_file(&out).await.unwrap(), vec!["k1", "k2"]);
    }
}
