//! Bounded concurrent batch testing.
//!
//! Every channel or key becomes its own task in a `JoinSet`; a semaphore caps
//! how many probes are in flight at once. Results are handed to the caller's
//! progress callback in completion order.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::Instrument;

use chanops_types::channel::Channel;
use chanops_types::probe::{ChannelTestResult, ExtractedKey, KeyTestResult};

use super::{KeyProbe, resolve_model, test_channel};

/// A key queued for a key batch, with the channel it came from when known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCandidate {
    pub key: String,
    pub source: Option<ExtractedKey>,
}

impl KeyCandidate {
    pub fn bare(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            source: None,
        }
    }
}

impl From<ExtractedKey> for KeyCandidate {
    fn from(source: ExtractedKey) -> Self {
        Self {
            key: source.api_key.clone(),
            source: Some(source),
        }
    }
}

/// Runs probes over many channels or keys with at most `workers` in flight.
pub struct BatchTester<P: KeyProbe + 'static> {
    probe: Arc<P>,
    workers: usize,
    default_model: String,
}

impl<P: KeyProbe + 'static> BatchTester<P> {
    pub fn new(probe: P, workers: usize, default_model: impl Into<String>) -> Self {
        Self {
            probe: Arc::new(probe),
            workers: workers.max(1),
            default_model: default_model.into(),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Test each channel (first working key wins), reporting progress as
    /// `on_result(done, total, result)`.
    pub async fn test_channels<F>(
        &self,
        channels: Vec<Channel>,
        model: Option<&str>,
        mut on_result: F,
    ) -> Vec<ChannelTestResult>
    where
        F: FnMut(usize, usize, &ChannelTestResult),
    {
        let total = channels.len();
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut join_set = JoinSet::new();

        tracing::info!(channels = total, workers = self.workers, "starting channel batch");

        for channel in channels {
            let probe = Arc::clone(&self.probe);
            let semaphore = Arc::clone(&semaphore);
            let model = resolve_model(model, &channel, &self.default_model);
            let span = tracing::info_span!(
                "channel_test",
                channel.id = channel.id,
                channel.name = %channel.name,
                gen_ai.request.model = %model,
            );

            join_set.spawn(
                async move {
                    let _permit = semaphore.acquire_owned().await;
                    test_channel(probe.as_ref(), &channel, &model).await
                }
                .instrument(span),
            );
        }

        let mut results = Vec::with_capacity(total);
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(result) => {
                    on_result(results.len() + 1, total, &result);
                    results.push(result);
                }
                Err(e) => tracing::error!(error = %e, "channel test task aborted"),
            }
        }
        results
    }

    /// Probe every key once with the same model, reporting progress as
    /// `on_result(done, total, result)`. Results are returned in input order.
    pub async fn test_keys<F>(
        &self,
        keys: Vec<KeyCandidate>,
        model: Option<&str>,
        mut on_result: F,
    ) -> Vec<KeyTestResult>
    where
        F: FnMut(usize, usize, &KeyTestResult),
    {
        let total = keys.len();
        let model = model
            .map(str::to_string)
            .unwrap_or_else(|| self.default_model.clone());
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut join_set = JoinSet::new();

        tracing::info!(keys = total, workers = self.workers, model = %model, "starting key batch");

        for (i, candidate) in keys.into_iter().enumerate() {
            let probe = Arc::clone(&self.probe);
            let semaphore = Arc::clone(&semaphore);
            let model = model.clone();
            let span = tracing::info_span!("key_test", key.index = i + 1, gen_ai.request.model = %model);

            join_set.spawn(
                async move {
                    let _permit = semaphore.acquire_owned().await;
                    let result = probe.probe(&candidate.key, &model, None).await;
                    KeyTestResult {
                        index: i + 1,
                        key: candidate.key,
                        source: candidate.source,
                        model,
                        result,
                    }
                }
                .instrument(span),
            );
        }

        let mut results = Vec::with_capacity(total);
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(result) => {
                    on_result(results.len() + 1, total, &result);
                    results.push(result);
                }
                Err(e) => tracing::error!(error = %e, "key test task aborted"),
            }
        }
        results.sort_by_key(|r| r.index);
        results
    }
}
