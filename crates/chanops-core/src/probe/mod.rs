//! Key validity probing.
//!
//! `KeyProbe` is the port an HTTP prober implements. On top of it this module
//! decides which model a channel is tested with and how a multi-key channel
//! collapses into a single result; `runner` fans the work out across a bounded
//! number of concurrent tasks.

pub mod runner;

use chanops_types::channel::{Channel, is_structured_credential};
use chanops_types::probe::{ChannelTestResult, ProbeOutcome, ProbeResult};
use chanops_types::time::display_timestamp;

/// Trait for anything that can check whether one API key works.
///
/// Implementations never fail: every transport or protocol problem is
/// reported as an unsuccessful [`ProbeResult`].
pub trait KeyProbe: Send + Sync {
    fn probe(
        &self,
        key: &str,
        model: &str,
        base_url: Option<&str>,
    ) -> impl std::future::Future<Output = ProbeResult> + Send;
}

/// Pick the model a channel is tested with.
///
/// Precedence: explicit model, the channel's `test_model`, its first Gemini
/// model, its first model, then `fallback`.
pub fn resolve_model(explicit: Option<&str>, channel: &Channel, fallback: &str) -> String {
    if let Some(model) = explicit.map(str::trim).filter(|m| !m.is_empty()) {
        return model.to_string();
    }
    if let Some(model) = channel
        .test_model
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
    {
        return model.to_string();
    }
    let models = channel.model_list();
    models
        .iter()
        .find(|m| m.to_lowercase().contains("gemini"))
        .or_else(|| models.first())
        .map(|m| (*m).to_string())
        .unwrap_or_else(|| fallback.to_string())
}

/// Test a channel's keys in order until one works.
///
/// Structured credentials are skipped. The first success decides the result;
/// otherwise the last failure does.
pub async fn test_channel<P: KeyProbe>(probe: &P, channel: &Channel, model: &str) -> ChannelTestResult {
    let keys = channel.keys();
    let total_keys = keys.len();
    let multi_key = total_keys > 1;

    let finish = |result: ProbeResult, key_index: Option<usize>| ChannelTestResult {
        channel_id: channel.id,
        channel_name: channel.name.clone(),
        channel_type: channel.channel_type,
        model: model.to_string(),
        success: result.success,
        outcome: result.outcome,
        message: result.message,
        response_time_ms: result.response_time_ms,
        test_time: display_timestamp(),
        key_index: key_index.filter(|_| multi_key),
        total_keys,
    };

    if keys.is_empty() {
        return finish(ProbeResult::failed(ProbeOutcome::NoKey, "No API key found", 0), None);
    }

    let mut last_failure: Option<(usize, ProbeResult)> = None;
    for (i, key) in keys.iter().enumerate() {
        if is_structured_credential(key) {
            tracing::debug!(channel_id = channel.id, key_index = i + 1, "skipping structured credential");
            continue;
        }
        let result = probe.probe(key, model, channel.base_url()).await;
        if result.success {
            return finish(result, Some(i + 1));
        }
        tracing::debug!(
            channel_id = channel.id,
            key_index = i + 1,
            outcome = %result.outcome,
            "key failed"
        );
        last_failure = Some((i + 1, result));
    }

    match last_failure {
        Some((index, result)) => finish(result, Some(index)),
        None => finish(
            ProbeResult::failed(ProbeOutcome::NoKey, "No valid API key format found", 0),
            None,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedProbe;

    fn channel(key: &str, models: &str) -> Channel {
        Channel {
            id: 5,
            name: "gemini-pool".to_string(),
            channel_type: 24,
            key: key.to_string(),
            models: models.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_resolve_model_precedence() {
        let mut ch = channel("k", "gpt-4o, Gemini-2.0-Flash, gemini-1.5-pro");
        assert_eq!(resolve_model(Some("gemini-x"), &ch, "fb"), "gemini-x");
        assert_eq!(resolve_model(None, &ch, "fb"), "Gemini-2.0-Flash");
        ch.test_model = Some("gemini-2.5-pro".to_string());
        assert_eq!(resolve_model(Some("  "), &ch, "fb"), "gemini-2.5-pro");
    }

    #[test]
    fn test_resolve_model_fallbacks() {
        assert_eq!(resolve_model(None, &channel("k", "gpt-4o,claude"), "fb"), "gpt-4o");
        assert_eq!(resolve_model(None, &channel("k", ""), "gemini-2.5-flash"), "gemini-2.5-flash");
    }

    #[tokio::test]
    async fn test_no_keys() {
        let probe = ScriptedProbe::valid_keys(&[]);
        let result = test_channel(&probe, &channel(" \n ", ""), "m").await;
        assert!(!result.success);
        assert_eq!(result.message, "No API key found");
        assert_eq!(result.total_keys, 0);
        assert_eq!(probe.calls(), 0);
    }

    #[tokio::test]
    async fn test_only_structured_credentials() {
        let probe = ScriptedProbe::valid_keys(&[]);
        let result = test_channel(&probe, &channel("{\"type\":\"sa\"}", ""), "m").await;
        assert_eq!(result.message, "No valid API key format found");
        assert_eq!(result.outcome, ProbeOutcome::NoKey);
        assert_eq!(probe.calls(), 0);
    }

    #[tokio::test]
    async fn test_first_success_wins() {
        let probe = ScriptedProbe::valid_keys(&["k2", "k3"]);
        let result = test_channel(&probe, &channel("k1\n{\"x\":1}\nk2\nk3", ""), "m").await;
        assert!(result.success);
        assert_eq!(result.key_index, Some(3));
        assert_eq!(result.total_keys, 4);
        assert_eq!(probe.calls(), 2);
    }

    #[tokio::test]
    async fn test_last_failure_reported() {
        let probe = ScriptedProbe::valid_keys(&[]);
        let result = test_channel(&probe, &channel("k1\nk2", ""), "m").await;
        assert!(!result.success);
        assert_eq!(result.key_index, Some(2));
        assert_eq!(result.outcome, ProbeOutcome::BadRequest);
    }

    #[tokio::test]
    async fn test_last_failure_keeps_its_outcome() {
        let probe = ScriptedProbe::valid_keys(&[]).with_result(
            "k2",
            ProbeResult::failed(ProbeOutcome::RateLimited, "Rate limit exceeded (429)", 30),
        );
        let result = test_channel(&probe, &channel("k1\nk2", ""), "m").await;
        assert!(!result.success);
        assert_eq!(result.key_index, Some(2));
        assert_eq!(result.outcome, ProbeOutcome::RateLimited);
        assert_eq!(result.message, "Rate limit exceeded (429)");
        assert_eq!(result.response_time_ms, 30);
    }

    #[tokio::test]
    async fn test_single_key_has_no_index() {
        let probe = ScriptedProbe::valid_keys(&["only"]);
        let result = test_channel(&probe, &channel("only", ""), "m").await;
        assert!(result.success);
        assert_eq!(result.key_index, None);
        assert_eq!(result.total_keys, 1);
    }
}
