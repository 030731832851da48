//! Key validity probe results and their aggregation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Classification of a single probe response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeOutcome {
    Valid,
    UnexpectedFormat,
    InvalidJson,
    BadRequest,
    Forbidden,
    ModelNotFound,
    RateLimited,
    HttpStatus,
    Timeout,
    Connection,
    Unexpected,
    /// The channel had nothing that could be probed.
    NoKey,
}

impl ProbeOutcome {
    /// The provider rejected the credential itself. Only these outcomes
    /// justify removing a key.
    pub fn is_definitive_rejection(self) -> bool {
        matches!(self, ProbeOutcome::BadRequest | ProbeOutcome::Forbidden)
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProbeOutcome::Valid => "valid",
            ProbeOutcome::UnexpectedFormat => "unexpected_format",
            ProbeOutcome::InvalidJson => "invalid_json",
            ProbeOutcome::BadRequest => "bad_request",
            ProbeOutcome::Forbidden => "forbidden",
            ProbeOutcome::ModelNotFound => "model_not_found",
            ProbeOutcome::RateLimited => "rate_limited",
            ProbeOutcome::HttpStatus => "http_status",
            ProbeOutcome::Timeout => "timeout",
            ProbeOutcome::Connection => "connection",
            ProbeOutcome::Unexpected => "unexpected",
            ProbeOutcome::NoKey => "no_key",
        };
        write!(f, "{label}")
    }
}

/// Result of probing one key once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub success: bool,
    pub outcome: ProbeOutcome,
    pub message: String,
    pub response_time_ms: u64,
}

impl ProbeResult {
    pub fn valid(response_time_ms: u64) -> Self {
        Self {
            success: true,
            outcome: ProbeOutcome::Valid,
            message: "API key is valid".to_string(),
            response_time_ms,
        }
    }

    pub fn failed(outcome: ProbeOutcome, message: impl Into<String>, response_time_ms: u64) -> Self {
        Self {
            success: false,
            outcome,
            message: message.into(),
            response_time_ms,
        }
    }
}

/// Result of testing a whole channel (first working key wins).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelTestResult {
    pub channel_id: i64,
    pub channel_name: String,
    pub channel_type: i64,
    pub model: String,
    pub success: bool,
    pub outcome: ProbeOutcome,
    pub message: String,
    pub response_time_ms: u64,
    pub test_time: String,
    /// 1-based index of the key that decided the result; only set when the
    /// channel holds several keys.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_index: Option<usize>,
    pub total_keys: usize,
}

/// A key pulled out of a channel's key blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedKey {
    pub channel_id: i64,
    pub channel_name: String,
    pub channel_type: i64,
    pub channel_status: i64,
    pub api_key: String,
    pub models: String,
}

impl ExtractedKey {
    pub fn is_enabled(&self) -> bool {
        self.channel_status == 1
    }
}

/// Result of probing a single key in a key batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyTestResult {
    /// 1-based position in the batch.
    pub index: usize,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<ExtractedKey>,
    pub model: String,
    #[serde(flatten)]
    pub result: ProbeResult,
}

/// Anything that can be folded into a [`TestSummary`].
pub trait TestRecord {
    fn label(&self) -> String;
    fn passed(&self) -> bool;
    fn response_time_ms(&self) -> u64;
    fn message(&self) -> &str;
}

impl TestRecord for ChannelTestResult {
    fn label(&self) -> String {
        format!("[{}] {}", self.channel_id, self.channel_name)
    }

    fn passed(&self) -> bool {
        self.success
    }

    fn response_time_ms(&self) -> u64 {
        self.response_time_ms
    }

    fn message(&self) -> &str {
        &self.message
    }
}

impl TestRecord for KeyTestResult {
    fn label(&self) -> String {
        format!("key #{} ({})", self.index, crate::channel::mask_key_preview(&self.key))
    }

    fn passed(&self) -> bool {
        self.result.success
    }

    fn response_time_ms(&self) -> u64 {
        self.result.response_time_ms
    }

    fn message(&self) -> &str {
        &self.result.message
    }
}

/// A labelled response time in a summary ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedEntry {
    pub label: String,
    pub response_time_ms: u64,
}

/// A labelled failure message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedEntry {
    pub label: String,
    pub message: String,
}

/// Aggregate statistics over a batch of test results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    /// Percentage in `0.0..=100.0`.
    pub success_rate: f64,
    /// Mean response time of successful probes.
    pub average_response_ms: Option<f64>,
    pub failures: Vec<FailedEntry>,
    pub fastest: Vec<TimedEntry>,
    pub slowest: Vec<TimedEntry>,
}

impl TestSummary {
    const RANKING_SIZE: usize = 3;

    pub fn from_records<T: TestRecord>(records: &[T]) -> Self {
        let total = records.len();
        let mut passed: Vec<TimedEntry> = records
            .iter()
            .filter(|r| r.passed())
            .map(|r| TimedEntry {
                label: r.label(),
                response_time_ms: r.response_time_ms(),
            })
            .collect();
        let failures: Vec<FailedEntry> = records
            .iter()
            .filter(|r| !r.passed())
            .map(|r| FailedEntry {
                label: r.label(),
                message: r.message().to_string(),
            })
            .collect();

        let successful = passed.len();
        let success_rate = if total == 0 {
            0.0
        } else {
            successful as f64 / total as f64 * 100.0
        };
        let average_response_ms = (successful > 0).then(|| {
            passed.iter().map(|e| e.response_time_ms as f64).sum::<f64>() / successful as f64
        });

        passed.sort_by_key(|e| e.response_time_ms);
        let fastest: Vec<TimedEntry> = passed.iter().take(Self::RANKING_SIZE).cloned().collect();
        let slowest: Vec<TimedEntry> = if passed.len() > Self::RANKING_SIZE {
            passed.iter().rev().take(Self::RANKING_SIZE).cloned().collect()
        } else {
            Vec::new()
        };

        Self {
            total,
            successful,
            failed: total - successful,
            success_rate,
            average_response_ms,
            failures,
            fastest,
            slowest,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel_result(id: i64, success: bool, rt: u64) -> ChannelTestResult {
        ChannelTestResult {
            channel_id: id,
            channel_name: format!("ch-{id}"),
            channel_type: 24,
            model: "gemini-2.5-flash".to_string(),
            success,
            outcome: if success { ProbeOutcome::Valid } else { ProbeOutcome::BadRequest },
            message: if success { "API key is valid".into() } else { "Invalid API key (400 Bad Request)".into() },
            response_time_ms: rt,
            test_time: "2025-01-01 00:00:00".to_string(),
            key_index: None,
            total_keys: 1,
        }
    }

    #[test]
    fn test_definitive_rejections() {
        assert!(ProbeOutcome::BadRequest.is_definitive_rejection());
        assert!(ProbeOutcome::Forbidden.is_definitive_rejection());
        assert!(!ProbeOutcome::RateLimited.is_definitive_rejection());
        assert!(!ProbeOutcome::Timeout.is_definitive_rejection());
        assert!(!ProbeOutcome::Valid.is_definitive_rejection());
    }

    #[test]
    fn test_summary_counts_and_average() {
        let results = vec![
            channel_result(1, true, 100),
            channel_result(2, true, 300),
            channel_result(3, false, 50),
            channel_result(4, false, 0),
        ];
        let summary = TestSummary::from_records(&results);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.successful, 2);
        assert_eq!(summary.failed, 2);
        assert!((summary.success_rate - 50.0).abs() < f64::EPSILON);
        assert_eq!(summary.average_response_ms, Some(200.0));
        assert_eq!(summary.failures.len(), 2);
        assert_eq!(summary.failures[0].label, "[3] ch-3");
        assert!(!summary.all_passed());
    }

    #[test]
    fn test_summary_rankings() {
        let results: Vec<_> = [500, 100, 400, 200, 300]
            .iter()
            .enumerate()
            .map(|(i, rt)| channel_result(i as i64 + 1, true, *rt))
            .collect();
        let summary = TestSummary::from_records(&results);
        let fastest: Vec<u64> = summary.fastest.iter().map(|e| e.response_time_ms).collect();
        let slowest: Vec<u64> = summary.slowest.iter().map(|e| e.response_time_ms).collect();
        assert_eq!(fastest, vec![100, 200, 300]);
        assert_eq!(slowest, vec![500, 400, 300]);
    }

    #[test]
    fn test_summary_small_batch_has_no_slowest() {
        let results = vec![channel_result(1, true, 10), channel_result(2, true, 20)];
        let summary = TestSummary::from_records(&results);
        assert_eq!(summary.fastest.len(), 2);
        assert!(summary.slowest.is_empty());
    }

    #[test]
    fn test_summary_empty() {
        let summary = TestSummary::from_records::<ChannelTestResult>(&[]);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.success_rate, 0.0);
        assert_eq!(summary.average_response_ms, None);
        assert!(summary.all_passed());
    }

    #[test]
    fn test_key_result_serializes_flat() {
        let result = KeyTestResult {
            index: 1,
            key: "AIzaSyA1234567890abcd".to_string(),
            source: None,
            model: "gemini-2.5-flash".to_string(),
            result: ProbeResult::valid(120),
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["outcome"], "valid");
        assert_eq!(value["response_time_ms"], 120);
        assert!(value.get("source").is_none());
    }
}
