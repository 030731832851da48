//! Test result documents written after a batch run.

use serde::Serialize;

use chanops_types::error::ChannelError;
use chanops_types::probe::{ChannelTestResult, KeyTestResult, TestSummary};

/// JSON document written by `channel test --export`.
#[derive(Debug, Serialize)]
pub struct ChannelTestReport<'a> {
    pub test_time: &'a str,
    pub total_channels: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: &'a [ChannelTestResult],
}

impl<'a> ChannelTestReport<'a> {
    pub fn new(test_time: &'a str, results: &'a [ChannelTestResult]) -> Self {
        let successful = results.iter().filter(|r| r.success).count();
        Self {
            test_time,
            total_channels: results.len(),
            successful,
            failed: results.len() - successful,
            results,
        }
    }

    pub fn to_json(&self) -> Result<String, ChannelError> {
        serde_json::to_string_pretty(self).map_err(|e| ChannelError::Render(format!("json: {e}")))
    }
}

/// Plain-text report written by `keys test --save-results`.
pub fn render_key_results(results: &[KeyTestResult], model: &str, test_time: &str) -> String {
    let summary = TestSummary::from_records(results);
    let rule = "=".repeat(60);
    let mut out = String::new();

    out.push_str("Gemini API key test results\n");
    out.push_str(&format!("Test time: {test_time}\n"));
    out.push_str(&format!("Model: {model}\n"));
    out.push_str(&format!(
        "Total: {}, valid: {}, invalid: {}, success rate: {:.1}%\n",
        summary.total, summary.successful, summary.failed, summary.success_rate
    ));
    out.push_str(&rule);
    out.push_str("\n\n");

    let (valid, invalid): (Vec<&KeyTestResult>, Vec<&KeyTestResult>) =
        results.iter().partition(|r| r.result.success);

    out.push_str(&format!("VALID KEYS ({})\n", valid.len()));
    out.push_str(&"-".repeat(60));
    out.push('\n');
    for result in &valid {
        push_entry(&mut out, result);
    }

    out.push('\n');
    out.push_str(&format!("INVALID KEYS ({})\n", invalid.len()));
    out.push_str(&"-".repeat(60));
    out.push('\n');
    for result in &invalid {
        push_entry(&mut out, result);
    }

    out
}

fn push_entry(out: &mut String, result: &KeyTestResult) {
    out.push_str(&result.key);
    out.push('\n');
    if let Some(source) = &result.source {
        out.push_str(&format!(
            "  channel: {} (ID: {})\n",
            source.channel_name, source.channel_id
        ));
    }
    out.push_str(&format!("  result: {}\n", result.result.message));
    out.push_str(&format!("  response time: {} ms\n", result.result.response_time_ms));
}
