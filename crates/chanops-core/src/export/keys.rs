//! Key export renderers.

use chanops_types::error::ChannelError;
use chanops_types::probe::ExtractedKey;

use super::KeyExportFormat;

pub fn render_keys(keys: &[ExtractedKey], format: KeyExportFormat) -> Result<String, ChannelError> {
    match format {
        KeyExportFormat::Simple => Ok(render_simple(keys.iter().map(|k| k.api_key.as_str()))),
        KeyExportFormat::Detailed => Ok(render_detailed(keys)),
        KeyExportFormat::Csv => render_csv(keys),
    }
}

/// One key per line.
pub fn render_simple<'a>(keys: impl IntoIterator<Item = &'a str>) -> String {
    let mut out = String::new();
    for key in keys {
        out.push_str(key);
        out.push('\n');
    }
    out
}

fn render_detailed(keys: &[ExtractedKey]) -> String {
    let mut out = String::new();
    for key in keys {
        let status = if key.is_enabled() { "enabled" } else { "disabled" };
        out.push_str(&format!(
            "# Channel: {} (ID: {}, Status: {status})\n{}\n\n",
            key.channel_name, key.channel_id, key.api_key
        ));
    }
    out
}

fn render_csv(keys: &[ExtractedKey]) -> Result<String, ChannelError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(["channel_id", "channel_name", "status", "api_key", "models"])
        .map_err(|e| ChannelError::Render(format!("csv: {e}")))?;
    for key in keys {
        let status = if key.is_enabled() { "enabled" } else { "disabled" };
        writer
            .write_record([
                key.channel_id.to_string().as_str(),
                key.channel_name.as_str(),
                status,
                key.api_key.as_str(),
                key.models.replace(',', ";").as_str(),
            ])
            .map_err(|e| ChannelError::Render(format!("csv: {e}")))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| ChannelError::Render(format!("csv: {e}")))?;
    String::from_utf8(bytes).map_err(|e| ChannelError::Render(format!("csv: {e}")))
}

/// Parse a plain key list: one key per line, blank lines and `#` comments ignored.
pub fn parse_key_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(id: i64, status: i64, api_key: &str) -> ExtractedKey {
        ExtractedKey {
            channel_id: id,
            channel_name: format!("gemini-{id}"),
            channel_type: 24,
            channel_status: status,
            api_key: api_key.to_string(),
            models: "gemini-2.5-flash,gemini-2.5-pro".to_string(),
        }
    }

    #[test]
    fn test_simple_format() {
        let keys = vec![key(1, 1, "k-one"), key(2, 1, "k-two")];
        assert_eq!(render_keys(&keys, KeyExportFormat::Simple).unwrap(), "k-one\nk-two\n");
    }

    #[test]
    fn test_detailed_format() {
        let keys = vec![key(7, 2, "k-seven")];
        let out = render_keys(&keys, KeyExportFormat::Detailed).unwrap();
        assert_eq!(out, "# Channel: gemini-7 (ID: 7, Status: disabled)\nk-seven\n\n");
    }

    #[test]
    fn test_csv_format_replaces_model_commas() {
        let keys = vec![key(3, 1, "k-three")];
        let out = render_keys(&keys, KeyExportFormat::Csv).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "channel_id,channel_name,status,api_key,models");
        assert_eq!(lines[1], "3,gemini-3,enabled,k-three,gemini-2.5-flash;gemini-2.5-pro");
    }

    #[test]
    fn test_parse_key_list_skips_comments() {
        let content = "# exported keys\nAIza-one\n\n  AIza-two  \n# Channel: x\n";
        assert_eq!(parse_key_list(content), vec!["AIza-one", "AIza-two"]);
    }
}
