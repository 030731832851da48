//! Channel export renderers: JSON backup document, CSV sheet, text report.

use chanops_types::backup::ChannelBackup;
use chanops_types::channel::Channel;
use chanops_types::error::ChannelError;
use chanops_types::time::format_unix;

const CSV_HEADERS: [&str; 20] = [
    "ID",
    "Name",
    "Type",
    "TypeName",
    "Status",
    "StatusName",
    "Group",
    "Weight",
    "Priority",
    "Balance",
    "UsedQuota",
    "Models",
    "BaseURL",
    "CreatedTime",
    "TestTime",
    "ResponseTime",
    "Tag",
    "Key",
    "Other",
    "Setting",
];

pub fn render_json(backup: &ChannelBackup) -> Result<String, ChannelError> {
    serde_json::to_string_pretty(backup).map_err(|e| ChannelError::Render(format!("json: {e}")))
}

pub fn render_csv(channels: &[Channel]) -> Result<String, ChannelError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(CSV_HEADERS)
        .map_err(|e| ChannelError::Render(format!("csv: {e}")))?;

    for channel in channels {
        let record = [
            channel.id.to_string(),
            channel.name.clone(),
            channel.channel_type.to_string(),
            channel.type_name(),
            channel.status.to_string(),
            channel.status_name(),
            channel.group.clone(),
            opt_num(channel.weight),
            opt_num(channel.priority),
            format!("{:.2}", channel.balance),
            channel.used_quota.to_string(),
            channel.models.clone(),
            channel.base_url.clone().unwrap_or_default(),
            format_unix(channel.created_time),
            format_unix(channel.test_time),
            channel.response_time.to_string(),
            channel.tag.clone().unwrap_or_default(),
            channel.key.clone(),
            channel.other.clone(),
            channel.setting.clone().unwrap_or_default(),
        ];
        writer
            .write_record(&record)
            .map_err(|e| ChannelError::Render(format!("csv: {e}")))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ChannelError::Render(format!("csv: {e}")))?;
    String::from_utf8(bytes).map_err(|e| ChannelError::Render(format!("csv: {e}")))
}

/// Human-readable report, one block per channel.
pub fn render_txt(channels: &[Channel], export_time: &str) -> String {
    let heavy = "=".repeat(80);
    let light = "-".repeat(80);
    let mut out = String::new();

    out.push_str("Channel export report\n");
    out.push_str(&format!("Export time: {export_time}\n"));
    out.push_str(&format!("Total channels: {}\n", channels.len()));
    out.push_str(&heavy);
    out.push_str("\n\n");

    for channel in channels {
        out.push_str(&format!("Channel ID: {}\n", channel.id));
        out.push_str(&format!("Name: {}\n", channel.name));
        out.push_str(&format!("Type: {} ({})\n", channel.type_name(), channel.channel_type));
        out.push_str(&format!("Status: {} ({})\n", channel.status_name(), channel.status));
        out.push_str(&format!("Group: {}\n", channel.group));
        if let Some(weight) = channel.weight {
            out.push_str(&format!("Weight: {weight}\n"));
        }
        if let Some(priority) = channel.priority {
            out.push_str(&format!("Priority: {priority}\n"));
        }
        out.push_str(&format!("Balance: {:.2}\n", channel.balance));
        out.push_str(&format!("Used quota: {}\n", channel.used_quota));
        out.push_str(&format!("Models: {}\n", channel.models));
        if let Some(url) = channel.base_url() {
            out.push_str(&format!("Base URL: {url}\n"));
        }
        if let Some(tag) = channel.tag.as_deref().filter(|t| !t.is_empty()) {
            out.push_str(&format!("Tag: {tag}\n"));
        }
        out.push_str(&format!("Created: {}\n", format_unix(channel.created_time)));
        if channel.test_time > 0 {
            out.push_str(&format!("Last tested: {}\n", format_unix(channel.test_time)));
        }
        if channel.response_time > 0 {
            out.push_str(&format!("Response time: {} ms\n", channel.response_time));
        }
        out.push_str(&format!("Key: {}\n", channel.key));
        if let Some(setting) = channel.setting.as_deref().filter(|s| !s.is_empty()) {
            out.push_str(&format!("Setting: {setting}\n"));
        }
        out.push_str(&light);
        out.push('\n');
    }

    out
}

fn opt_num(value: Option<i64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}
