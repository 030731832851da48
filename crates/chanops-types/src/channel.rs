//! Channel records and helpers for working with their credential blobs.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Placeholder used wherever a secret is hidden from output.
pub const MASK: &str = "***masked***";

/// Default model tested when a channel names none.
pub const DEFAULT_TEST_MODEL: &str = "gemini-2.5-flash";

/// A configured AI-provider credential/route, one row of the `channels` table.
///
/// Field names follow the JSON layout of backup files, so a backup written by
/// the gateway's own tooling imports unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Channel {
    pub id: i64,
    #[serde(rename = "type")]
    pub channel_type: i64,
    /// Newline-delimited credential blob.
    pub key: String,
    pub openai_organization: Option<String>,
    pub test_model: Option<String>,
    pub status: i64,
    pub name: String,
    pub weight: Option<i64>,
    pub created_time: i64,
    pub test_time: i64,
    pub response_time: i64,
    pub base_url: Option<String>,
    pub other: String,
    pub balance: f64,
    pub balance_updated_time: i64,
    /// Comma-separated model names.
    pub models: String,
    pub group: String,
    pub used_quota: i64,
    pub model_mapping: Option<String>,
    pub status_code_mapping: Option<String>,
    pub priority: Option<i64>,
    pub auto_ban: Option<i64>,
    pub other_info: String,
    pub tag: Option<String>,
    pub setting: Option<String>,
    pub param_override: Option<String>,
    pub channel_info: serde_json::Value,
}

impl Channel {
    /// Individual credentials held in the key blob.
    pub fn keys(&self) -> Vec<&str> {
        split_keys(&self.key)
    }

    /// Models listed on the channel, in declaration order.
    pub fn model_list(&self) -> Vec<&str> {
        self.models
            .split(',')
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .collect()
    }

    /// Base URL override, ignoring empty strings.
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref().filter(|u| !u.trim().is_empty())
    }

    pub fn status_name(&self) -> String {
        status_name(self.status)
    }

    pub fn type_name(&self) -> String {
        type_name(self.channel_type)
    }

    /// Copy of this channel with `key` and `other` masked for display or export.
    pub fn masked(&self) -> Channel {
        let mut masked = self.clone();
        if !self.key.is_empty() {
            masked.key = mask_secret(&self.key);
        }
        if !self.other.is_empty() {
            masked.other = mask_secret(&self.other);
        }
        masked
    }
}

/// Lifecycle status of a channel as stored in the `status` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    Unknown,
    Enabled,
    ManuallyDisabled,
    AutoDisabled,
    Other(i64),
}

impl ChannelStatus {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => ChannelStatus::Unknown,
            1 => ChannelStatus::Enabled,
            2 => ChannelStatus::ManuallyDisabled,
            3 => ChannelStatus::AutoDisabled,
            other => ChannelStatus::Other(other),
        }
    }

    pub fn code(self) -> i64 {
        match self {
            ChannelStatus::Unknown => 0,
            ChannelStatus::Enabled => 1,
            ChannelStatus::ManuallyDisabled => 2,
            ChannelStatus::AutoDisabled => 3,
            ChannelStatus::Other(code) => code,
        }
    }
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelStatus::Unknown => write!(f, "Unknown"),
            ChannelStatus::Enabled => write!(f, "Enabled"),
            ChannelStatus::ManuallyDisabled => write!(f, "Manually Disabled"),
            ChannelStatus::AutoDisabled => write!(f, "Auto Disabled"),
            ChannelStatus::Other(code) => write!(f, "Unknown ({code})"),
        }
    }
}

/// Display name of a status code.
pub fn status_name(code: i64) -> String {
    ChannelStatus::from_code(code).to_string()
}

const TYPE_NAMES: &[(i64, &str)] = &[
    (1, "OpenAI"),
    (2, "API2D"),
    (3, "Azure"),
    (4, "CloseAI"),
    (5, "CloseAI-SB"),
    (6, "OpenSB"),
    (7, "AI-LS"),
    (8, "AI-LS2"),
    (9, "AI-LS3"),
    (10, "AI360"),
    (11, "PaLM"),
    (12, "Baidu"),
    (13, "Zhipu"),
    (14, "Ali"),
    (15, "Xunfei"),
    (16, "AI-Proxy"),
    (17, "OpenRouter"),
    (18, "AI-LB"),
    (19, "Replicate"),
    (20, "Midjourney"),
    (21, "Anthropic"),
    (22, "AWS"),
    (23, "Cohere"),
    (24, "Custom"),
    (25, "Gemini"),
    (26, "Moonshot"),
    (27, "Baichuan"),
    (28, "Minimax"),
    (29, "DeepSeek"),
    (30, "Groq"),
    (31, "Ollama"),
    (32, "PerplexityAI"),
    (33, "Cloudflare"),
    (34, "Lingyiwanwu"),
    (35, "Doubao"),
    (36, "Tencent"),
    (37, "Dify"),
    (38, "Vertex"),
    (39, "Coze"),
    (40, "Jina"),
    (41, "Mistral"),
    (42, "Siliconflow"),
    (43, "Xinference"),
    (44, "MidjourneyPlus"),
    (45, "Suno"),
    (46, "Jimeng"),
    (47, "Mokaai"),
    (48, "Kling"),
    (49, "XAI"),
];

/// Display name of a channel type code.
pub fn type_name(code: i64) -> String {
    TYPE_NAMES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| (*name).to_string())
        .unwrap_or_else(|| format!("Unknown ({code})"))
}

/// Selection criteria for listing channels.
///
/// An empty `types` list matches every type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelFilter {
    pub id: Option<i64>,
    pub types: Vec<i64>,
    pub status: Option<i64>,
}

impl ChannelFilter {
    pub fn matches(&self, channel: &Channel) -> bool {
        self.id.is_none_or(|id| channel.id == id)
            && (self.types.is_empty() || self.types.contains(&channel.channel_type))
            && self.status.is_none_or(|s| channel.status == s)
    }
}

/// Split a newline-delimited key blob into trimmed, non-empty keys.
pub fn split_keys(blob: &str) -> Vec<&str> {
    blob.split('\n')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .collect()
}

/// Whether a key-blob entry is a structured credential (JSON document) rather
/// than a plain API key. Structured credentials are never probed.
pub fn is_structured_credential(key: &str) -> bool {
    key.starts_with('[') || key.starts_with('{')
}

/// Mask a secret, keeping the first and last four characters when it is long
/// enough to do so without revealing most of it.
pub fn mask_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 8 {
        return MASK.to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}{MASK}{tail}")
}

/// Short preview of an API key for progress output: `AIzaSyAbcd...wxyz`.
pub fn mask_key_preview(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 14 {
        return key.to_string();
    }
    let head: String = chars[..10].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_keys_trims_and_drops_blanks() {
        let blob = "  key-one \n\n key-two\r\n\n";
        assert_eq!(split_keys(blob), vec!["key-one", "key-two"]);
        assert!(split_keys("\n \n").is_empty());
    }

    #[test]
    fn test_structured_credential_detection() {
        assert!(is_structured_credential("{\"type\":\"service_account\"}"));
        assert!(is_structured_credential("[1,2]"));
        assert!(!is_structured_credential("AIzaSyExample"));
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("short"), MASK);
        assert_eq!(mask_secret("12345678"), MASK);
        assert_eq!(mask_secret("abcdefghijkl"), "abcd***masked***ijkl");
    }

    #[test]
    fn test_mask_secret_multibyte_safe() {
        let masked = mask_secret("密钥密钥密钥密钥密钥");
        assert!(masked.starts_with("密钥密钥"));
        assert!(masked.ends_with("密钥密钥"));
    }

    #[test]
    fn test_mask_key_preview() {
        assert_eq!(mask_key_preview("short-key"), "short-key");
        assert_eq!(
            mask_key_preview("AIzaSyA1234567890abcdWXYZ"),
            "AIzaSyA123...WXYZ"
        );
    }

    #[test]
    fn test_status_and_type_names() {
        assert_eq!(status_name(1), "Enabled");
        assert_eq!(status_name(2), "Manually Disabled");
        assert_eq!(status_name(3), "Auto Disabled");
        assert_eq!(status_name(9), "Unknown (9)");
        assert_eq!(type_name(24), "Custom");
        assert_eq!(type_name(36), "Tencent");
        assert_eq!(type_name(999), "Unknown (999)");
    }

    #[test]
    fn test_model_list_and_base_url() {
        let channel = Channel {
            models: "gpt-4o, gemini-2.5-pro,,".to_string(),
            base_url: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(channel.model_list(), vec!["gpt-4o", "gemini-2.5-pro"]);
        assert_eq!(channel.base_url(), None);
    }

    #[test]
    fn test_masked_hides_key_and_other() {
        let channel = Channel {
            key: "AIzaSyA1234567890".to_string(),
            other: "".to_string(),
            ..Default::default()
        };
        let masked = channel.masked();
        assert_eq!(masked.key, "AIza***masked***7890");
        assert_eq!(masked.other, "");
    }

    #[test]
    fn test_masked_leaves_empty_key_empty() {
        let channel = Channel {
            other: "region=us".to_string(),
            ..Default::default()
        };
        let masked = channel.masked();
        assert_eq!(masked.key, "");
        assert_ne!(masked.other, "region=us");
    }

    #[test]
    fn test_filter_matches() {
        let channel = Channel {
            id: 7,
            channel_type: 24,
            status: 1,
            ..Default::default()
        };
        assert!(ChannelFilter::default().matches(&channel));
        assert!(ChannelFilter { types: vec![24, 36], ..Default::default() }.matches(&channel));
        assert!(!ChannelFilter { status: Some(2), ..Default::default() }.matches(&channel));
        assert!(!ChannelFilter { id: Some(8), ..Default::default() }.matches(&channel));
    }

    #[test]
    fn test_channel_deserializes_partial_json() {
        let json = r#"{"id": 3, "type": 24, "name": "gemini-a", "key": "k1\nk2", "group": "default"}"#;
        let channel: Channel = serde_json::from_str(json).unwrap();
        assert_eq!(channel.channel_type, 24);
        assert_eq!(channel.keys(), vec!["k1", "k2"]);
        assert_eq!(channel.group, "default");
        assert!(channel.channel_info.is_null());
    }
}
