//! Request and response shapes for the Gemini `generateContent` endpoint.

use serde::{Deserialize, Serialize};

/// Prompt sent with every probe.
pub const PROBE_PROMPT: &str = "Say 'test successful' in 3 words only.";

#[derive(Debug, Clone, Serialize)]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct Content {
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Part {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationConfig {
    #[serde(rename = "maxOutputTokens")]
    pub max_output_tokens: u32,
    pub temperature: f32,
}

impl GenerateContentRequest {
    /// The minimal request used to check that a key works.
    pub fn probe() -> Self {
        Self {
            contents: vec![Content {
                parts: vec![Part {
                    text: PROBE_PROMPT.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: 10,
                temperature: 0.1,
            },
        }
    }
}

/// Only whether candidates came back matters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorEnvelope {
    #[serde(default)]
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_request_shape() {
        let json = serde_json::to_value(GenerateContentRequest::probe()).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], PROBE_PROMPT);
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 10);
        assert!(json["generationConfig"]["temperature"].as_f64().unwrap() > 0.09);
    }

    #[test]
    fn test_error_envelope() {
        let body: ErrorEnvelope =
            serde_json::from_str(r#"{"error":{"code":403,"message":"API key expired"}}"#).unwrap();
        assert_eq!(body.error.unwrap().message.as_deref(), Some("API key expired"));
    }
}
