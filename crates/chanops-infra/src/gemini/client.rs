//! GeminiKeyProbe -- concrete [`KeyProbe`] for the Gemini API.
//!
//! Sends one tiny `generateContent` request per key and classifies the
//! response. The key travels as the `key` query parameter, so reqwest errors
//! are stripped of their URL before they reach a message or a log line.

use std::time::{Duration, Instant};

use reqwest::StatusCode;
use tracing::Instrument;

use chanops_core::probe::KeyProbe;
use chanops_observe::conventions::{HTTP_RESPONSE_STATUS_CODE, OP_PROBE, PROVIDER_GEMINI, probe_span_name};
use chanops_types::probe::{ProbeOutcome, ProbeResult};

use super::types::{ErrorEnvelope, GenerateContentRequest, GenerateContentResponse};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiKeyProbe {
    client: reqwest::Client,
    base_url: String,
    timeout_secs: u64,
}

impl GeminiKeyProbe {
    pub fn new(timeout_secs: u64) -> Result<Self, reqwest::Error> {
        let timeout_secs = timeout_secs.max(1);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs,
        })
    }

    /// Override the default base URL (proxies, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn send(&self, key: &str, model: &str, base_url: &str) -> ProbeResult {
        let url = format!("{}/models/{model}:generateContent", base_url.trim_end_matches('/'));
        let started = Instant::now();

        let response = self
            .client
            .post(&url)
            .query(&[("key", key)])
            .json(&GenerateContentRequest::probe())
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => return self.transport_failure(e),
        };
        let status = response.status();
        tracing::Span::current().record(HTTP_RESPONSE_STATUS_CODE, status.as_u16());

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return self.transport_failure(e),
        };
        let elapsed = started.elapsed().as_millis() as u64;
        classify(status, &body, model, elapsed)
    }

    fn transport_failure(&self, e: reqwest::Error) -> ProbeResult {
        if e.is_timeout() {
            ProbeResult::failed(
                ProbeOutcome::Timeout,
                format!("Request timeout ({}s)", self.timeout_secs),
                self.timeout_secs * 1000,
            )
        } else if e.is_connect() {
            ProbeResult::failed(
                ProbeOutcome::Connection,
                format!("Connection error: {}", e.without_url()),
                0,
            )
        } else {
            ProbeResult::failed(
                ProbeOutcome::Unexpected,
                format!("Unexpected error: {}", e.without_url()),
                0,
            )
        }
    }
}

impl KeyProbe for GeminiKeyProbe {
    async fn probe(&self, key: &str, model: &str, base_url: Option<&str>) -> ProbeResult {
        let base_url = base_url.unwrap_or(self.base_url.as_str()).to_string();
        let span = tracing::info_span!(
            "gen_ai.probe",
            otel.name = %probe_span_name(model),
            gen_ai.operation.name = OP_PROBE,
            gen_ai.provider.name = PROVIDER_GEMINI,
            gen_ai.request.model = %model,
            http.response.status_code = tracing::field::Empty,
        );

        let result = self.send(key, model, &base_url).instrument(span.clone()).await;
        span.in_scope(|| {
            tracing::debug!(
                outcome = %result.outcome,
                response_time_ms = result.response_time_ms,
                "probe finished"
            );
        });
        result
    }
}

/// Turn an HTTP response into a probe result.
pub fn classify(status: StatusCode, body: &str, model: &str, elapsed_ms: u64) -> ProbeResult {
    match status.as_u16() {
        200 => match serde_json::from_str::<GenerateContentResponse>(body) {
            Ok(parsed) if !parsed.candidates.is_empty() => ProbeResult::valid(elapsed_ms),
            Ok(_) => ProbeResult::failed(ProbeOutcome::UnexpectedFormat, "Unexpected response format", elapsed_ms),
            Err(_) => ProbeResult::failed(ProbeOutcome::InvalidJson, "Invalid JSON response", elapsed_ms),
        },
        400 => ProbeResult::failed(ProbeOutcome::BadRequest, "Invalid API key (400 Bad Request)", elapsed_ms),
        403 => {
            let message = serde_json::from_str::<ErrorEnvelope>(body)
                .ok()
                .and_then(|env| env.error)
                .and_then(|err| err.message)
                .filter(|m| !m.is_empty());
            match message {
                Some(m) => ProbeResult::failed(ProbeOutcome::Forbidden, format!("Forbidden: {m}"), elapsed_ms),
                None => ProbeResult::failed(ProbeOutcome::Forbidden, "API key forbidden (403)", elapsed_ms),
            }
        }
        404 => ProbeResult::failed(ProbeOutcome::ModelNotFound, format!("Model not found: {model}"), elapsed_ms),
        429 => ProbeResult::failed(ProbeOutcome::RateLimited, "Rate limit exceeded (429)", elapsed_ms),
        code => {
            let snippet: String = body.chars().take(100).collect();
            ProbeResult::failed(ProbeOutcome::HttpStatus, format!("HTTP {code}: {snippet}"), elapsed_ms)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MODEL: &str = "gemini-2.5-flash";

    async fn server_responding(status: u16, body: serde_json::Value) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/models/{MODEL}:generateContent")))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&server)
            .await;
        server
    }

    fn probe_for(server: &MockServer) -> GeminiKeyProbe {
        GeminiKeyProbe::new(5).unwrap().with_base_url(server.uri())
    }

    #[tokio::test]
    async fn test_valid_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/models/{MODEL}:generateContent")))
            .and(query_param("key", "AIza-good"))
            .and(body_partial_json(json!({"generationConfig": {"maxOutputTokens": 10}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "Test successful indeed"}]}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = probe_for(&server).probe("AIza-good", MODEL, None).await;
        assert!(result.success, "{result:?}");
        assert_eq!(result.message, "API key is valid");
    }

    #[tokio::test]
    async fn test_channel_base_url_overrides_default() {
        let server = server_responding(200, json!({"candidates": [{}]})).await;
        let probe = GeminiKeyProbe::new(5).unwrap();
        let base = format!("{}/", server.uri());
        let result = probe.probe("k", MODEL, Some(&base)).await;
        assert!(result.success, "{result:?}");
    }

    #[tokio::test]
    async fn test_no_candidates() {
        let server = server_responding(200, json!({"promptFeedback": {}})).await;
        let result = probe_for(&server).probe("k", MODEL, None).await;
        assert_eq!(result.outcome, ProbeOutcome::UnexpectedFormat);
        assert_eq!(result.message, "Unexpected response format");
    }

    #[tokio::test]
    async fn test_bad_request() {
        let server = server_responding(400, json!({"error": {"message": "API key not valid"}})).await;
        let result = probe_for(&server).probe("k", MODEL, None).await;
        assert_eq!(result.outcome, ProbeOutcome::BadRequest);
        assert_eq!(result.message, "Invalid API key (400 Bad Request)");
        assert!(result.outcome.is_definitive_rejection());
    }

    #[tokio::test]
    async fn test_forbidden_with_message() {
        let server = server_responding(403, json!({"error": {"message": "Permission denied"}})).await;
        let result = probe_for(&server).probe("k", MODEL, None).await;
        assert_eq!(result.message, "Forbidden: Permission denied");
    }

    #[tokio::test]
    async fn test_rate_limited_is_not_definitive() {
        let server = server_responding(429, json!({})).await;
        let result = probe_for(&server).probe("k", MODEL, None).await;
        assert_eq!(result.message, "Rate limit exceeded (429)");
        assert!(!result.outcome.is_definitive_rejection());
    }

    #[tokio::test]
    async fn test_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(2500)))
            .mount(&server)
            .await;
        let probe = GeminiKeyProbe::new(1).unwrap().with_base_url(server.uri());
        let result = probe.probe("k", MODEL, None).await;
        assert_eq!(result.outcome, ProbeOutcome::Timeout);
        assert_eq!(result.message, "Request timeout (1s)");
        assert_eq!(result.response_time_ms, 1000);
    }

    #[tokio::test]
    async fn test_connection_error_hides_key() {
        let probe = GeminiKeyProbe::new(2).unwrap().with_base_url("http://127.0.0.1:1");
        let result = probe.probe("AIza-secret-key", MODEL, None).await;
        assert_eq!(result.outcome, ProbeOutcome::Connection);
        assert!(result.message.starts_with("Connection error: "));
        assert!(!result.message.contains("AIza-secret-key"));
        assert_eq!(result.response_time_ms, 0);
    }

    #[test]
    fn test_classify_other_statuses() {
        let r = classify(StatusCode::OK, "<html>", MODEL, 7);
        assert_eq!(r.outcome, ProbeOutcome::InvalidJson);

        let r = classify(StatusCode::FORBIDDEN, "", MODEL, 7);
        assert_eq!(r.message, "API key forbidden (403)");

        let r = classify(StatusCode::NOT_FOUND, "", "gemini-x", 7);
        assert_eq!(r.message, "Model not found: gemini-x");

        let long = "x".repeat(300);
        let r = classify(StatusCode::INTERNAL_SERVER_ERROR, &long, MODEL, 7);
        assert_eq!(r.message, format!("HTTP 500: {}", "x".repeat(100)));
        assert_eq!(r.response_time_ms, 7);
    }
}
