//! Gemini provider: Google Generative Language REST API over reqwest.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use crate::error::LlmError;
use crate::llm::provider::{CompletionRequest, LlmProvider};

/// Default API root.
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const PROVIDER: &str = "gemini";

/// Calls `models/{model}:generateContent` once per request.
pub struct GeminiProvider {
    api_key: SecretString,
    model: String,
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(api_key: SecretString, model: impl Into<String>, timeout: Duration) -> Self {
        Self::with_base_url(api_key, model, timeout, GEMINI_BASE_URL)
    }

    /// Point the provider at a different API root (used by tests).
    pub fn with_base_url(
        api_key: SecretString,
        model: impl Into<String>,
        timeout: Duration,
        base_url: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build Gemini HTTP client with timeout: {e}");
                reqwest::Client::new()
            });
        Self {
            api_key,
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            client,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn request_body(request: &CompletionRequest) -> serde_json::Value {
        let mut body = json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": request.prompt }]
            }]
        });
        if let Some(m) = request.max_tokens {
            body["generationConfig"] = json!({ "maxOutputTokens": m });
        }
        body
    }

    fn map_send_error(&self, e: reqwest::Error) -> LlmError {
        if e.is_timeout() {
            LlmError::Timeout {
                provider: PROVIDER.into(),
                timeout: self.timeout,
            }
        } else {
            LlmError::RequestFailed {
                provider: PROVIDER.into(),
                reason: e.to_string(),
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

/// Concatenate the text parts of the first candidate.
fn extract_text(response: GenerateContentResponse) -> Result<String, LlmError> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(LlmError::EmptyResponse {
            provider: PROVIDER.into(),
        });
    }
    Ok(text)
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: CompletionRequest) -> Result<String, LlmError> {
        let resp = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&Self::request_body(&request))
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(LlmError::AuthFailed {
                provider: PROVIDER.into(),
            });
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::RequestFailed {
                provider: PROVIDER.into(),
                reason: format!("HTTP {status}: {body}"),
            });
        }

        let parsed: GenerateContentResponse =
            resp.json().await.map_err(|e| LlmError::InvalidResponse {
                provider: PROVIDER.into(),
                reason: e.to_string(),
            })?;

        extract_text(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> GeminiProvider {
        GeminiProvider::new(
            SecretString::from("test-key"),
            "gemini-2.5-flash",
            Duration::from_secs(5),
        )
    }

    #[test]
    fn endpoint_includes_model() {
        assert_eq!(
            provider().endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let p = GeminiProvider::with_base_url(
            SecretString::from("k"),
            "m",
            Duration::from_secs(1),
            "http://127.0.0.1:9999/",
        );
        assert_eq!(p.endpoint(), "http://127.0.0.1:9999/models/m:generateContent");
    }

    #[test]
    fn request_body_shape() {
        let body = GeminiProvider::request_body(
            &CompletionRequest::new("hello").with_max_tokens(256),
        );
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 256);

        let bare = GeminiProvider::request_body(&CompletionRequest::new("hi"));
        assert!(bare.get("generationConfig").is_none());
    }

    #[test]
    fn extract_text_joins_parts() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": { "parts": [{ "text": "1. Drink " }, { "text": "water" }] }
            }]
        }))
        .unwrap();
        assert_eq!(extract_text(response).unwrap(), "1. Drink water");
    }

    #[test]
    fn extract_text_empty_is_error() {
        let response: GenerateContentResponse =
            serde_json::from_value(json!({ "candidates": [] })).unwrap();
        assert!(matches!(
            extract_text(response),
            Err(LlmError::EmptyResponse { .. })
        ));
    }

    #[test]
    fn model_name_reported() {
        assert_eq!(provider().model_name(), "gemini-2.5-flash");
    }
}
