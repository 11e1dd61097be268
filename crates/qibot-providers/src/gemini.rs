//! Gemini API key provider (Generative Language API), non-streaming.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use qibot_core::config::GeminiConfig;
use qibot_core::{BackendError, BackendErrorKind, BackendResult, GenerativeBackend};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::{Value, json};

use crate::USER_AGENT;

/// Resolved Gemini settings.
#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_output_tokens: Option<u32>,
    pub timeout: Duration,
}

impl GeminiSettings {
    /// Returns `None` when no API key is configured; the caller then runs
    /// without a generative backend.
    pub fn from_config(config: &GeminiConfig) -> Result<Option<Self>> {
        let Some(api_key) = config.effective_api_key() else {
            return Ok(None);
        };
        let base_url = config.effective_base_url().trim_end_matches('/').to_string();
        url::Url::parse(&base_url).with_context(|| format!("Invalid Gemini base URL: {base_url}"))?;

        Ok(Some(Self {
            api_key: api_key.to_string(),
            base_url,
            model: config.model.clone(),
            max_output_tokens: config.max_output_tokens,
            timeout: config.timeout(),
        }))
    }
}

/// `generateContent` client implementing [`GenerativeBackend`].
pub struct GeminiBackend {
    settings: GeminiSettings,
    http: reqwest::Client,
}

impl GeminiBackend {
    pub fn new(settings: GeminiSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .context("Failed to build Gemini HTTP client")?;
        Ok(Self { settings, http })
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.settings.base_url, self.settings.model
        )
    }
}

#[async_trait]
impl GenerativeBackend for GeminiBackend {
    async fn generate(&self, prompt: &str) -> BackendResult<String> {
        let request = build_request(prompt, self.settings.max_output_tokens);

        let response = self
            .http
            .post(self.endpoint())
            .headers(build_headers(&self.settings.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(BackendError::http_status(status.as_u16(), &body));
        }

        let value: Value = serde_json::from_str(&body).map_err(|e| {
            BackendError::new(
                BackendErrorKind::EmptyResponse,
                format!("Failed to parse Gemini response JSON: {e}"),
            )
        })?;
        extract_text(&value).ok_or_else(BackendError::empty_response)
    }
}

fn build_request(prompt: &str, max_output_tokens: Option<u32>) -> Value {
    let mut request = json!({
        "contents": [{
            "role": "user",
            "parts": [{
                "text": prompt
            }]
        }]
    });
    if let Some(max) = max_output_tokens {
        request["generationConfig"] = json!({ "maxOutputTokens": max });
    }
    request
}

/// First non-blank text part of the first candidate.
fn extract_text(value: &Value) -> Option<String> {
    value
        .get("candidates")?
        .as_array()?
        .first()?
        .get("content")?
        .get("parts")?
        .as_array()?
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .find(|text| !text.trim().is_empty())
        .map(|text| text.trim().to_string())
}

fn build_headers(api_key: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        "x-goog-api-key",
        HeaderValue::from_str(api_key).unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    headers.insert("accept", HeaderValue::from_static("application/json"));
    headers.insert("content-type", HeaderValue::from_static("application/json"));
    headers.insert("user-agent", HeaderValue::from_static(USER_AGENT));
    headers
}

fn classify_reqwest_error(e: &reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::timeout(format!("Request timed out: {e}"))
    } else if e.is_connect() {
        BackendError::unavailable(format!("Connection failed: {e}"))
    } else {
        BackendError::unavailable(format!("Network error: {e}"))
    }
}
