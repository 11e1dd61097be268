//! WhatsApp Cloud API: inbound webhook payloads and the outbound `messages` client.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use qibot_core::config::WhatsAppConfig;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::{Value, json};

const SEND_TIMEOUT: Duration = Duration::from_secs(15);

/// Top level of a webhook notification. Unknown fields are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookChange {
    #[serde(default)]
    pub value: ChangeValue,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChangeValue {
    #[serde(default)]
    pub messages: Vec<InboundMessage>,
}

#[derive(Debug, Deserialize)]
pub struct InboundMessage {
    pub from: String,
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub text: Option<TextBody>,
}

#[derive(Debug, Deserialize)]
pub struct TextBody {
    pub body: String,
}

impl WebhookPayload {
    /// `(sender, text)` for every message with a non-blank text body, in payload
    /// order. The text is passed on as received.
    pub fn text_messages(&self) -> Vec<(String, String)> {
        self.entry
            .iter()
            .flat_map(|entry| &entry.changes)
            .flat_map(|change| &change.value.messages)
            .filter_map(|message| {
                let body = &message.text.as_ref()?.body;
                if body.trim().is_empty() || message.from.trim().is_empty() {
                    return None;
                }
                Some((message.from.trim().to_string(), body.clone()))
            })
            .collect()
    }
}

/// Resolved outbound settings.
#[derive(Debug, Clone)]
pub struct WhatsAppSettings {
    pub api_base_url: String,
    pub phone_number_id: String,
    pub access_token: String,
}

impl WhatsAppSettings {
    /// Returns `None` unless both the phone number id and the token are set.
    pub fn from_config(config: &WhatsAppConfig) -> Option<Self> {
        let phone_number_id = config.effective_phone_number_id()?;
        let access_token = config.effective_access_token()?;
        Some(Self {
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            phone_number_id: phone_number_id.to_string(),
            access_token: access_token.to_string(),
        })
    }
}

pub struct WhatsAppClient {
    settings: WhatsAppSettings,
    http: reqwest::Client,
}

impl WhatsAppClient {
    pub fn new(settings: WhatsAppSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .context("Failed to build WhatsApp HTTP client")?;
        Ok(Self { settings, http })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/{}/messages",
            self.settings.api_base_url, self.settings.phone_number_id
        )
    }

    /// Sends a plain text message to `to`.
    pub async fn send_text(&self, to: &str, body: &str) -> Result<()> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.settings.access_token))
            .context("WhatsApp access token is not a valid header value")?;
        headers.insert(AUTHORIZATION, bearer);

        let response = self
            .http
            .post(self.messages_url())
            .headers(headers)
            .json(&text_message(to, body))
            .send()
            .await
            .context("Failed to reach the WhatsApp API")?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
            .unwrap_or(body);
        bail!("WhatsApp API error: HTTP {}: {message}", status.as_u16())
    }
}

fn text_message(to: &str, body: &str) -> Value {
    json!({
        "messaging_product": "whatsapp",
        "to": to,
        "type": "text",
        "text": { "body": body }
    })
}
