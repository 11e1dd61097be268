//! Google Sheets persistence sink (`values:append`).
//!
//! One tab per record kind; every row starts with a `dd/mm/YYYY HH:MM:SS`
//! timestamp.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};
use qibot_core::config::SheetsConfig;
use qibot_core::{Feedback, PersistenceSink, PlanInquiry, SupportOutcome};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde_json::{Value, json};

use crate::USER_AGENT;

pub const FEEDBACK_RANGE: &str = "Página1!A:E";
pub const SUPPORT_RANGE: &str = "Página2!A:E";
pub const PLANS_RANGE: &str = "Página3!A:G";

const FEEDBACK_HEADER_RANGE: &str = "Página1!A1:E1";
const SUPPORT_HEADER_RANGE: &str = "Página2!A1:E1";
const PLANS_HEADER_RANGE: &str = "Página3!A1:G1";

const FEEDBACK_HEADERS: [&str; 5] = [
    "DATA/HORA",
    "NOME COMPLETO",
    "TIPO DE ATENDIMENTO",
    "AVALIAÇÃO",
    "SUGESTÕES/OBSERVAÇÕES",
];
const SUPPORT_HEADERS: [&str; 5] = [
    "DATA/HORA",
    "NOME COMPLETO",
    "PROBLEMA RELATADO",
    "DESCRIÇÃO DETALHADA",
    "STATUS RESOLUÇÃO",
];
const PLANS_HEADERS: [&str; 7] = [
    "DATA/HORA",
    "NOME COMPLETO",
    "SITUAÇÃO CLIENTE",
    "PLANO ATUAL",
    "PLANO DESEJADO",
    "TELEFONE",
    "OBSERVAÇÕES",
];

/// Resolved spreadsheet settings.
#[derive(Debug, Clone)]
pub struct SheetsSettings {
    pub spreadsheet_id: String,
    pub access_token: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl SheetsSettings {
    /// Returns `None` unless both the spreadsheet id and the token are set.
    pub fn from_config(config: &SheetsConfig) -> Result<Option<Self>> {
        let (Some(spreadsheet_id), Some(access_token)) =
            (config.effective_spreadsheet_id(), config.effective_access_token())
        else {
            return Ok(None);
        };
        let base_url = config.effective_base_url().trim_end_matches('/').to_string();
        url::Url::parse(&base_url).with_context(|| format!("Invalid Sheets base URL: {base_url}"))?;

        Ok(Some(Self {
            spreadsheet_id: spreadsheet_id.to_string(),
            access_token: access_token.to_string(),
            base_url,
            timeout: config.timeout(),
        }))
    }
}

pub struct SheetsSink {
    settings: SheetsSettings,
    http: reqwest::Client,
}

impl SheetsSink {
    pub fn new(settings: SheetsSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .context("Failed to build Sheets HTTP client")?;
        Ok(Self { settings, http })
    }

    /// Writes the column titles to the first row of each tab.
    pub async fn write_headers(&self) -> Result<()> {
        self.update_row(FEEDBACK_HEADER_RANGE, &FEEDBACK_HEADERS).await?;
        self.update_row(SUPPORT_HEADER_RANGE, &SUPPORT_HEADERS).await?;
        self.update_row(PLANS_HEADER_RANGE, &PLANS_HEADERS).await?;
        tracing::info!("spreadsheet headers written");
        Ok(())
    }

    async fn append_row(&self, range: &str, row: Vec<String>) -> Result<()> {
        let url = format!("{}:append", self.values_url(range)?);
        let response = self
            .http
            .post(url)
            .query(&[("valueInputOption", "RAW")])
            .headers(self.headers()?)
            .json(&json!({ "values": [row] }))
            .send()
            .await
            .with_context(|| format!("Failed to append row to {range}"))?;
        check_status(response, range).await
    }

    async fn update_row(&self, range: &str, row: &[&str]) -> Result<()> {
        let response = self
            .http
            .put(self.values_url(range)?)
            .query(&[("valueInputOption", "RAW")])
            .headers(self.headers()?)
            .json(&json!({ "values": [row] }))
            .send()
            .await
            .with_context(|| format!("Failed to update {range}"))?;
        check_status(response, range).await
    }

    fn values_url(&self, range: &str) -> Result<url::Url> {
        let mut url = url::Url::parse(&self.settings.base_url)
            .with_context(|| format!("Invalid Sheets base URL: {}", self.settings.base_url))?;
        url.path_segments_mut()
            .map_err(|()| anyhow::anyhow!("Sheets base URL cannot be a base"))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", &self.settings.spreadsheet_id, "values", range]);
        Ok(url)
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.settings.access_token))
            .context("Sheets access token is not a valid header value")?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert("user-agent", HeaderValue::from_static(USER_AGENT));
        Ok(headers)
    }
}

async fn check_status(response: reqwest::Response, range: &str) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or(body);
    bail!("Sheets rejected write to {range}: HTTP {}: {message}", status.as_u16())
}

/// `dd/mm/YYYY HH:MM:SS`, in local time.
pub fn format_timestamp<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format("%d/%m/%Y %H:%M:%S").to_string()
}

fn now_timestamp() -> String {
    format_timestamp(&Local::now())
}

pub fn support_row(timestamp: String, outcome: &SupportOutcome) -> Vec<String> {
    vec![
        timestamp,
        outcome.name.clone(),
        outcome.problem.clone(),
        outcome.description.clone(),
        outcome.status.clone(),
    ]
}

pub fn plans_row(timestamp: String, inquiry: &PlanInquiry) -> Vec<String> {
    vec![
        timestamp,
        inquiry.name.clone(),
        inquiry.situation.clone(),
        inquiry.current_plan.clone(),
        inquiry.desired_plan.clone(),
        inquiry.phone.clone(),
        inquiry.notes.clone(),
    ]
}

pub fn feedback_row(timestamp: String, feedback: &Feedback) -> Vec<String> {
    vec![
        timestamp,
        feedback.name.clone(),
        feedback.service.clone(),
        feedback.rating.clone(),
        feedback.comment.clone(),
    ]
}

#[async_trait]
impl PersistenceSink for SheetsSink {
    async fn save_support(&self, outcome: &SupportOutcome) -> Result<()> {
        self.append_row(SUPPORT_RANGE, support_row(now_timestamp(), outcome))
            .await?;
        tracing::info!(status = %outcome.status, "support outcome recorded");
        Ok(())
    }

    async fn save_plan_inquiry(&self, inquiry: &PlanInquiry) -> Result<()> {
        self.append_row(PLANS_RANGE, plans_row(now_timestamp(), inquiry))
            .await?;
        tracing::info!(plan = %inquiry.desired_plan, "plan inquiry recorded");
        Ok(())
    }

    async fn save_feedback(&self, feedback: &Feedback) -> Result<()> {
        self.append_row(FEEDBACK_RANGE, feedback_row(now_timestamp(), feedback))
            .await?;
        tracing::info!(rating = %feedback.rating, "feedback recorded");
        Ok(())
    }
}
