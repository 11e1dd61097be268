//! Concrete collaborators for the qibot conversation engine.

use std::sync::Arc;

use anyhow::Result;
use qibot_core::config::Config;
use qibot_core::{GenerativeBackend, PersistenceSink, UnavailableBackend};

pub mod gemini;
pub mod log_sink;
pub mod sheets;

pub use gemini::{GeminiBackend, GeminiSettings};
pub use log_sink::LogSink;
pub use sheets::{SheetsSettings, SheetsSink};

pub const USER_AGENT: &str = concat!("qibot/", env!("CARGO_PKG_VERSION"));

/// Gemini when an API key is configured, otherwise a backend that always
/// fails so every reply takes the local fallback.
pub fn generative_backend(config: &Config) -> Result<Arc<dyn GenerativeBackend>> {
    match GeminiSettings::from_config(&config.gemini)? {
        Some(settings) => {
            tracing::info!(model = %settings.model, "using Gemini generative backend");
            Ok(Arc::new(GeminiBackend::new(settings)?))
        }
        None => {
            tracing::warn!("no Gemini API key configured, replies will use local fallbacks");
            Ok(Arc::new(UnavailableBackend))
        }
    }
}

/// Google Sheets when configured, otherwise the log-only sink.
pub async fn persistence_sink(config: &Config) -> Result<Arc<dyn PersistenceSink>> {
    match SheetsSettings::from_config(&config.sheets)? {
        Some(settings) => {
            let sink = SheetsSink::new(settings)?;
            if let Err(err) = sink.write_headers().await {
                tracing::warn!(error = %err, "failed to write spreadsheet headers");
            }
            Ok(Arc::new(sink))
        }
        None => {
            tracing::warn!("no spreadsheet configured, records will only be logged");
            Ok(Arc::new(LogSink))
        }
    }
}
