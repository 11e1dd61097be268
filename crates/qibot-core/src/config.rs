//! Configuration management for qibot.
//!
//! Loads configuration from `qibot.toml` (or `--config` / `$QIBOT_CONFIG`)
//! with defaults for every key, then applies environment overrides.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::ratelimit::RateLimitSettings;
use crate::validation::{DEFAULT_MAX_IDENTIFIER_LENGTH, DEFAULT_MAX_MESSAGE_LENGTH, InputLimits};

pub const CONFIG_ENV_VAR: &str = "QIBOT_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "qibot.toml";

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_SHEETS_BASE_URL: &str = "https://sheets.googleapis.com";
pub const DEFAULT_WHATSAPP_API_BASE_URL: &str = "https://graph.facebook.com/v19.0";

/// Returns the default config template with comments.
///
/// Embedded from default_config.toml at compile time.
pub fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

/// Picks the config file: explicit path, then `$QIBOT_CONFIG`, then `./qibot.toml`.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    match std::env::var(CONFIG_ENV_VAR) {
        Ok(path) if !path.trim().is_empty() => PathBuf::from(path.trim()),
        _ => PathBuf::from(DEFAULT_CONFIG_FILE),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory served for every path outside the API routes.
    pub static_dir: PathBuf,
    pub body_limit_bytes: usize,
    pub request_timeout_seconds: u64,
    /// Adds `Secure` to the session cookie.
    pub secure_cookies: bool,
    pub cookie_name: String,
    pub cookie_max_age_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8081,
            static_dir: PathBuf::from("."),
            body_limit_bytes: 4096,
            request_timeout_seconds: 30,
            secure_cookies: false,
            cookie_name: crate::session::identity::SESSION_COOKIE.to_string(),
            cookie_max_age_seconds: 24 * 60 * 60,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds.max(1))
    }
}

/// Where session records live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Redis,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Idle gap after which a session restarts from the menu.
    pub inactivity_seconds: i64,
    pub ttl_seconds: u64,
    pub store_timeout_ms: u64,
    pub key_prefix: String,
    pub backend: StoreBackend,
    pub redis_url: String,
    /// Per-session workers with no traffic for this long are retired.
    pub worker_idle_seconds: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            inactivity_seconds: 600,
            ttl_seconds: 3600,
            store_timeout_ms: 3000,
            key_prefix: "qibot".to_string(),
            backend: StoreBackend::Redis,
            redis_url: "redis://localhost:6379".to_string(),
            worker_idle_seconds: 300,
        }
    }
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds.max(1))
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms.max(1))
    }

    pub fn worker_idle(&self) -> Duration {
        Duration::from_secs(self.worker_idle_seconds.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub requests_per_minute: u32,
    pub burst: u32,
    pub idle_horizon_seconds: u64,
    pub sweep_interval_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_minute: 60,
            burst: 10,
            idle_horizon_seconds: 3600,
            sweep_interval_seconds: 300,
        }
    }
}

impl RateLimitConfig {
    pub fn settings(&self) -> RateLimitSettings {
        RateLimitSettings {
            requests_per_minute: self.requests_per_minute,
            burst: self.burst,
            idle_horizon: Duration::from_secs(self.idle_horizon_seconds),
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub max_message_length: usize,
    pub max_identifier_length: usize,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            max_message_length: DEFAULT_MAX_MESSAGE_LENGTH,
            max_identifier_length: DEFAULT_MAX_IDENTIFIER_LENGTH,
        }
    }
}

impl InputConfig {
    pub fn limits(&self) -> InputLimits {
        InputLimits {
            max_message_length: self.max_message_length,
            max_identifier_length: self.max_identifier_length,
        }
    }
}

/// Gemini generative backend. The backend is disabled without an API key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_seconds: u64,
    pub max_output_tokens: Option<u32>,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            model: DEFAULT_GEMINI_MODEL.to_string(),
            timeout_seconds: 20,
            max_output_tokens: None,
        }
    }
}

impl GeminiConfig {
    pub fn effective_api_key(&self) -> Option<&str> {
        non_empty(self.api_key.as_deref())
    }

    pub fn effective_base_url(&self) -> &str {
        non_empty(self.base_url.as_deref()).unwrap_or(DEFAULT_GEMINI_BASE_URL)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.max(1))
    }
}

/// Google Sheets persistence sink. Records are only logged when unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetsConfig {
    pub spreadsheet_id: Option<String>,
    pub access_token: Option<String>,
    pub base_url: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: None,
            access_token: None,
            base_url: None,
            timeout_seconds: 10,
        }
    }
}

impl SheetsConfig {
    pub fn effective_spreadsheet_id(&self) -> Option<&str> {
        non_empty(self.spreadsheet_id.as_deref())
    }

    pub fn effective_access_token(&self) -> Option<&str> {
        non_empty(self.access_token.as_deref())
    }

    pub fn effective_base_url(&self) -> &str {
        non_empty(self.base_url.as_deref()).unwrap_or(DEFAULT_SHEETS_BASE_URL)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.max(1))
    }
}

/// WhatsApp Cloud API webhook and outbound messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WhatsAppConfig {
    pub verify_token: Option<String>,
    pub phone_number_id: Option<String>,
    pub access_token: Option<String>,
    pub api_base_url: String,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            verify_token: None,
            phone_number_id: None,
            access_token: None,
            api_base_url: DEFAULT_WHATSAPP_API_BASE_URL.to_string(),
        }
    }
}

impl WhatsAppConfig {
    pub fn effective_verify_token(&self) -> Option<&str> {
        non_empty(self.verify_token.as_deref())
    }

    pub fn effective_phone_number_id(&self) -> Option<&str> {
        non_empty(self.phone_number_id.as_deref())
    }

    pub fn effective_access_token(&self) -> Option<&str> {
        non_empty(self.access_token.as_deref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub rate_limit: RateLimitConfig,
    pub input: InputConfig,
    pub gemini: GeminiConfig,
    pub sheets: SheetsConfig,
    pub whatsapp: WhatsAppConfig,
}

impl Config {
    /// Loads the file (defaults when missing) and applies process environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = Self::load_from(path)?;
        config.apply_env_overrides_from(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Applies the deployment environment variables.
    ///
    /// Secrets keep a configured value and fall back to the environment; base
    /// URLs and numeric limits take the environment value when present.
    pub fn apply_env_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(port) = var("PORT") {
            self.server.port = parse_var("PORT", &port)?;
        }
        if let Some(limit) = var("BODY_LIMIT_BYTES") {
            self.server.body_limit_bytes = parse_var("BODY_LIMIT_BYTES", &limit)?;
        }
        if let Some(redis) = var("REDIS_URL").or_else(|| var("REDIS_ADDR")) {
            self.session.redis_url = redis_url_from(&redis);
        }
        if let Some(rpm) = var("RATE_LIMIT_PER_MINUTE") {
            self.rate_limit.requests_per_minute = parse_var("RATE_LIMIT_PER_MINUTE", &rpm)?;
        }
        if let Some(burst) = var("RATE_LIMIT_BURST") {
            self.rate_limit.burst = parse_var("RATE_LIMIT_BURST", &burst)?;
        }
        if let Some(max) = var("MAX_MESSAGE_LENGTH") {
            self.input.max_message_length = parse_var("MAX_MESSAGE_LENGTH", &max)?;
        }

        fill_secret(&mut self.gemini.api_key, var("GOOGLE_API_KEY"));
        fill_secret(&mut self.sheets.spreadsheet_id, var("GOOGLE_SHEETS_ID"));
        fill_secret(&mut self.sheets.access_token, var("GOOGLE_SHEETS_ACCESS_TOKEN"));
        fill_secret(&mut self.whatsapp.verify_token, var("WHATSAPP_VERIFY_TOKEN"));
        fill_secret(&mut self.whatsapp.phone_number_id, var("WHATSAPP_PHONE_ID"));
        fill_secret(&mut self.whatsapp.access_token, var("WHATSAPP_TOKEN"));

        if let Some(url) = var("GEMINI_BASE_URL") {
            self.gemini.base_url = Some(url);
        }
        self.validate_urls()
    }

    fn validate_urls(&self) -> Result<()> {
        validate_url(self.gemini.effective_base_url(), "Gemini")?;
        validate_url(self.sheets.effective_base_url(), "Sheets")?;
        validate_url(&self.whatsapp.api_base_url, "WhatsApp")?;
        validate_url(&self.session.redis_url, "Redis")?;
        Ok(())
    }

    /// Creates a default config file at the given path.
    /// Returns an error if the file already exists.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        fs::write(path, default_config_template())
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

fn fill_secret(slot: &mut Option<String>, env_value: Option<String>) {
    if non_empty(slot.as_deref()).is_none() {
        *slot = env_value;
    }
}

fn parse_var<T>(name: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .with_context(|| format!("Invalid value for {name}: {value}"))
}

/// `REDIS_ADDR` is a bare `host:port`; accept it alongside full URLs.
fn redis_url_from(value: &str) -> String {
    if value.contains("://") {
        value.to_string()
    } else {
        format!("redis://{value}")
    }
}

fn validate_url(url: &str, name: &str) -> Result<()> {
    url::Url::parse(url).with_context(|| format!("Invalid {name} URL: {url}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.session.inactivity_seconds, 600);
        assert_eq!(config.session.ttl(), Duration::from_secs(3600));
        assert_eq!(config.rate_limit.burst, 10);
        assert_eq!(config.input.max_message_length, 1000);
        assert_eq!(config.gemini.model, DEFAULT_GEMINI_MODEL);
        assert!(config.gemini.effective_api_key().is_none());
    }

    #[test]
    fn test_load_partial_config_merges_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("qibot.toml");
        fs::write(
            &path,
            "[session]\nbackend = \"memory\"\n\n[rate_limit]\nburst = 3\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.session.backend, StoreBackend::Memory);
        assert_eq!(config.session.key_prefix, "qibot");
        assert_eq!(config.rate_limit.burst, 3);
        assert_eq!(config.rate_limit.requests_per_minute, 60);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("qibot.toml");
        fs::write(&path, "[server\nport = ").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_default_template_parses_to_defaults() {
        let config: Config = toml::from_str(default_config_template()).unwrap();
        let defaults = Config::default();
        assert_eq!(config.server.port, defaults.server.port);
        assert_eq!(config.session.redis_url, defaults.session.redis_url);
        assert_eq!(config.whatsapp.api_base_url, defaults.whatsapp.api_base_url);
    }

    #[test]
    fn test_init_writes_template_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("qibot.toml");
        Config::init(&path).unwrap();
        assert!(fs::read_to_string(&path).unwrap().contains("[session]"));
        assert!(Config::init(&path).is_err());
    }

    #[test]
    fn test_env_overrides_numbers_and_urls() {
        let mut config = Config::default();
        config
            .apply_env_overrides_from(env(&[
                ("PORT", "9000"),
                ("REDIS_ADDR", "cache:6380"),
                ("RATE_LIMIT_PER_MINUTE", "120"),
                ("RATE_LIMIT_BURST", "20"),
                ("GEMINI_BASE_URL", "http://127.0.0.1:1234"),
            ]))
            .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.session.redis_url, "redis://cache:6380");
        assert_eq!(config.rate_limit.requests_per_minute, 120);
        assert_eq!(config.rate_limit.burst, 20);
        assert_eq!(config.gemini.effective_base_url(), "http://127.0.0.1:1234");
    }

    #[test]
    fn test_configured_secret_wins_over_env() {
        let mut config = Config::default();
        config.gemini.api_key = Some("from-file".to_string());
        config
            .apply_env_overrides_from(env(&[
                ("GOOGLE_API_KEY", "from-env"),
                ("WHATSAPP_TOKEN", "wa-token"),
            ]))
            .unwrap();
        assert_eq!(config.gemini.effective_api_key(), Some("from-file"));
        assert_eq!(config.whatsapp.effective_access_token(), Some("wa-token"));
    }

    #[test]
    fn test_invalid_env_values_are_rejected() {
        let mut config = Config::default();
        assert!(config.apply_env_overrides_from(env(&[("PORT", "abc")])).is_err());

        let mut config = Config::default();
        assert!(
            config
                .apply_env_overrides_from(env(&[("GEMINI_BASE_URL", "not a url")]))
                .is_err()
        );
    }

    #[test]
    fn test_explicit_config_path_wins() {
        let path = config_path(Some(Path::new("/etc/qibot.toml")));
        assert_eq!(path, PathBuf::from("/etc/qibot.toml"));
    }
}
