//! Router assembly, collaborator wiring and the serve loop.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, Method, StatusCode, header};
use axum::middleware;
use axum::routing::{get, post};
use qibot_core::config::{Config, ServerConfig, StoreBackend};
use qibot_core::session::{InMemorySessionStore, RedisSessionStore, SessionStore};
use qibot_core::{ChatService, RateLimiter, ServiceSettings};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tracing::{info, warn};

use crate::handlers;
use crate::whatsapp::{WhatsAppClient, WhatsAppSettings};

/// Session cookie attributes for generated web identities.
#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub name: String,
    pub max_age_seconds: u64,
    pub secure: bool,
}

impl CookieSettings {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            name: config.cookie_name.clone(),
            max_age_seconds: config.cookie_max_age_seconds,
            secure: config.secure_cookies,
        }
    }

    /// `Set-Cookie` value carrying `session_id`.
    pub fn header_value(&self, session_id: &str) -> String {
        let mut cookie = format!(
            "{}={session_id}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            self.name, self.max_age_seconds
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub chat: ChatService,
    pub cookie: CookieSettings,
    pub verify_token: Option<String>,
    pub whatsapp: Option<Arc<WhatsAppClient>>,
}

impl AppState {
    pub fn new(chat: ChatService, config: &Config) -> Result<Self> {
        let whatsapp = match WhatsAppSettings::from_config(&config.whatsapp) {
            Some(settings) => Some(Arc::new(WhatsAppClient::new(settings)?)),
            None => {
                info!("WhatsApp replies disabled (no phone number id or token)");
                None
            }
        };
        Ok(Self {
            chat,
            cookie: CookieSettings::from_config(&config.server),
            verify_token: config.whatsapp.effective_verify_token().map(str::to_string),
            whatsapp,
        })
    }
}

pub fn build_app(state: AppState, config: &ServerConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static("x-session-id")]);

    let api = Router::new()
        .route("/chatbot", post(handlers::chat::chatbot))
        .route("/health", get(handlers::health::health))
        .route(
            "/webhook/whatsapp",
            get(handlers::whatsapp::verify).post(handlers::whatsapp::receive),
        )
        .layer(middleware::from_fn(handlers::security::security_headers))
        .layer(cors)
        .layer(DefaultBodyLimit::max(config.body_limit_bytes))
        .with_state(state);

    Router::new()
        .merge(api)
        .fallback_service(ServeDir::new(&config.static_dir))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout(),
        ))
}

/// Builds the conversation service and its collaborators from `config`.
pub async fn build_service(config: &Config) -> Result<ChatService> {
    let store = session_store(config).await?;
    let backend = qibot_providers::generative_backend(config)?;
    let sink = qibot_providers::persistence_sink(config).await?;

    let mut chat = ChatService::new(store, backend, sink, ServiceSettings::from_config(config));
    if config.rate_limit.enabled {
        let limiter = Arc::new(RateLimiter::new(config.rate_limit.settings()));
        spawn_rate_limit_sweeper(Arc::clone(&limiter), config.rate_limit.sweep_interval());
        chat = chat.with_rate_limiter(limiter);
    } else {
        info!("rate limiting disabled");
    }
    Ok(chat)
}

async fn session_store(config: &Config) -> Result<Arc<dyn SessionStore>> {
    match config.session.backend {
        StoreBackend::Memory => {
            info!("using in-memory session store");
            Ok(Arc::new(InMemorySessionStore::new()))
        }
        StoreBackend::Redis => {
            let store = RedisSessionStore::new(&config.session.redis_url, &config.session.key_prefix)
                .context("Failed to configure the Redis session store")?;
            match tokio::time::timeout(config.session.store_timeout(), store.ping()).await {
                Ok(Ok(())) => info!("redis connected"),
                Ok(Err(e)) => warn!("redis unavailable, sessions will not persist: {e}"),
                Err(_) => warn!("redis ping timed out, sessions will not persist"),
            }
            Ok(Arc::new(store))
        }
    }
}

/// Periodically drops rate-limit buckets that have been idle past the horizon.
pub fn spawn_rate_limit_sweeper(limiter: Arc<RateLimiter>, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await;
        loop {
            interval.tick().await;
            let evicted = limiter.evict_idle();
            if evicted > 0 {
                tracing::debug!(evicted, remaining = limiter.tracked_clients(), "rate limit sweep");
            }
        }
    });
}

/// Runs the HTTP server until Ctrl-C or SIGTERM.
pub async fn serve(config: Config) -> Result<()> {
    let chat = build_service(&config).await?;
    let state = AppState::new(chat, &config)?;
    let app = build_app(state, &config.server);

    let addr = config.server.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("qibot listening on http://{}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("qibot stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        () = terminate => info!("Received SIGTERM, shutting down..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_carries_required_attributes() {
        let cookie = CookieSettings {
            name: "qid".to_string(),
            max_age_seconds: 86_400,
            secure: false,
        };
        assert_eq!(
            cookie.header_value("abc"),
            "qid=abc; Path=/; HttpOnly; SameSite=Lax; Max-Age=86400"
        );
    }

    #[test]
    fn secure_cookie_flag() {
        let cookie = CookieSettings {
            name: "qid".to_string(),
            max_age_seconds: 60,
            secure: true,
        };
        assert!(cookie.header_value("abc").ends_with("; Secure"));
    }
}
