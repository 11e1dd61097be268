//! Conversation service: runs one inbound message through validation, rate
//! limiting, session load, the dialog state machine, persistence and intent
//! dispatch.

mod queue;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;

use crate::collaborators::{GenerativeBackend, Intent, PersistenceSink, deliver};
use crate::config::Config;
use crate::dialog::{self, Reply, TurnContext};
use crate::ratelimit::RateLimiter;
use crate::remediation::Remediator;
use crate::session::identity::{self, IdentityHints, IdentitySource, ResolvedIdentity};
use crate::session::{DEFAULT_SESSION_TTL, SessionRecord, SessionStore, State, StoreErrorKind};
use crate::validation::{InputError, InputLimits, sanitize_for_log};
use queue::{QueuedTurn, SessionQueues};

/// One inbound message for a resolved session key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub session_key: String,
    pub message: String,
    /// Rate-limit key (client IP or sender address). Falls back to the session key.
    pub client_key: Option<String>,
}

impl InboundEvent {
    pub fn new(session_key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            session_key: session_key.into(),
            message: message.into(),
            client_key: None,
        }
    }

    pub fn with_client_key(mut self, client_key: impl Into<String>) -> Self {
        self.client_key = Some(client_key.into());
        self
    }

    fn rate_limit_key(&self) -> &str {
        self.client_key.as_deref().unwrap_or(&self.session_key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReply {
    pub session_key: String,
    pub text: String,
    /// State the session is left in.
    pub state: State,
}

/// Why a turn was refused before touching the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnError {
    Input(InputError),
    RateLimited,
    /// The session worker stopped before answering.
    Unavailable,
}

impl fmt::Display for TurnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnError::Input(err) => write!(f, "{err}"),
            TurnError::RateLimited => {
                write!(f, "Muitas requisições. Aguarde um momento e tente novamente.")
            }
            TurnError::Unavailable => write!(f, "Serviço temporariamente indisponível"),
        }
    }
}

impl std::error::Error for TurnError {}

impl From<InputError> for TurnError {
    fn from(err: InputError) -> Self {
        TurnError::Input(err)
    }
}

/// Result of a web-channel turn: the session id to hand back plus the outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebTurn {
    pub identity: ResolvedIdentity,
    pub outcome: Result<TurnReply, TurnError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceSettings {
    pub inactivity_seconds: i64,
    pub session_ttl: Duration,
    pub store_timeout: Duration,
    pub backend_timeout: Duration,
    pub worker_idle: Duration,
    pub limits: InputLimits,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            inactivity_seconds: 600,
            session_ttl: DEFAULT_SESSION_TTL,
            store_timeout: Duration::from_secs(3),
            backend_timeout: Duration::from_secs(20),
            worker_idle: Duration::from_secs(5 * 60),
            limits: InputLimits::default(),
        }
    }
}

impl ServiceSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            inactivity_seconds: config.session.inactivity_seconds,
            session_ttl: config.session.ttl(),
            store_timeout: config.session.store_timeout(),
            backend_timeout: config.gemini.timeout(),
            worker_idle: config.session.worker_idle(),
            limits: config.input.limits(),
        }
    }
}

/// Does the work for a single turn. Owned by the session workers.
pub(crate) struct Engine {
    store: Arc<dyn SessionStore>,
    sink: Arc<dyn PersistenceSink>,
    remediator: Remediator,
    settings: ServiceSettings,
}

impl Engine {
    pub(crate) async fn process(&self, event: InboundEvent) -> Result<TurnReply, TurnError> {
        let key = event.session_key.as_str();
        let now = chrono::Utc::now().timestamp();

        let mut record = self.load(key).await;
        if record.is_idle(now, self.settings.inactivity_seconds) {
            tracing::debug!(session = %sanitize_for_log(key), "session idle past threshold, restarting");
            record = SessionRecord::default();
        }
        record.touch(now);
        let previous = record.state;

        let step = dialog::transition(record, &event.message, &TurnContext { session_key: key });
        let text = self.render(step.reply).await;
        self.save(key, &step.record).await;
        self.dispatch(step.intents);

        tracing::debug!(
            session = %sanitize_for_log(key),
            message = %sanitize_for_log(&event.message),
            from = %previous,
            to = %step.record.state,
            "turn processed"
        );

        Ok(TurnReply {
            session_key: event.session_key,
            text,
            state: step.record.state,
        })
    }

    /// Missing, unreadable or unreachable records all start a fresh session.
    async fn load(&self, key: &str) -> SessionRecord {
        match tokio::time::timeout(self.settings.store_timeout, self.store.get(key)).await {
            Ok(Ok(Some(record))) => record,
            Ok(Ok(None)) => SessionRecord::default(),
            Ok(Err(err)) => {
                tracing::warn!(session = %sanitize_for_log(key), error = %err, "failed to load session");
                if err.kind == StoreErrorKind::Serialization {
                    self.discard(key).await;
                }
                SessionRecord::default()
            }
            Err(_) => {
                tracing::warn!(session = %sanitize_for_log(key), "session load timed out");
                SessionRecord::default()
            }
        }
    }

    async fn discard(&self, key: &str) {
        match tokio::time::timeout(self.settings.store_timeout, self.store.delete(key)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::warn!(session = %sanitize_for_log(key), error = %err, "failed to discard session");
            }
            Err(_) => tracing::warn!(session = %sanitize_for_log(key), "session discard timed out"),
        }
    }

    async fn save(&self, key: &str, record: &SessionRecord) {
        let write = self.store.set(key, record, self.settings.session_ttl);
        match tokio::time::timeout(self.settings.store_timeout, write).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::warn!(session = %sanitize_for_log(key), error = %err, "failed to save session");
            }
            Err(_) => tracing::warn!(session = %sanitize_for_log(key), "session save timed out"),
        }
    }

    async fn render(&self, reply: Reply) -> String {
        match reply {
            Reply::Text(text) => text,
            Reply::Diagnose {
                attempt,
                name,
                problem,
            } => self.remediator.diagnose(attempt, &name, &problem).await.text,
            Reply::Answer { question } => self.remediator.answer(&question).await,
        }
    }

    /// Fire-and-forget delivery; the record is already written.
    fn dispatch(&self, intents: Vec<Intent>) {
        if intents.is_empty() {
            return;
        }
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            for intent in intents {
                if let Err(err) = deliver(sink.as_ref(), &intent).await {
                    tracing::warn!(kind = intent.kind(), error = %err, "failed to record intent");
                }
            }
        });
    }
}

/// Entry point shared by every transport.
#[derive(Clone)]
pub struct ChatService {
    engine: Arc<Engine>,
    queues: Arc<SessionQueues>,
    rate_limiter: Option<Arc<RateLimiter>>,
}

impl ChatService {
    pub fn new(
        store: Arc<dyn SessionStore>,
        backend: Arc<dyn GenerativeBackend>,
        sink: Arc<dyn PersistenceSink>,
        settings: ServiceSettings,
    ) -> Self {
        let engine = Engine {
            store,
            sink,
            remediator: Remediator::new(backend, settings.backend_timeout),
            settings,
        };
        Self {
            engine: Arc::new(engine),
            queues: Arc::new(SessionQueues::new(settings.worker_idle)),
            rate_limiter: None,
        }
    }

    #[must_use]
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    pub fn rate_limiter(&self) -> Option<&Arc<RateLimiter>> {
        self.rate_limiter.as_ref()
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.engine.settings
    }

    /// Number of live per-session workers.
    pub async fn active_sessions(&self) -> usize {
        self.queues.active_workers().await
    }

    /// Handles one message for an already-known session key.
    pub async fn handle(&self, event: InboundEvent) -> Result<TurnReply, TurnError> {
        self.engine.settings.limits.check_message(&event.message)?;

        if let Some(limiter) = &self.rate_limiter
            && !limiter.allow(event.rate_limit_key())
        {
            tracing::warn!(client = %sanitize_for_log(event.rate_limit_key()), "rate limit exceeded");
            return Err(TurnError::RateLimited);
        }

        let (respond, response) = oneshot::channel();
        self.queues
            .enqueue(&self.engine, QueuedTurn { event, respond })
            .await;
        response.await.unwrap_or(Err(TurnError::Unavailable))
    }

    /// Web-channel entry: resolves the session identity from the request hints
    /// before handling the message.
    pub async fn handle_web(
        &self,
        hints: &IdentityHints,
        message: &str,
        client_key: Option<&str>,
    ) -> WebTurn {
        let explicit_error = hints
            .explicit
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .and_then(|id| self.engine.settings.limits.check_identifier(id).err());

        let hints = self.usable_hints(hints);
        if let Some(err) = explicit_error {
            let fallback_hints = IdentityHints {
                explicit: None,
                ..hints
            };
            return WebTurn {
                identity: identity::resolve(&fallback_hints),
                outcome: Err(TurnError::Input(err)),
            };
        }

        let identity = identity::resolve(&hints);
        if identity.source == IdentitySource::Generated {
            tracing::debug!(session = %identity.key, "generated session id");
        }
        let mut event = InboundEvent::new(identity.key.clone(), message);
        if let Some(client_key) = client_key {
            event = event.with_client_key(client_key);
        }
        WebTurn {
            outcome: self.handle(event).await,
            identity,
        }
    }

    /// Header and cookie hints that fail the identifier rules are skipped, so
    /// resolution falls through to the next source.
    fn usable_hints(&self, hints: &IdentityHints) -> IdentityHints {
        let limits = &self.engine.settings.limits;
        let usable = |hint: &Option<String>, source: &str| {
            let value = hint.as_deref().map(str::trim).filter(|v| !v.is_empty())?;
            match limits.check_identifier(value) {
                Ok(()) => Some(value.to_string()),
                Err(err) => {
                    tracing::debug!(source, error = %err, "ignoring session hint");
                    None
                }
            }
        };
        IdentityHints {
            explicit: hints.explicit.clone(),
            header: usable(&hints.header, "header"),
            cookie: usable(&hints.cookie, "cookie"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::collaborators::UnavailableBackend;
    use crate::dialog::replies;
    use crate::session::InMemorySessionStore;

    struct NullSink;

    #[async_trait::async_trait]
    impl PersistenceSink for NullSink {
        async fn save_support(
            &self,
            _outcome: &crate::collaborators::SupportOutcome,
        ) -> anyhow::Result<()> {
            Ok(())
        }

        async fn save_plan_inquiry(
            &self,
            _inquiry: &crate::collaborators::PlanInquiry,
        ) -> anyhow::Result<()> {
            Ok(())
        }

        async fn save_feedback(&self, _feedback: &crate::collaborators::Feedback) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn service(settings: ServiceSettings) -> (ChatService, Arc<InMemorySessionStore>) {
        let store = Arc::new(InMemorySessionStore::new());
        let service = ChatService::new(
            Arc::clone(&store) as Arc<dyn SessionStore>,
            Arc::new(UnavailableBackend),
            Arc::new(NullSink),
            settings,
        );
        (service, store)
    }

    #[tokio::test]
    async fn rejects_blank_message_without_touching_store() {
        let (service, store) = service(ServiceSettings::default());
        let err = service.handle(InboundEvent::new("abc", "   ")).await.unwrap_err();
        assert_eq!(err, TurnError::Input(InputError::EmptyMessage));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn invalid_explicit_identifier_is_rejected() {
        let (service, store) = service(ServiceSettings::default());
        let hints = IdentityHints {
            explicit: Some("<bad id>".to_string()),
            header: None,
            cookie: Some("cookie-id".to_string()),
        };
        let turn = service.handle_web(&hints, "oi", None).await;
        assert!(matches!(turn.outcome, Err(TurnError::Input(InputError::InvalidIdentifier(_)))));
        assert_eq!(turn.identity.key, "cookie-id");
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn web_turn_generates_identity_when_no_hints() {
        let (service, _store) = service(ServiceSettings::default());
        let turn = service.handle_web(&IdentityHints::default(), "oi", None).await;
        assert!(turn.identity.is_generated());
        let reply = turn.outcome.unwrap();
        assert_eq!(reply.text, replies::MAIN_MENU);
        assert_eq!(reply.session_key, turn.identity.key);
    }

    #[tokio::test]
    async fn malformed_transport_hints_fall_through() {
        let (service, _store) = service(ServiceSettings::default());

        let hints = IdentityHints {
            explicit: None,
            header: Some("<script>".to_string()),
            cookie: Some("cookie-id".to_string()),
        };
        let turn = service.handle_web(&hints, "oi", None).await;
        assert_eq!(turn.identity.key, "cookie-id");
        assert!(turn.outcome.is_ok());

        let hints = IdentityHints {
            explicit: None,
            header: Some("a".repeat(500)),
            cookie: Some("semi;colon".to_string()),
        };
        let turn = service.handle_web(&hints, "oi", None).await;
        assert!(turn.identity.is_generated());
        assert!(turn.outcome.is_ok());
    }

    #[tokio::test]
    async fn idle_workers_retire() {
        let (service, _store) = service(ServiceSettings {
            worker_idle: Duration::from_millis(50),
            ..ServiceSettings::default()
        });
        service.handle(InboundEvent::new("idle", "oi")).await.unwrap();
        assert_eq!(service.active_sessions().await, 1);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(service.active_sessions().await, 0);

        let reply = service.handle(InboundEvent::new("idle", "1")).await.unwrap();
        assert_eq!(reply.state, State::SupportName);
    }
}
