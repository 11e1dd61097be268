//! Interfaces to the external collaborators the engine talks to.

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;

/// Category of a generative-backend failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// Backend not configured or unreachable.
    Unavailable,
    Timeout,
    /// Non-2xx HTTP response.
    HttpStatus,
    /// Response parsed but carried no usable text.
    EmptyResponse,
}

/// Structured error from the generative backend.
#[derive(Debug, Clone)]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub message: String,
    /// Optional additional details (e.g. raw error body).
    pub details: Option<String>,
}

impl BackendError {
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Unavailable, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Timeout, message)
    }

    pub fn empty_response() -> Self {
        Self::new(BackendErrorKind::EmptyResponse, "Backend returned no text")
    }

    /// Creates an HTTP status error, pulling `error.message` out of a JSON body when present.
    pub fn http_status(status: u16, body: &str) -> Self {
        if let Ok(json) = serde_json::from_str::<serde_json::Value>(body)
            && let Some(msg) = json
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
        {
            return Self {
                kind: BackendErrorKind::HttpStatus,
                message: format!("HTTP {status}: {msg}"),
                details: Some(body.to_string()),
            };
        }
        Self {
            kind: BackendErrorKind::HttpStatus,
            message: format!("HTTP {status}"),
            details: (!body.is_empty()).then(|| body.to_string()),
        }
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for BackendError {}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Text generation service used for remediation steps and free-form questions.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    async fn generate(&self, prompt: &str) -> BackendResult<String>;
}

/// Backend used when none is configured. Every call fails, so callers always
/// take their local fallback.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableBackend;

#[async_trait]
impl GenerativeBackend for UnavailableBackend {
    async fn generate(&self, _prompt: &str) -> BackendResult<String> {
        Err(BackendError::unavailable("Generative backend not configured"))
    }
}

/// Outcome of a technical-support conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportOutcome {
    pub name: String,
    pub problem: String,
    pub description: String,
    pub status: String,
}

/// A plan inquiry to be followed up by the sales team.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanInquiry {
    pub name: String,
    pub situation: String,
    pub current_plan: String,
    pub desired_plan: String,
    pub phone: String,
    pub notes: String,
}

/// Rating and optional comment about a finished service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback {
    pub name: String,
    pub service: String,
    pub rating: String,
    pub comment: String,
}

/// Side effect requested by a dialog transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    RecordSupport(SupportOutcome),
    RecordPlanInquiry(PlanInquiry),
    RecordFeedback(Feedback),
}

impl Intent {
    pub fn kind(&self) -> &'static str {
        match self {
            Intent::RecordSupport(_) => "support",
            Intent::RecordPlanInquiry(_) => "plans",
            Intent::RecordFeedback(_) => "feedback",
        }
    }
}

/// Best-effort record sink. Failures are logged by the caller and otherwise ignored.
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    async fn save_support(&self, outcome: &SupportOutcome) -> Result<()>;

    async fn save_plan_inquiry(&self, inquiry: &PlanInquiry) -> Result<()>;

    async fn save_feedback(&self, feedback: &Feedback) -> Result<()>;
}

/// Routes an intent to the matching sink method.
pub async fn deliver(sink: &dyn PersistenceSink, intent: &Intent) -> Result<()> {
    match intent {
        Intent::RecordSupport(outcome) => sink.save_support(outcome).await,
        Intent::RecordPlanInquiry(inquiry) => sink.save_plan_inquiry(inquiry).await,
        Intent::RecordFeedback(feedback) => sink.save_feedback(feedback).await,
    }
}
