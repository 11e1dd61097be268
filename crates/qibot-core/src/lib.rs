//! Session and dialog engine for the QI Telecom customer-service assistant.
//!
//! The transports (web chat, WhatsApp webhook) hand inbound messages to a
//! [`ChatService`], which resolves the session, runs the dialog state machine
//! and dispatches side effects to the configured collaborators.

pub mod collaborators;
pub mod config;
pub mod dialog;
pub mod logging;
pub mod ratelimit;
pub mod remediation;
pub mod service;
pub mod session;
pub mod validation;

pub use collaborators::{
    BackendError, BackendErrorKind, BackendResult, Feedback, GenerativeBackend, Intent,
    PersistenceSink, PlanInquiry, SupportOutcome, UnavailableBackend,
};
pub use config::Config;
pub use ratelimit::{RateLimitSettings, RateLimiter};
pub use service::{ChatService, InboundEvent, ServiceSettings, TurnError, TurnReply, WebTurn};
pub use session::{SessionRecord, State};
pub use validation::{InputError, InputLimits};
