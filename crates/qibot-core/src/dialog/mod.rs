//! Dialog state machine.
//!
//! [`transition`] is a pure function: it consumes the loaded record and the
//! inbound text and returns the updated record, the reply to send and the
//! side-effect intents to dispatch. Replies that need the generative backend
//! are returned as requests ([`Reply::Diagnose`], [`Reply::Answer`]) and
//! resolved by the caller.

mod commands;
pub mod replies;

pub use commands::{Confirmation, GlobalCommand, normalize, parse_confirmation, parse_global_command};

use crate::collaborators::{Feedback, Intent, PlanInquiry, SupportOutcome};
use crate::session::identity::is_phone_like;
use crate::session::{MAX_AI_ATTEMPTS, ServiceType, SessionRecord, State};

pub const STATUS_RESOLVED: &str = "Resolved by assistant";
pub const STATUS_ESCALATED: &str = "Escalated to human technician";
pub const SITUATION_CURRENT_CUSTOMER: &str = "Current Customer";
pub const SITUATION_NEW_CUSTOMER: &str = "New Customer";
pub const NO_CURRENT_PLAN: &str = "None";

const KEEP_CURRENT_PLAN_COMMAND: &str = "manter atual";

/// Per-turn facts that live outside the record.
#[derive(Debug, Clone, Copy)]
pub struct TurnContext<'a> {
    pub session_key: &'a str,
}

/// What to send back for a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    /// Run remediation attempt `attempt` for the caller's problem.
    Diagnose {
        attempt: u32,
        name: String,
        problem: String,
    },
    /// Forward a free-form question to the generative backend.
    Answer { question: String },
}

/// Result of one transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub record: SessionRecord,
    pub reply: Reply,
    pub intents: Vec<Intent>,
}

impl Step {
    fn text(record: SessionRecord, text: impl Into<String>) -> Self {
        Self {
            record,
            reply: Reply::Text(text.into()),
            intents: Vec::new(),
        }
    }

    fn with_intent(mut self, intent: Intent) -> Self {
        self.intents.push(intent);
        self
    }
}

/// Computes the next step for `input` received while in `record.state`.
///
/// The global commands are checked before state dispatch and discard the
/// in-progress record.
pub fn transition(record: SessionRecord, input: &str, ctx: &TurnContext<'_>) -> Step {
    if parse_global_command(input).is_some() {
        return show_menu(&record);
    }

    match record.state {
        State::Menu => handle_menu(record, input),
        State::SupportName => handle_support_name(record, input),
        State::SupportProblem => handle_support_problem(record, input),
        State::SupportDiagnosis => handle_support_diagnosis(record, input),
        State::SupportFeedbackRating => handle_feedback_rating(record, input),
        State::SupportFeedbackComment => handle_feedback_comment(record, input),
        State::PlansClientCheck => handle_plans_client_check(record, input),
        State::PlansCurrentPlan => handle_plans_current_plan(record, input),
        State::PlansSelection => handle_plans_selection(record, input),
        State::PlansName => handle_plans_name(record, input, ctx),
        State::PlansPhone => handle_plans_phone(record, input),
        State::FreeAssistant => handle_free_assistant(record, input),
    }
}

/// Fresh record in `Menu` plus the main menu text.
fn show_menu(record: &SessionRecord) -> Step {
    Step::text(
        SessionRecord::reset(record.last_activity_epoch_seconds),
        replies::MAIN_MENU,
    )
}

fn enter_flow(record: &SessionRecord, state: State, service: ServiceType) -> SessionRecord {
    SessionRecord {
        state,
        service_type: Some(service),
        ..SessionRecord::reset(record.last_activity_epoch_seconds)
    }
}

fn handle_menu(record: SessionRecord, input: &str) -> Step {
    match input.trim() {
        "1" => Step::text(
            enter_flow(&record, State::SupportName, ServiceType::TechnicalSupport),
            replies::SUPPORT_SELECTED,
        ),
        "2" => Step::text(
            enter_flow(&record, State::PlansClientCheck, ServiceType::Plans),
            replies::PLANS_SELECTED,
        ),
        "3" => Step::text(
            SessionRecord {
                state: State::Menu,
                ..record
            },
            replies::FINANCIAL_INFO,
        ),
        "4" => Step::text(
            enter_flow(&record, State::FreeAssistant, ServiceType::FreeAssistant),
            replies::FREE_ASSISTANT_SELECTED,
        ),
        _ => show_menu(&record),
    }
}

fn handle_support_name(mut record: SessionRecord, input: &str) -> Step {
    record.full_name = input.trim().to_string();
    record.state = State::SupportProblem;
    let reply = replies::support_problem_prompt(&record.full_name);
    Step::text(record, reply)
}

fn handle_support_problem(mut record: SessionRecord, input: &str) -> Step {
    record.service_category = input.trim().to_string();
    record.problem_description = input.to_string();
    record.ai_attempt_count = 1;
    record.state = State::SupportDiagnosis;
    let reply = Reply::Diagnose {
        attempt: 1,
        name: record.full_name.clone(),
        problem: record.service_category.clone(),
    };
    Step {
        record,
        reply,
        intents: Vec::new(),
    }
}

fn handle_support_diagnosis(mut record: SessionRecord, input: &str) -> Step {
    match parse_confirmation(input) {
        Some(Confirmation::Yes) => {
            let intent = support_outcome(&record, STATUS_RESOLVED);
            record.awaiting_followup_comment = false;
            record.state = State::SupportFeedbackRating;
            Step::text(record, replies::SUPPORT_RESOLVED).with_intent(intent)
        }
        Some(Confirmation::No) if record.ai_attempt_count >= MAX_AI_ATTEMPTS => {
            let intent = support_outcome(&record, STATUS_ESCALATED);
            record.awaiting_followup_comment = false;
            record.state = State::SupportFeedbackRating;
            Step::text(record, replies::SUPPORT_ESCALATED).with_intent(intent)
        }
        Some(Confirmation::No) => {
            record.ai_attempt_count += 1;
            let reply = Reply::Diagnose {
                attempt: record.ai_attempt_count,
                name: record.full_name.clone(),
                problem: record.service_category.clone(),
            };
            Step {
                record,
                reply,
                intents: Vec::new(),
            }
        }
        None => Step::text(record, replies::DIAGNOSIS_REPROMPT),
    }
}

fn support_outcome(record: &SessionRecord, status: &str) -> Intent {
    Intent::RecordSupport(SupportOutcome {
        name: record.full_name.clone(),
        problem: record.service_category.clone(),
        description: record.problem_description.clone(),
        status: status.to_string(),
    })
}

fn handle_feedback_rating(mut record: SessionRecord, input: &str) -> Step {
    record.feedback_rating = input.trim().to_string();
    record.awaiting_followup_comment = true;
    record.state = State::SupportFeedbackComment;
    Step::text(record, replies::FEEDBACK_COMMENT_PROMPT)
}

fn handle_feedback_comment(mut record: SessionRecord, input: &str) -> Step {
    let comment = match parse_confirmation(input) {
        Some(Confirmation::No) => String::new(),
        _ => input.trim().to_string(),
    };
    let intent = Intent::RecordFeedback(Feedback {
        name: record.full_name.clone(),
        service: record
            .service_type
            .map(ServiceType::label)
            .unwrap_or_default()
            .to_string(),
        rating: record.feedback_rating.clone(),
        comment,
    });
    record.awaiting_followup_comment = false;
    record.state = State::Menu;
    Step::text(record, replies::FEEDBACK_RECORDED).with_intent(intent)
}

fn handle_plans_client_check(mut record: SessionRecord, input: &str) -> Step {
    match parse_confirmation(input) {
        Some(Confirmation::Yes) => {
            record.situation_label = SITUATION_CURRENT_CUSTOMER.to_string();
            record.state = State::PlansCurrentPlan;
            Step::text(record, replies::current_customer_prompt())
        }
        Some(Confirmation::No) => {
            record.situation_label = SITUATION_NEW_CUSTOMER.to_string();
            record.current_plan_label = NO_CURRENT_PLAN.to_string();
            record.state = State::PlansSelection;
            Step::text(record, replies::new_customer_prompt())
        }
        None => Step::text(record, replies::CLIENT_CHECK_REPROMPT),
    }
}

fn handle_plans_current_plan(mut record: SessionRecord, input: &str) -> Step {
    record.current_plan_label = input.trim().to_string();
    record.state = State::PlansSelection;
    let reply = replies::upgrade_prompt(&record.current_plan_label);
    Step::text(record, reply)
}

fn handle_plans_selection(mut record: SessionRecord, input: &str) -> Step {
    record.desired_plan_label = input.trim().to_string();
    if normalize(&record.desired_plan_label) == KEEP_CURRENT_PLAN_COMMAND {
        record.state = State::Menu;
        return Step::text(record, replies::KEEP_CURRENT_PLAN);
    }
    record.state = State::PlansName;
    Step::text(record, replies::CONTACT_NAME_PROMPT)
}

fn handle_plans_name(mut record: SessionRecord, input: &str, ctx: &TurnContext<'_>) -> Step {
    record.full_name = input.trim().to_string();
    if record.phone.is_empty() && is_phone_like(ctx.session_key) {
        record.phone = ctx.session_key.to_string();
    }

    if record.phone.is_empty() {
        record.state = State::PlansPhone;
        return Step::text(record, replies::CONTACT_PHONE_PROMPT);
    }
    complete_plan_inquiry(record)
}

fn handle_plans_phone(mut record: SessionRecord, input: &str) -> Step {
    record.phone = input.chars().filter(|c| !c.is_whitespace()).collect();
    complete_plan_inquiry(record)
}

fn complete_plan_inquiry(mut record: SessionRecord) -> Step {
    let inquiry = PlanInquiry {
        name: record.full_name.clone(),
        situation: record.situation_label.clone(),
        current_plan: record.current_plan_label.clone(),
        desired_plan: record.desired_plan_label.clone(),
        phone: record.phone.clone(),
        notes: format!(
            "Interesse em: {} | Plano atual: {}",
            record.desired_plan_label, record.current_plan_label
        ),
    };
    let reply = replies::plan_inquiry_registered(
        &inquiry.name,
        &inquiry.situation,
        &inquiry.desired_plan,
        &inquiry.phone,
    );
    record.state = State::Menu;
    Step::text(record, reply).with_intent(Intent::RecordPlanInquiry(inquiry))
}

fn handle_free_assistant(record: SessionRecord, input: &str) -> Step {
    Step {
        record,
        reply: Reply::Answer {
            question: input.to_string(),
        },
        intents: Vec::new(),
    }
}
