use serde::{Deserialize, Serialize};

/// Upper bound for assistant attempts in the technical-support loop.
pub const MAX_AI_ATTEMPTS: u32 = 5;

/// Named step of the dialog a session is currently at.
///
/// `Menu` is both the initial state and the recovery state; every flow loops
/// back to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    #[default]
    Menu,
    SupportName,
    SupportProblem,
    SupportDiagnosis,
    SupportFeedbackRating,
    SupportFeedbackComment,
    PlansClientCheck,
    PlansCurrentPlan,
    PlansSelection,
    PlansName,
    PlansPhone,
    FreeAssistant,
}

impl State {
    /// Returns all states, in flow order.
    pub fn all() -> &'static [State] {
        &[
            State::Menu,
            State::SupportName,
            State::SupportProblem,
            State::SupportDiagnosis,
            State::SupportFeedbackRating,
            State::SupportFeedbackComment,
            State::PlansClientCheck,
            State::PlansCurrentPlan,
            State::PlansSelection,
            State::PlansName,
            State::PlansPhone,
            State::FreeAssistant,
        ]
    }

    /// Stable tag used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            State::Menu => "menu",
            State::SupportName => "support_name",
            State::SupportProblem => "support_problem",
            State::SupportDiagnosis => "support_diagnosis",
            State::SupportFeedbackRating => "support_feedback_rating",
            State::SupportFeedbackComment => "support_feedback_comment",
            State::PlansClientCheck => "plans_client_check",
            State::PlansCurrentPlan => "plans_current_plan",
            State::PlansSelection => "plans_selection",
            State::PlansName => "plans_name",
            State::PlansPhone => "plans_phone",
            State::FreeAssistant => "free_assistant",
        }
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Service label recorded when a flow is entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceType {
    #[serde(rename = "Technical Support")]
    TechnicalSupport,
    #[serde(rename = "Plans")]
    Plans,
    #[serde(rename = "Free Assistant")]
    FreeAssistant,
}

impl ServiceType {
    pub fn label(self) -> &'static str {
        match self {
            ServiceType::TechnicalSupport => "Technical Support",
            ServiceType::Plans => "Plans",
            ServiceType::FreeAssistant => "Free Assistant",
        }
    }
}

/// Everything persisted for one caller identity.
///
/// The state tag and the form data travel together as one JSON document, so
/// they always share the same TTL in the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionRecord {
    pub state: State,
    pub full_name: String,
    pub phone: String,
    pub current_plan_label: String,
    pub desired_plan_label: String,
    /// Short problem summary given in the support flow.
    pub service_category: String,
    /// Problem text exactly as the caller typed it.
    pub problem_description: String,
    pub situation_label: String,
    pub ai_attempt_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_type: Option<ServiceType>,
    pub feedback_rating: String,
    pub awaiting_followup_comment: bool,
    pub last_activity_epoch_seconds: i64,
}

impl SessionRecord {
    /// Fresh record for a flow, keeping only the activity timestamp.
    pub fn reset(last_activity_epoch_seconds: i64) -> Self {
        Self {
            last_activity_epoch_seconds,
            ..Self::default()
        }
    }

    /// Returns true when the gap since the last message exceeds `threshold_seconds`.
    ///
    /// A record that never saw activity (timestamp 0) is never idle.
    pub fn is_idle(&self, now_epoch_seconds: i64, threshold_seconds: i64) -> bool {
        self.last_activity_epoch_seconds > 0
            && now_epoch_seconds - self.last_activity_epoch_seconds > threshold_seconds
    }

    /// Records activity without ever moving the timestamp backwards.
    pub fn touch(&mut self, now_epoch_seconds: i64) {
        self.last_activity_epoch_seconds = self.last_activity_epoch_seconds.max(now_epoch_seconds);
    }

    /// True when every form field is at its default value.
    pub fn is_cleared(&self) -> bool {
        let mut cleared = self.clone();
        cleared.last_activity_epoch_seconds = 0;
        cleared == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_state_deserializes_to_menu() {
        let record: SessionRecord = serde_json::from_str(r#"{"full_name":"Ana"}"#).unwrap();
        assert_eq!(record.state, State::Menu);
        assert_eq!(record.full_name, "Ana");
        assert_eq!(record.ai_attempt_count, 0);
    }

    #[test]
    fn unknown_state_tag_is_rejected() {
        let parsed = serde_json::from_str::<SessionRecord>(r#"{"state":"support_ia"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn service_type_serializes_as_label() {
        let record = SessionRecord {
            service_type: Some(ServiceType::TechnicalSupport),
            ..SessionRecord::default()
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["service_type"], "Technical Support");
    }

    #[test]
    fn idle_check_uses_strict_threshold() {
        let record = SessionRecord::reset(1_000);
        assert!(!record.is_idle(1_600, 600));
        assert!(record.is_idle(1_601, 600));
        assert!(!SessionRecord::default().is_idle(1_000_000, 600));
    }

    #[test]
    fn touch_never_moves_backwards() {
        let mut record = SessionRecord::reset(2_000);
        record.touch(1_500);
        assert_eq!(record.last_activity_epoch_seconds, 2_000);
        record.touch(2_500);
        assert_eq!(record.last_activity_epoch_seconds, 2_500);
    }

    #[test]
    fn reset_record_is_cleared() {
        assert!(SessionRecord::reset(42).is_cleared());
        let mut record = SessionRecord::reset(42);
        record.ai_attempt_count = 1;
        assert!(!record.is_cleared());
    }

    #[test]
    fn state_tags_are_unique() {
        let mut tags: Vec<_> = State::all().iter().map(|s| s.as_str()).collect();
        tags.sort_unstable();
        tags.dedup();
        assert_eq!(tags.len(), 12);
    }
}
