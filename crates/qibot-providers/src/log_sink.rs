use anyhow::Result;
use async_trait::async_trait;
use qibot_core::validation::sanitize_for_log;
use qibot_core::{Feedback, PersistenceSink, PlanInquiry, SupportOutcome};

/// Sink used when no spreadsheet is configured: records are only logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl PersistenceSink for LogSink {
    async fn save_support(&self, outcome: &SupportOutcome) -> Result<()> {
        tracing::info!(
            name = %sanitize_for_log(&outcome.name),
            problem = %sanitize_for_log(&outcome.problem),
            status = %outcome.status,
            "support outcome (not persisted)"
        );
        Ok(())
    }

    async fn save_plan_inquiry(&self, inquiry: &PlanInquiry) -> Result<()> {
        tracing::info!(
            name = %sanitize_for_log(&inquiry.name),
            situation = %inquiry.situation,
            desired_plan = %sanitize_for_log(&inquiry.desired_plan),
            "plan inquiry (not persisted)"
        );
        Ok(())
    }

    async fn save_feedback(&self, feedback: &Feedback) -> Result<()> {
        tracing::info!(
            service = %feedback.service,
            rating = %sanitize_for_log(&feedback.rating),
            "feedback (not persisted)"
        );
        Ok(())
    }
}
