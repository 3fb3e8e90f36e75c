use crate::error::CoachError;
use crate::policy::Action;
use crate::session::SessionRecord;
use crate::tools::CoachingTools;
use std::sync::Arc;
use tracing::{debug, error};

/// Returned when the reminder limit is reached and no feedback has arrived.
pub const WAITING_MESSAGE: &str =
    "I'm still waiting for your feedback on the exercise. Please let me know when you're done!";

/// Builds the acknowledgement for a user's completion feedback.
pub fn acknowledgement(feedback: &str) -> String {
    format!(
        "Thanks for completing your exercise! Your feedback: '{}'",
        feedback
    )
}

/// Carries out a decided `Action` through the coaching tools.
///
/// Tool failures are not retried; they surface as `CoachError::ToolInvocation`.
pub struct ActionDispatcher {
    tools: Arc<dyn CoachingTools>,
}

impl ActionDispatcher {
    pub fn new(tools: Arc<dyn CoachingTools>) -> Self {
        Self { tools }
    }

    pub fn tools(&self) -> &Arc<dyn CoachingTools> {
        &self.tools
    }

    /// Executes `action` for the user of `record`, which is the record the
    /// action was decided from.
    pub async fn dispatch(
        &self,
        action: Action,
        record: &SessionRecord,
    ) -> Result<String, CoachError> {
        debug!(user_id = %record.user_id, action = %action, "Dispatching action");
        let user_id = record.user_id.as_str();
        let outcome = match action {
            Action::SendExercise => self.tools.send_exercise(user_id).await,
            Action::SendReminder => self.tools.send_reminder(user_id).await,
            Action::WaitForFeedback => return Ok(WAITING_MESSAGE.to_string()),
            Action::AcknowledgeFeedback => {
                return Ok(acknowledgement(record.feedback.as_deref().unwrap_or_default()));
            }
        };

        outcome.map_err(|source| {
            let tool = action.tool_name().unwrap_or("unknown");
            error!(user_id = %user_id, tool, error = %source, "Tool invocation failed");
            CoachError::ToolInvocation { tool, source }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolError;
    use crate::tools::MockCoachingTools;

    fn record(exercise: Option<&str>, feedback: Option<&str>, reminders: u32) -> SessionRecord {
        SessionRecord {
            user_id: "u1".to_string(),
            last_exercise: exercise.map(str::to_string),
            feedback: feedback.map(str::to_string),
            reminders_sent: reminders,
            scheduled_time: None,
        }
    }

    #[tokio::test]
    async fn test_send_exercise_calls_tool_once() {
        let mut tools = MockCoachingTools::new();
        tools
            .expect_send_exercise()
            .withf(|user_id| user_id == "u1")
            .times(1)
            .returning(|_| Ok("exercise sent".to_string()));
        tools.expect_send_reminder().never();

        let dispatcher = ActionDispatcher::new(Arc::new(tools));
        let result = dispatcher
            .dispatch(Action::SendExercise, &record(None, None, 0))
            .await
            .unwrap();
        assert_eq!(result, "exercise sent");
    }

    #[tokio::test]
    async fn test_send_reminder_calls_tool_once() {
        let mut tools = MockCoachingTools::new();
        tools
            .expect_send_reminder()
            .times(1)
            .returning(|_| Ok("reminder sent".to_string()));
        tools.expect_send_exercise().never();

        let dispatcher = ActionDispatcher::new(Arc::new(tools));
        let result = dispatcher
            .dispatch(Action::SendReminder, &record(Some("pushups"), None, 1))
            .await
            .unwrap();
        assert_eq!(result, "reminder sent");
    }

    #[tokio::test]
    async fn test_wait_and_acknowledge_call_no_tools() {
        let mut tools = MockCoachingTools::new();
        tools.expect_send_exercise().never();
        tools.expect_send_reminder().never();
        tools.expect_record_feedback().never();
        let dispatcher = ActionDispatcher::new(Arc::new(tools));

        let waiting = dispatcher
            .dispatch(Action::WaitForFeedback, &record(Some("pushups"), None, 3))
            .await
            .unwrap();
        assert_eq!(waiting, WAITING_MESSAGE);

        let thanks = dispatcher
            .dispatch(
                Action::AcknowledgeFeedback,
                &record(Some("pushups"), Some("done!"), 3),
            )
            .await
            .unwrap();
        assert!(thanks.contains("done!"));
        assert_eq!(thanks, "Thanks for completing your exercise! Your feedback: 'done!'");
    }

    #[tokio::test]
    async fn test_tool_failure_propagates() {
        let mut tools = MockCoachingTools::new();
        tools
            .expect_send_reminder()
            .times(1)
            .returning(|user_id| Err(ToolError::NoExercise(user_id.to_string())));

        let dispatcher = ActionDispatcher::new(Arc::new(tools));
        let err = dispatcher
            .dispatch(Action::SendReminder, &record(None, None, 0))
            .await
            .unwrap_err();

        match err {
            CoachError::ToolInvocation { tool, source } => {
                assert_eq!(tool, "send_reminder");
                assert!(matches!(source, ToolError::NoExercise(_)));
            }
            other => panic!("Expected ToolInvocation, got {:?}", other),
        }
    }
}
