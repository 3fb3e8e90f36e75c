//! Session Runner
//!
//! Composes one coaching turn: load the user's record, decide the action,
//! optionally let the reasoning delegate carry it out, and otherwise dispatch
//! it deterministically.

use crate::delegate::{ReasoningDelegate, render_context};
use crate::dispatcher::ActionDispatcher;
use crate::error::CoachError;
use crate::gate::ToolGate;
use crate::policy::decide;
use crate::session::{SessionStore, validate_user_id};
use std::sync::Arc;
use tracing::{info, instrument, warn};

pub struct SessionRunner {
    store: Arc<dyn SessionStore>,
    dispatcher: Arc<ActionDispatcher>,
    delegate: Option<Arc<dyn ReasoningDelegate>>,
}

impl SessionRunner {
    pub fn new(store: Arc<dyn SessionStore>, dispatcher: Arc<ActionDispatcher>) -> Self {
        Self {
            store,
            dispatcher,
            delegate: None,
        }
    }

    /// Attempts `delegate` before the deterministic fallback on every run.
    pub fn with_delegate(mut self, delegate: Arc<dyn ReasoningDelegate>) -> Self {
        self.delegate = Some(delegate);
        self
    }

    pub fn has_delegate(&self) -> bool {
        self.delegate.is_some()
    }

    /// Runs one coaching turn for `user_id` and returns the message for the user.
    ///
    /// Delegate failures never reach the caller; tool failures during the
    /// deterministic dispatch do.
    #[instrument(name = "coach_run", skip(self))]
    pub async fn run(&self, user_id: &str) -> Result<String, CoachError> {
        validate_user_id(user_id)?;

        let record = self.store.get(user_id).await.map_err(CoachError::Store)?;
        let action = decide(&record);
        info!(action = %action, reminders_sent = record.reminders_sent, "Decided action");

        if let Some(delegate) = &self.delegate {
            let gate = ToolGate::new(record.clone(), action, self.dispatcher.clone());
            let outcome = delegate.infer(&render_context(&record), gate.clone()).await;
            let performed = gate.performed().await;

            match (outcome, performed) {
                (Ok(response), Some(done)) if response.trim().is_empty() => {
                    warn!(action = %done.action, "Delegate acted but gave a blank answer, returning the tool result");
                    return Ok(done.result);
                }
                (Ok(response), Some(_)) => return Ok(response),
                (Ok(response), None) if !action.requires_tool() && !response.trim().is_empty() => {
                    return Ok(response);
                }
                (Ok(_), None) => {
                    warn!(action = %action, "Delegate answer did not carry out the required action, discarding it");
                }
                (Err(e), Some(done)) => {
                    warn!(error = %e, "Delegate failed after acting, returning the tool result");
                    return Ok(done.result);
                }
                (Err(e), None) => {
                    warn!(error = %e, "Delegate unavailable, falling back to decision policy");
                }
            }
        }

        self.dispatcher.dispatch(action, &record).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::WAITING_MESSAGE;
    use crate::error::ToolError;
    use crate::policy::Action;
    use crate::session::{InMemorySessionStore, SessionRecord};
    use crate::tools::{CoachingTools, ExerciseCatalog, MockCoachingTools, StoreTools};
    use async_trait::async_trait;

    /// A delegate that always fails.
    struct FailingDelegate;

    #[async_trait]
    impl ReasoningDelegate for FailingDelegate {
        async fn infer(&self, _context: &str, _gate: ToolGate) -> Result<String, CoachError> {
            Err(CoachError::ReasoningUnavailable("connection refused".to_string()))
        }
    }

    /// A delegate that optionally invokes an action, then answers or fails.
    struct ScriptedDelegate {
        invoke: Option<Action>,
        answer: Option<&'static str>,
    }

    #[async_trait]
    impl ReasoningDelegate for ScriptedDelegate {
        async fn infer(&self, context: &str, gate: ToolGate) -> Result<String, CoachError> {
            assert!(context.contains("User ID: u1"));
            if let Some(action) = self.invoke {
                let _ = gate.invoke(action).await;
            }
            self.answer
                .map(str::to_string)
                .ok_or_else(|| CoachError::ReasoningUnavailable("timed out".to_string()))
        }
    }

    async fn store_with(record: SessionRecord) -> Arc<InMemorySessionStore> {
        let store = Arc::new(InMemorySessionStore::new());
        store.put(record).await.unwrap();
        store
    }

    fn record(exercise: Option<&str>, feedback: Option<&str>, reminders: u32) -> SessionRecord {
        SessionRecord {
            user_id: "u1".to_string(),
            last_exercise: exercise.map(str::to_string),
            feedback: feedback.map(str::to_string),
            reminders_sent: reminders,
            scheduled_time: None,
        }
    }

    fn runner(store: Arc<InMemorySessionStore>, tools: MockCoachingTools) -> SessionRunner {
        SessionRunner::new(store, Arc::new(ActionDispatcher::new(Arc::new(tools))))
    }

    #[tokio::test]
    async fn test_rejects_blank_user_id() {
        let runner = runner(Arc::new(InMemorySessionStore::new()), MockCoachingTools::new());
        assert!(matches!(
            runner.run("  ").await,
            Err(CoachError::InvalidUserId(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_user_gets_exercise() {
        let mut tools = MockCoachingTools::new();
        tools
            .expect_send_exercise()
            .withf(|user_id| user_id == "newcomer")
            .times(1)
            .returning(|_| Ok("exercise sent".to_string()));
        let runner = runner(Arc::new(InMemorySessionStore::new()), tools);

        assert_eq!(runner.run("newcomer").await.unwrap(), "exercise sent");
    }

    #[tokio::test]
    async fn test_waiting_and_acknowledging_without_delegate() {
        let runner_wait = runner(
            store_with(record(Some("pushups"), None, 3)).await,
            MockCoachingTools::new(),
        );
        assert_eq!(runner_wait.run("u1").await.unwrap(), WAITING_MESSAGE);

        let runner_ack = runner(
            store_with(record(Some("pushups"), Some("done!"), 3)).await,
            MockCoachingTools::new(),
        );
        assert!(runner_ack.run("u1").await.unwrap().contains("done!"));
    }

    #[tokio::test]
    async fn test_failing_delegate_matches_fallback() {
        for (input, expected) in [
            (record(None, None, 0), "exercise sent"),
            (record(Some("pushups"), None, 1), "reminder sent"),
        ] {
            let mut tools = MockCoachingTools::new();
            tools
                .expect_send_exercise()
                .returning(|_| Ok("exercise sent".to_string()));
            tools
                .expect_send_reminder()
                .returning(|_| Ok("reminder sent".to_string()));
            let plain = runner(store_with(input.clone()).await, tools);
            let fallback_result = plain.run("u1").await.unwrap();

            let mut tools = MockCoachingTools::new();
            tools
                .expect_send_exercise()
                .returning(|_| Ok("exercise sent".to_string()));
            tools
                .expect_send_reminder()
                .returning(|_| Ok("reminder sent".to_string()));
            let delegated = runner(store_with(input).await, tools).with_delegate(Arc::new(FailingDelegate));

            assert_eq!(delegated.run("u1").await.unwrap(), fallback_result);
            assert_eq!(fallback_result, expected);
        }
    }

    #[tokio::test]
    async fn test_failing_delegate_on_wait_returns_waiting_message() {
        let runner = runner(
            store_with(record(Some("pushups"), None, 3)).await,
            MockCoachingTools::new(),
        )
        .with_delegate(Arc::new(FailingDelegate));

        assert_eq!(runner.run("u1").await.unwrap(), WAITING_MESSAGE);
    }

    #[tokio::test]
    async fn test_delegate_that_acts_is_trusted() {
        let mut tools = MockCoachingTools::new();
        tools
            .expect_send_reminder()
            .times(1)
            .returning(|_| Ok("reminder sent".to_string()));
        let runner = runner(store_with(record(Some("pushups"), None, 0)).await, tools)
            .with_delegate(Arc::new(ScriptedDelegate {
                invoke: Some(Action::SendReminder),
                answer: Some("I nudged you about your pushups."),
            }));

        assert_eq!(
            runner.run("u1").await.unwrap(),
            "I nudged you about your pushups."
        );
    }

    #[tokio::test]
    async fn test_delegate_failure_after_acting_does_not_repeat_tool() {
        let mut tools = MockCoachingTools::new();
        tools
            .expect_send_exercise()
            .times(1)
            .returning(|_| Ok("exercise sent".to_string()));
        let runner = runner(store_with(record(None, None, 0)).await, tools).with_delegate(Arc::new(
            ScriptedDelegate {
                invoke: Some(Action::SendExercise),
                answer: None,
            },
        ));

        assert_eq!(runner.run("u1").await.unwrap(), "exercise sent");
    }

    #[tokio::test]
    async fn test_delegate_blank_answer_after_acting_returns_tool_result() {
        let mut tools = MockCoachingTools::new();
        tools
            .expect_send_exercise()
            .times(1)
            .returning(|_| Ok("exercise sent".to_string()));
        let runner = runner(store_with(record(None, None, 0)).await, tools).with_delegate(Arc::new(
            ScriptedDelegate {
                invoke: Some(Action::SendExercise),
                answer: Some("   "),
            },
        ));

        assert_eq!(runner.run("u1").await.unwrap(), "exercise sent");
    }

    #[tokio::test]
    async fn test_delegate_skipping_required_tool_is_discarded() {
        let mut tools = MockCoachingTools::new();
        tools
            .expect_send_exercise()
            .times(1)
            .returning(|_| Ok("exercise sent".to_string()));
        let runner = runner(store_with(record(None, None, 0)).await, tools).with_delegate(Arc::new(
            ScriptedDelegate {
                invoke: None,
                answer: Some("Great job today!"),
            },
        ));

        assert_eq!(runner.run("u1").await.unwrap(), "exercise sent");
    }

    #[tokio::test]
    async fn test_delegate_wrong_tool_is_rejected_then_fallback() {
        let mut tools = MockCoachingTools::new();
        tools.expect_send_exercise().never();
        tools
            .expect_send_reminder()
            .times(1)
            .returning(|_| Ok("reminder sent".to_string()));
        let runner = runner(store_with(record(Some("pushups"), None, 2)).await, tools)
            .with_delegate(Arc::new(ScriptedDelegate {
                invoke: Some(Action::SendExercise),
                answer: Some("Here's a new exercise!"),
            }));

        assert_eq!(runner.run("u1").await.unwrap(), "reminder sent");
    }

    #[tokio::test]
    async fn test_delegate_narration_accepted_when_no_tool_needed() {
        let runner = runner(
            store_with(record(Some("pushups"), Some("done!"), 1)).await,
            MockCoachingTools::new(),
        )
        .with_delegate(Arc::new(ScriptedDelegate {
            invoke: None,
            answer: Some("Amazing work on the pushups!"),
        }));

        assert_eq!(runner.run("u1").await.unwrap(), "Amazing work on the pushups!");
    }

    #[tokio::test]
    async fn test_tool_failure_surfaces_as_error() {
        let mut tools = MockCoachingTools::new();
        tools
            .expect_send_exercise()
            .times(1)
            .returning(|_| Err(ToolError::Store(anyhow::anyhow!("disk full"))));
        let runner = runner(Arc::new(InMemorySessionStore::new()), tools)
            .with_delegate(Arc::new(FailingDelegate));

        let err = runner.run("u1").await.unwrap_err();
        assert!(matches!(err, CoachError::ToolInvocation { tool: "send_exercise", .. }));
    }

    #[tokio::test]
    async fn test_full_coaching_loop_with_store_tools() {
        let store = Arc::new(InMemorySessionStore::new());
        let tools = Arc::new(StoreTools::new(
            store.clone(),
            ExerciseCatalog::new(vec!["pushups".to_string()]),
        ));
        let runner = SessionRunner::new(store.clone(), Arc::new(ActionDispatcher::new(tools.clone())))
            .with_delegate(Arc::new(FailingDelegate));

        assert!(runner.run("u1").await.unwrap().contains("pushups"));
        for n in 1..=3 {
            let reminder = runner.run("u1").await.unwrap();
            assert!(reminder.starts_with(&format!("Reminder {}/3", n)));
        }
        assert_eq!(runner.run("u1").await.unwrap(), WAITING_MESSAGE);
        assert_eq!(store.get("u1").await.unwrap().reminders_sent, 3);

        tools.record_feedback("u1", "done!").await.unwrap();
        assert_eq!(
            runner.run("u1").await.unwrap(),
            "Thanks for completing your exercise! Your feedback: 'done!'"
        );
    }
}
