use crate::policy::Action;
use crate::session::InvalidUserId;

/// Failures raised by a tool collaborator.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("No exercise has been assigned to user '{0}' yet")]
    NoExercise(String),
    #[error("Reminder limit of {limit} reached for user '{user_id}'")]
    ReminderLimit { user_id: String, limit: u32 },
    #[error("Feedback text must not be empty")]
    EmptyFeedback,
    #[error(transparent)]
    InvalidUserId(#[from] InvalidUserId),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// The error taxonomy of a coaching run.
#[derive(Debug, thiserror::Error)]
pub enum CoachError {
    #[error(transparent)]
    InvalidUserId(#[from] InvalidUserId),
    /// The reasoning delegate failed or produced unusable output.
    #[error("Reasoning delegate unavailable: {0}")]
    ReasoningUnavailable(String),
    /// A tool collaborator failed while carrying out an action.
    #[error("Tool '{tool}' failed: {source}")]
    ToolInvocation {
        tool: &'static str,
        #[source]
        source: ToolError,
    },
    /// The tool gate refused a call from the reasoning delegate.
    #[error("Action {requested} rejected: {reason}")]
    ToolRejected { requested: Action, reason: String },
    #[error("Session store failure: {0}")]
    Store(#[source] anyhow::Error),
}

impl CoachError {
    pub(crate) fn reasoning(err: impl std::fmt::Display) -> Self {
        CoachError::ReasoningUnavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_tool_invocation_exposes_source() {
        let err = CoachError::ToolInvocation {
            tool: "send_reminder",
            source: ToolError::ReminderLimit {
                user_id: "u1".to_string(),
                limit: 3,
            },
        };

        assert_eq!(
            err.to_string(),
            "Tool 'send_reminder' failed: Reminder limit of 3 reached for user 'u1'"
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn test_invalid_user_id_converts_into_both_taxonomies() {
        let coach: CoachError = InvalidUserId(" ".to_string()).into();
        assert_eq!(coach.to_string(), "Invalid user id: \" \"");

        let tool: ToolError = InvalidUserId(String::new()).into();
        assert!(matches!(tool, ToolError::InvalidUserId(InvalidUserId(ref id)) if id.is_empty()));
    }

    #[test]
    fn test_rejected_display_names_action() {
        let err = CoachError::ToolRejected {
            requested: Action::SendReminder,
            reason: "policy chose SEND_EXERCISE".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Action SEND_REMINDER rejected: policy chose SEND_EXERCISE"
        );
    }
}
