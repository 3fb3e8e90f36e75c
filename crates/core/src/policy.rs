//! Decision Policy
//!
//! The deterministic rule that maps a session record to the next coaching
//! action. It is the authority the reasoning delegate is checked against and
//! the path taken whenever the delegate is unavailable.

use crate::session::SessionRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of reminders sent for one exercise before the coach stops nudging.
pub const MAX_REMINDERS: u32 = 3;

/// One of the mutually exclusive responses the coach can take for a user.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    SendExercise,
    SendReminder,
    WaitForFeedback,
    AcknowledgeFeedback,
}

impl Action {
    /// Whether carrying out this action requires a tool collaborator call.
    pub fn requires_tool(self) -> bool {
        matches!(self, Action::SendExercise | Action::SendReminder)
    }

    /// The tool name the action is exposed under, if it has one.
    pub fn tool_name(self) -> Option<&'static str> {
        match self {
            Action::SendExercise => Some("send_exercise"),
            Action::SendReminder => Some("send_reminder"),
            Action::WaitForFeedback | Action::AcknowledgeFeedback => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::SendExercise => write!(f, "SEND_EXERCISE"),
            Action::SendReminder => write!(f, "SEND_REMINDER"),
            Action::WaitForFeedback => write!(f, "WAIT_FOR_FEEDBACK"),
            Action::AcknowledgeFeedback => write!(f, "ACKNOWLEDGE_FEEDBACK"),
        }
    }
}

/// Chooses the action for `record`. First matching rule wins:
///
/// 1. feedback present: acknowledge it
/// 2. no exercise assigned: send one
/// 3. fewer than [`MAX_REMINDERS`] reminders: remind
/// 4. otherwise: wait for feedback
pub fn decide(record: &SessionRecord) -> Action {
    if record.feedback.is_some() {
        Action::AcknowledgeFeedback
    } else if record.last_exercise.is_none() {
        Action::SendExercise
    } else if record.reminders_sent < MAX_REMINDERS {
        Action::SendReminder
    } else {
        Action::WaitForFeedback
    }
}
