//! Coach Agent Tool Service
//!
//! Exposes the coaching tools to a language model over the Model Context
//! Protocol (MCP). Every side-effecting tool goes through the run's `ToolGate`,
//! so the model can only carry out the action the decision policy allows.

use crate::gate::ToolGate;
use crate::policy::Action;
use rmcp::{
    ServerHandler,
    handler::server::router::tool::ToolRouter,
    model::{ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use tracing::info;

/// The MCP service backing one reasoning attempt.
pub struct CoachService {
    gate: ToolGate,
    /// MCP tool router for handling incoming tool calls.
    tool_router: ToolRouter<Self>,
}

#[tool_handler]
impl ServerHandler for CoachService {
    /// Returns server information and capabilities, advertising tool support.
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[tool_router]
impl CoachService {
    pub fn new(gate: ToolGate) -> Self {
        Self {
            gate,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        description = "Get the user's current coaching state: last exercise, feedback, reminders sent, and scheduled time."
    )]
    pub async fn get_session_status(&self) -> Result<String, String> {
        info!("Executing tool 'get_session_status'");
        serde_json::to_string(self.gate.record())
            .map_err(|e| format!("Failed to serialize session state: {}", e))
    }

    #[tool(description = "Send the user a new daily exercise. Use when no exercise has been assigned.")]
    pub async fn send_exercise(&self) -> Result<String, String> {
        info!("Executing tool 'send_exercise'");
        self.gate
            .invoke(Action::SendExercise)
            .await
            .map_err(|e| e.to_string())
    }

    #[tool(
        description = "Remind the user to complete their current exercise. Use when an exercise is assigned, no feedback was received, and fewer than 3 reminders were sent."
    )]
    pub async fn send_reminder(&self) -> Result<String, String> {
        info!("Executing tool 'send_reminder'");
        self.gate
            .invoke(Action::SendReminder)
            .await
            .map_err(|e| e.to_string())
    }
}
