//! Reasoning Delegate
//!
//! An optional LLM-driven path that narrates and carries out the coaching
//! decision through tool calls. The delegate is never authoritative: its tools
//! are gated by the decision policy and any failure hands control back to the
//! deterministic fallback in the runner.

use crate::agent::CoachService;
use crate::error::CoachError;
use crate::gate::ToolGate;
use crate::llm_client::{LLMAction, LLMClient, LLMStreamEvent};
use crate::session::SessionRecord;
use anyhow::{Context, Result};
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestToolMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionTool, ChatCompletionToolArgs,
    FunctionObjectArgs,
};
use async_trait::async_trait;
use futures::StreamExt;
use rmcp::{
    ServiceExt,
    model::{CallToolRequestParam, RawContent},
    service::{RoleClient, RunningService},
};
use std::sync::Arc;
use tracing::{debug, info};

/// Default number of reasoning turns before the model is asked for a final answer.
pub const DEFAULT_MAX_ITERATIONS: usize = 3;

/// The built-in system prompt. It states the same rule order as the policy.
pub const SYSTEM_PROMPT: &str = include_str!("../prompts/system_prompt.md");

/// Renders the per-turn context handed to the delegate.
pub fn render_context(record: &SessionRecord) -> String {
    let scheduled = record
        .scheduled_time
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "None".to_string());
    format!(
        "User ID: {}\n\
         Current state:\n\
         - Last exercise: {}\n\
         - Feedback received: {}\n\
         - Reminders sent: {}\n\
         - Scheduled time: {}\n\
         \n\
         Based on this state, determine what action to take for this user.",
        record.user_id,
        record.last_exercise.as_deref().unwrap_or("None"),
        record.feedback.as_deref().unwrap_or("None"),
        record.reminders_sent,
        scheduled,
    )
}

/// A component that reasons about a session in free text.
#[async_trait]
pub trait ReasoningDelegate: Send + Sync {
    /// Produces a response for `context`. Any side effect must go through `gate`.
    async fn infer(&self, context: &str, gate: ToolGate) -> Result<String, CoachError>;
}

/// A `ReasoningDelegate` that runs a bounded ReAct loop against an LLM.
///
/// The gated tools are served over an in-process MCP transport for the duration
/// of one `infer` call.
pub struct LlmReasoningDelegate {
    llm_client: Arc<dyn LLMClient>,
    system_prompt: String,
    max_iterations: usize,
}

impl LlmReasoningDelegate {
    pub fn new(llm_client: Arc<dyn LLMClient>, system_prompt: String, max_iterations: usize) -> Self {
        Self {
            llm_client,
            system_prompt,
            max_iterations: max_iterations.max(1),
        }
    }

    async fn react(
        &self,
        context: &str,
        mcp_client: &RunningService<RoleClient, ()>,
    ) -> Result<String> {
        let mut messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(self.system_prompt.clone())
                .build()?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(context.to_string())
                .build()?
                .into(),
        ];

        let tools = mcp_client
            .list_all_tools()
            .await?
            .into_iter()
            .map(|t| {
                Ok(ChatCompletionToolArgs::default()
                    .function(
                        FunctionObjectArgs::default()
                            .name(t.name)
                            .description(t.description.unwrap_or_default())
                            .parameters(serde_json::to_value(&*t.input_schema)?)
                            .build()?,
                    )
                    .build()?)
            })
            .collect::<Result<Vec<ChatCompletionTool>>>()?;

        for iteration in 1..=self.max_iterations {
            let action = self
                .llm_client
                .decide_action(messages.clone(), tools.clone())
                .await?;

            let tool_calls = match action {
                LLMAction::TextResponse(text) => {
                    debug!(iteration, "Delegate answered with text");
                    return Ok(text);
                }
                LLMAction::ToolCall(tool_calls) => tool_calls,
            };

            let mut tool_results = Vec::with_capacity(tool_calls.len());
            for call in &tool_calls {
                info!(iteration, tool = %call.function.name, "Delegate requested tool");
                let arguments = if call.function.arguments.trim().is_empty() {
                    None
                } else {
                    Some(serde_json::from_str(&call.function.arguments)?)
                };
                let result = mcp_client
                    .peer()
                    .call_tool(CallToolRequestParam {
                        name: call.function.name.clone().into(),
                        arguments,
                    })
                    .await?;

                let annotated_content = result
                    .content
                    .context("Tool call returned no content")?
                    .pop()
                    .context("Content list was empty")?;
                let result_text = match annotated_content.raw {
                    RawContent::Text(text_content) => text_content.text,
                    _ => "{\"error\": \"Unexpected content type from tool\"}".to_string(),
                };
                tool_results.push(result_text);
            }

            messages.push(
                ChatCompletionRequestAssistantMessageArgs::default()
                    .tool_calls(tool_calls.clone())
                    .build()?
                    .into(),
            );
            for (call, result) in tool_calls.iter().zip(tool_results) {
                messages.push(
                    ChatCompletionRequestToolMessageArgs::default()
                        .tool_call_id(call.id.clone())
                        .content(result)
                        .build()?
                        .into(),
                );
            }
        }

        // Out of iterations: ask for a final answer without tools.
        debug!("Iteration limit reached, generating final answer");
        let mut final_stream = self.llm_client.stream_after_tools(messages).await?;
        let mut full_response = String::new();
        while let Some(event_result) = final_stream.next().await {
            let LLMStreamEvent::TextChunk(chunk) = event_result?;
            full_response.push_str(&chunk);
        }
        Ok(full_response)
    }
}

#[async_trait]
impl ReasoningDelegate for LlmReasoningDelegate {
    async fn infer(&self, context: &str, gate: ToolGate) -> Result<String, CoachError> {
        let service = CoachService::new(gate);
        let (server_transport, client_transport) = tokio::io::duplex(4096);

        let tool_handle = tokio::spawn(async move {
            if let Ok(service) = service.serve(server_transport).await {
                let _ = service.waiting().await;
            }
        });

        let outcome = match ().serve(client_transport).await {
            Ok(mcp_client) => {
                let outcome = self.react(context, &mcp_client).await;
                drop(mcp_client);
                outcome
            }
            Err(e) => Err(e.into()),
        };
        tool_handle.abort();

        let response = outcome.map_err(|e| CoachError::reasoning(format!("{:#}", e)))?;
        if response.trim().is_empty() {
            return Err(CoachError::reasoning("empty response"));
        }
        Ok(response)
    }
}
