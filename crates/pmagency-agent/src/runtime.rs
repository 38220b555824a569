//! Core ReAct loop runtime.
//!
//! Implements the **Reason + Act** loop that drives every agent.  The agent
//! sends its history to the LLM, and when the LLM responds with tool calls the
//! runtime executes them and feeds the results back.  This continues until
//! the LLM produces a final text response or the turn limit is exceeded.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::compaction::trim_to_token_budget;
use crate::error::{AgentError, Result};
use crate::llm::LlmClient;
use crate::llm::types::{ChatRequest, LlmResponse, Message, ToolCall, ToolDefinition, ToolResult};

// ---------------------------------------------------------------------------
// Tool adapter trait
// ---------------------------------------------------------------------------

/// Trait for components that can execute tool calls on behalf of an agent.
///
/// External-service adapters and the agency's `send_message` tool implement
/// this trait so the ReAct loop can invoke them uniformly.
#[async_trait]
pub trait ToolAdapter: Send + Sync {
    /// The unique identifier for this adapter.
    fn adapter_id(&self) -> &str;

    /// Returns the tool definitions this adapter exposes to the LLM.
    fn tool_definitions(&self) -> Vec<ToolDefinition>;

    /// Execute a named tool with the given arguments.
    ///
    /// Returns the result as a string suitable for feeding back to the LLM.
    async fn execute(&self, tool_name: &str, arguments: Value) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Progress notifications emitted while the loop runs.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// A fragment of the model's streamed text answer.
    TextDelta(String),
    /// The model asked for a tool; emitted before it runs.
    ToolCallStarted { name: String, arguments: Value },
    /// A tool finished.
    ToolOutput {
        name: String,
        output: String,
        is_error: bool,
    },
}

/// Receives [`AgentEvent`]s.  Must be cheap; it runs on the loop's task.
pub type EventCallback = Arc<dyn Fn(AgentEvent) + Send + Sync>;

// ---------------------------------------------------------------------------
// Agent context
// ---------------------------------------------------------------------------

/// Configuration for the ReAct loop.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Maximum number of ReAct turns (LLM call + tool execution = 1 turn).
    pub max_turns: u32,

    /// Model or deployment; empty uses the client default.
    pub model: String,

    /// Optional temperature for sampling.
    pub temperature: Option<f32>,

    /// Optional max tokens per response.
    pub max_tokens: Option<u32>,

    /// Estimated token budget for the history sent with each request.
    pub max_prompt_tokens: Option<usize>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: 20,
            model: String::new(),
            temperature: None,
            max_tokens: Some(4096),
            max_prompt_tokens: None,
        }
    }
}

/// Holds the state for a single agent invocation.
pub struct AgentContext {
    /// Unique identifier for this agent run.
    pub task_id: Uuid,

    /// Conversation message history.  Never trimmed in place; trimming only
    /// applies to what is sent.
    pub messages: Vec<Message>,

    /// Tool adapters available for this run.
    pub adapters: Vec<Arc<dyn ToolAdapter>>,

    /// The LLM client to use.
    pub llm: Arc<LlmClient>,

    /// Runtime configuration.
    pub config: AgentConfig,

    on_event: Option<EventCallback>,
}

impl AgentContext {
    /// Create a new agent context.
    pub fn new(
        llm: Arc<LlmClient>,
        adapters: Vec<Arc<dyn ToolAdapter>>,
        config: AgentConfig,
    ) -> Self {
        Self {
            task_id: Uuid::now_v7(),
            messages: Vec::new(),
            adapters,
            llm,
            config,
            on_event: None,
        }
    }

    /// Add a system prompt to the conversation.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.messages.insert(0, Message::system(prompt));
        self
    }

    /// Add a user message to the conversation.
    pub fn with_user_message(mut self, message: impl Into<String>) -> Self {
        self.messages.push(Message::user(message));
        self
    }

    /// Continue an existing conversation.
    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_event_callback(mut self, callback: EventCallback) -> Self {
        self.on_event = Some(callback);
        self
    }

    fn emit(&self, event: AgentEvent) {
        if let Some(cb) = &self.on_event {
            cb(event);
        }
    }

    /// Collect all tool definitions from registered adapters.
    fn all_tool_definitions(&self) -> Vec<ToolDefinition> {
        self.adapters
            .iter()
            .flat_map(|a| a.tool_definitions())
            .collect()
    }

    /// Find the adapter that owns a given tool name.
    fn find_adapter_for_tool(&self, tool_name: &str) -> Option<&Arc<dyn ToolAdapter>> {
        self.adapters
            .iter()
            .find(|a| a.tool_definitions().iter().any(|td| td.name == tool_name))
    }

    /// History to send this turn, trimmed to the prompt budget if one is set.
    fn request_messages(&self) -> Vec<Message> {
        match self.config.max_prompt_tokens {
            Some(budget) => trim_to_token_budget(&self.messages, budget),
            None => self.messages.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Agent response
// ---------------------------------------------------------------------------

/// The final response from an agent invocation.
#[derive(Debug, Clone)]
pub struct AgentResponse {
    /// The final text output from the agent.
    pub text: String,

    /// Number of ReAct turns that were executed.
    pub turns_used: u32,

    /// The task ID for this invocation.
    pub task_id: Uuid,
}

impl AgentResponse {
    pub fn new(text: String, turns_used: u32, task_id: Uuid) -> Self {
        Self {
            text,
            turns_used,
            task_id,
        }
    }
}

// ---------------------------------------------------------------------------
// ReAct loop
// ---------------------------------------------------------------------------

/// Execute the ReAct (Reason + Act) loop.
///
/// 1. Sends the (trimmed) conversation to the LLM.
/// 2. If the LLM returns tool calls, executes them concurrently.
/// 3. Appends tool results to the conversation.
/// 4. Repeats until the LLM returns a text response or `max_turns` is hit.
///
/// Tool failures and unknown tool names are reported back to the model as
/// `Error: ...` results and never end the loop.
///
/// # Errors
///
/// Returns [`AgentError::MaxTurnsExceeded`] if the loop hits the turn limit.
/// LLM client errors are propagated.
pub async fn react_loop(ctx: &mut AgentContext) -> Result<AgentResponse> {
    let tools = ctx.all_tool_definitions();
    let task_id = ctx.task_id;
    let max_turns = ctx.config.max_turns;

    tracing::info!(
        task_id = %task_id,
        max_turns,
        tool_count = tools.len(),
        "starting ReAct loop"
    );

    for turn in 0..max_turns {
        tracing::debug!(turn, "ReAct turn start");

        let request = ChatRequest {
            model: ctx.config.model.clone(),
            messages: ctx.request_messages(),
            tools: tools.clone(),
            temperature: ctx.config.temperature,
            max_tokens: ctx.config.max_tokens,
            stream: true,
        };

        let response = match ctx.on_event.clone() {
            Some(cb) => {
                ctx.llm
                    .stream_chat_with_callback(&request, move |delta| {
                        cb(AgentEvent::TextDelta(delta.to_owned()))
                    })
                    .await?
            }
            None => ctx.llm.stream_chat(&request).await?,
        };

        match response {
            LlmResponse::Text(text) => {
                tracing::info!(
                    task_id = %task_id,
                    turns = turn + 1,
                    "ReAct loop completed with text response"
                );
                ctx.messages.push(Message::assistant(&text));
                return Ok(AgentResponse::new(text, turn + 1, task_id));
            }

            LlmResponse::ToolCalls(calls) => {
                tracing::info!(
                    task_id = %task_id,
                    turn,
                    tool_count = calls.len(),
                    tools = ?calls.iter().map(|c| &c.name).collect::<Vec<_>>(),
                    "LLM requested tool calls"
                );

                ctx.messages
                    .push(Message::assistant_tool_calls(calls.clone()));

                let results = execute_tool_calls(&calls, ctx).await?;

                for (call, result) in calls.iter().zip(&results) {
                    ctx.emit(AgentEvent::ToolOutput {
                        name: call.name.clone(),
                        output: result.content.clone(),
                        is_error: result.is_error,
                    });
                }
                for result in results {
                    ctx.messages
                        .push(Message::tool_result(result.tool_call_id, result.content));
                }
            }
        }
    }

    Err(AgentError::MaxTurnsExceeded { task_id, max_turns })
}

/// Execute a batch of tool calls, returning their results in call order.
///
/// Calls are executed concurrently using `tokio::spawn`.
async fn execute_tool_calls(calls: &[ToolCall], ctx: &AgentContext) -> Result<Vec<ToolResult>> {
    enum Pending {
        Ready(ToolResult),
        Running(tokio::task::JoinHandle<ToolResult>),
    }

    let mut pending = Vec::with_capacity(calls.len());

    for call in calls {
        ctx.emit(AgentEvent::ToolCallStarted {
            name: call.name.clone(),
            arguments: call.arguments.clone(),
        });

        if let Some(reason) = &call.arguments_error {
            tracing::warn!(tool = %call.name, error = %reason, "LLM sent malformed tool arguments");
            pending.push(Pending::Ready(ToolResult {
                tool_call_id: call.id.clone(),
                content: format!("Error: invalid JSON arguments for {}: {reason}", call.name),
                is_error: true,
            }));
            continue;
        }

        let Some(adapter) = ctx.find_adapter_for_tool(&call.name).cloned() else {
            tracing::warn!(tool = %call.name, "LLM requested an unknown tool");
            pending.push(Pending::Ready(ToolResult {
                tool_call_id: call.id.clone(),
                content: format!(
                    "Error: {}",
                    AgentError::UnknownTool {
                        tool_name: call.name.clone()
                    }
                ),
                is_error: true,
            }));
            continue;
        };

        let tool_name = call.name.clone();
        let tool_id = call.id.clone();
        let arguments = call.arguments.clone();

        pending.push(Pending::Running(tokio::spawn(async move {
            tracing::debug!(tool = %tool_name, id = %tool_id, "executing tool");

            match adapter.execute(&tool_name, arguments).await {
                Ok(content) => ToolResult {
                    tool_call_id: tool_id,
                    content,
                    is_error: false,
                },
                Err(e) => {
                    tracing::warn!(tool = %tool_name, error = %e, "tool execution failed");
                    ToolResult {
                        tool_call_id: tool_id,
                        content: format!("Error: {e}"),
                        is_error: true,
                    }
                }
            }
        })));
    }

    let mut results = Vec::with_capacity(pending.len());
    for p in pending {
        let result = match p {
            Pending::Ready(r) => r,
            Pending::Running(handle) => handle
                .await
                .map_err(|e| AgentError::Internal(format!("tool execution task panicked: {e}")))?,
        };
        results.push(result);
    }

    Ok(results)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
