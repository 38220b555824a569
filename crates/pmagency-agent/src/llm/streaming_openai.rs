//! SSE stream parser for the Chat Completions API.
//!
//! OpenAI and Azure OpenAI both stream `data:` lines whose JSON payloads carry
//! `choices[].delta` objects and terminate with a `data: [DONE]` sentinel.
//! Azure additionally sends an initial chunk with an empty `choices` array
//! (prompt filter results), which is skipped.

use serde_json::Value;

use crate::error::{AgentError, Result};
use crate::llm::types::{LlmResponse, ToolCall, Usage};

/// Highest `tool_calls[].index` accepted from the server.
const MAX_TOOL_CALL_INDEX: u64 = 128;

// ---------------------------------------------------------------------------
// Stream accumulator
// ---------------------------------------------------------------------------

/// Accumulates fragments from a chat completion stream into a complete
/// response.
///
/// Text deltas are concatenated.  Tool call deltas arrive keyed by `index`:
/// the id and function name come first, argument fragments follow.
#[derive(Debug, Default)]
pub struct OpenAiStreamAccumulator {
    text: String,
    tool_call_builders: Vec<ToolCallBuilder>,
    done: bool,
    usage: Usage,
}

#[derive(Debug, Default)]
struct ToolCallBuilder {
    id: String,
    name: String,
    arguments: String,
}

impl OpenAiStreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` once the `[DONE]` sentinel has been received.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed a single SSE line from the stream.
    ///
    /// Returns `Ok(Some(text_delta))` when the line carried text content,
    /// `Ok(None)` for everything else.
    pub fn feed_line(&mut self, line: &str) -> Result<Option<String>> {
        let line = line.trim_end();

        if line.is_empty() || line.starts_with(':') {
            return Ok(None);
        }

        // `data:` with or without the conventional space.
        let Some(data) = line.strip_prefix("data:") else {
            return Ok(None);
        };
        let data = data.trim();

        if data == "[DONE]" {
            self.done = true;
            return Ok(None);
        }

        let v: Value = serde_json::from_str(data).map_err(|e| AgentError::LlmParseFailed {
            reason: format!("invalid JSON in SSE data: {e}"),
        })?;

        if let Some(usage) = Usage::from_openai(&v) {
            self.usage = usage;
        }

        let delta = &v["choices"][0]["delta"];
        if delta.is_null() {
            return Ok(None);
        }

        let mut text_delta = None;
        if let Some(content) = delta["content"].as_str()
            && !content.is_empty()
        {
            self.text.push_str(content);
            text_delta = Some(content.to_owned());
        }

        if let Some(tool_calls) = delta["tool_calls"].as_array() {
            for tc in tool_calls {
                let index = tc["index"].as_u64().unwrap_or(0);
                if index > MAX_TOOL_CALL_INDEX {
                    return Err(AgentError::LlmParseFailed {
                        reason: format!(
                            "tool call index {index} exceeds the limit of {MAX_TOOL_CALL_INDEX}"
                        ),
                    });
                }
                let index = index as usize;
                if self.tool_call_builders.len() <= index {
                    self.tool_call_builders
                        .resize_with(index + 1, ToolCallBuilder::default);
                }
                let builder = &mut self.tool_call_builders[index];

                if let Some(id) = tc["id"].as_str() {
                    builder.id = id.to_owned();
                }
                let func = &tc["function"];
                if let Some(name) = func["name"].as_str() {
                    builder.name.push_str(name);
                }
                if let Some(args) = func["arguments"].as_str() {
                    builder.arguments.push_str(args);
                }
            }
        }

        Ok(text_delta)
    }

    /// Consume the accumulator and produce the final response and usage.
    ///
    /// Accumulated tool calls take priority over text.  Malformed argument
    /// JSON is kept on the call (see [`ToolCall::arguments_error`]) so the
    /// runtime can report it back to the model.
    pub fn into_response(self) -> Result<(LlmResponse, Usage)> {
        let usage = self.usage;
        if self.tool_call_builders.is_empty() {
            return Ok((LlmResponse::Text(self.text), usage));
        }

        let calls = self
            .tool_call_builders
            .into_iter()
            .filter(|b| !b.name.is_empty())
            .map(|b| ToolCall::from_raw_arguments(b.id, b.name, &b.arguments))
            .collect();

        Ok((LlmResponse::ToolCalls(calls), usage))
    }
}
