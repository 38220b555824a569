//! LLM integration layer.
//!
//! - [`types`] -- Core data types (messages, tool calls, usage).
//! - [`client`] -- HTTP client for OpenAI and Azure OpenAI chat completions.
//! - [`streaming_openai`] -- SSE stream parser for incremental responses.

pub mod client;
pub mod streaming_openai;
pub mod types;

pub use client::{LlmClient, LlmClientConfig, LlmProvider};
pub use types::{
    ChatRequest, LlmResponse, Message, Role, ToolCall, ToolDefinition, ToolResult, Usage,
};
