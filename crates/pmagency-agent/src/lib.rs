//! Agent runtime for the project-management agency.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  send_message  ┌──────────────┐
//! │ Entry agent  │───────────────>│ Worker agent │
//! └──────┬───────┘                └──────┬───────┘
//!        │          ReAct loop           │
//!        └──────────────┬────────────────┘
//!                ┌──────┴──────┐   ┌──────────┐
//!                │  LLM Client │   │ Adapters │
//!                │ (OpenAI/Az) │   │ (tools)  │
//!                └─────────────┘   └──────────┘
//! ```
//!
//! ## Modules
//!
//! - [`llm`] -- LLM client, streaming, and wire types.
//! - [`runtime`] -- The ReAct loop and tool adapter trait.
//! - [`compaction`] -- Prompt trimming to a token budget.
//! - [`agency`] -- Agents, communication chart, threads and `send_message`.
//! - [`profile`] -- Loading an agency from `agency.toml` and markdown files.
//! - [`error`] -- Agent error types.

pub mod agency;
pub mod compaction;
pub mod error;
pub mod llm;
pub mod profile;
pub mod runtime;

pub use agency::{
    Agency, AgencyBuilder, AgencyChart, AgencyDefinition, AgencyEvent, AgencyEventCallback,
    AgentProfile,
};
pub use compaction::{estimate_tokens, trim_to_token_budget};
pub use error::{AgentError, Result};
pub use llm::{
    ChatRequest, LlmClient, LlmClientConfig, LlmProvider, LlmResponse, Message, Role, ToolCall,
    ToolDefinition, ToolResult,
};
pub use profile::load_agency;
pub use runtime::{
    AgentConfig, AgentContext, AgentEvent, AgentResponse, EventCallback, ToolAdapter, react_loop,
};
