//! Agent error types.
//!
//! All agent subsystems surface errors through [`AgentError`].  Each variant
//! carries enough context for callers to decide how to handle the failure.

use std::path::PathBuf;

use uuid::Uuid;

/// Unified error type for the agent runtime and agency orchestration.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    // -- LLM errors ----------------------------------------------------------
    /// An HTTP request to the LLM provider failed.
    #[error("llm request failed: {reason}")]
    LlmRequestFailed { reason: String },

    /// The provider answered with a non-success status.
    #[error("llm provider returned {status}: {body}")]
    LlmStatus { status: u16, body: String },

    /// The LLM response could not be parsed into the expected format.
    #[error("llm response parse error: {reason}")]
    LlmParseFailed { reason: String },

    /// The streaming SSE connection was interrupted or produced invalid data.
    #[error("llm stream error: {reason}")]
    LlmStreamError { reason: String },

    /// The API key is missing for a provider that requires one.
    #[error("missing api key for provider: {provider}")]
    MissingApiKey { provider: String },

    // -- Runtime errors ------------------------------------------------------
    /// The ReAct loop exceeded the maximum number of allowed turns.
    #[error("react loop exceeded max turns ({max_turns}) for task {task_id}")]
    MaxTurnsExceeded { task_id: Uuid, max_turns: u32 },

    /// A tool call referenced by the LLM does not exist in the registry.
    #[error("unknown tool: {tool_name}")]
    UnknownTool { tool_name: String },

    /// A tool invocation failed.
    #[error("tool execution failed for `{tool_name}`: {reason}")]
    ToolExecutionFailed { tool_name: String, reason: String },

    // -- Agency errors -------------------------------------------------------
    /// An agent name does not exist in the agency.
    #[error("unknown agent: {name}")]
    UnknownAgent { name: String },

    /// A message was addressed to an agent the caller may not talk to.
    #[error("`{sender}` cannot send messages to `{recipient}`")]
    FlowNotAllowed { sender: String, recipient: String },

    /// Agents kept delegating past the configured depth.
    #[error("delegation depth {depth} exceeds the limit of {max_depth}")]
    DelegationTooDeep { depth: u32, max_depth: u32 },

    // -- Configuration errors ------------------------------------------------
    /// Configuration validation or loading failed.
    #[error("config error: {reason}")]
    ConfigError { reason: String },

    /// Validation failed for input data.
    #[error("validation error: {reason}")]
    ValidationError { reason: String },

    /// Reading an agency definition file failed.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // -- Serialization -------------------------------------------------------
    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The agency TOML could not be parsed.
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    // -- Generic -------------------------------------------------------------
    /// Catch-all for unexpected internal errors.  Prefer a typed variant
    /// whenever possible.
    #[error("internal agent error: {0}")]
    Internal(String),
}

/// Convenience alias used throughout the agent crate.
pub type Result<T> = std::result::Result<T, AgentError>;

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        Self::LlmRequestFailed {
            reason: err.to_string(),
        }
    }
}
