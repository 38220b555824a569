//! Adapter error types.
//!
//! All adapter subsystems surface errors through [`AdapterError`].  Each
//! variant carries enough context for callers to decide how to handle the
//! failure without inspecting opaque strings.

/// Unified error type for the service adapters.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// The requested tool does not exist on this adapter.
    #[error("tool not found: `{tool_name}` on adapter `{adapter_id}`")]
    ToolNotFound {
        adapter_id: String,
        tool_name: String,
    },

    /// The parameters supplied to a tool are invalid.
    #[error("invalid parameters for tool `{tool_name}`: {reason}")]
    InvalidParams { tool_name: String, reason: String },

    /// A tool invocation failed.
    #[error("execution failed for tool `{tool_name}`: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    /// The remote API answered with a non-success status.
    #[error("{service} API returned {status} for `{tool_name}`: {message}")]
    Api {
        service: &'static str,
        tool_name: String,
        status: u16,
        message: String,
    },

    /// The adapter requires credentials that have not been configured.
    #[error("authentication required for adapter `{adapter_id}`: provider={provider}")]
    AuthRequired {
        adapter_id: String,
        provider: String,
    },

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// An operation exceeded its time limit.
    #[error("timeout after {seconds}s: {reason}")]
    Timeout { seconds: u64, reason: String },

    /// Configuration error in adapter setup.
    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl AdapterError {
    /// Shorthand for [`AdapterError::InvalidParams`].
    pub(crate) fn invalid(tool_name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidParams {
            tool_name: tool_name.to_owned(),
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout the adapters crate.
pub type Result<T> = std::result::Result<T, AdapterError>;
