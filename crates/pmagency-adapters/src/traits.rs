//! The [`Adapter`] trait shared by the Notion, ClickUp and WhatsApp tool
//! providers, plus the small types it exchanges with the agent runtime.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// Broad kind of backing service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterType {
    /// Outbound messages to people (WhatsApp).
    Messaging,
    /// Task boards (Notion databases, ClickUp lists).
    Productivity,
    /// Local helpers with no remote service.
    Utility,
}

impl std::fmt::Display for AdapterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Messaging => "messaging",
            Self::Productivity => "productivity",
            Self::Utility => "utility",
        })
    }
}

/// Result of [`Adapter::health_check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Credentials accepted and the service answered.
    Healthy,
    /// Reachable, but something is off (timeouts, unexpected errors).
    Degraded,
    /// Not connected, or the service rejects the credentials.
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
        })
    }
}

/// One callable tool as advertised to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Globally unique name, prefixed by service (`notion_get_tasks`).
    pub name: String,
    pub description: String,
    /// JSON Schema of the arguments object.
    pub parameters: Value,
}

/// Credential an adapter needs before `connect` succeeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthRequirement {
    /// Service that issues the credential (`notion`, `clickup`, `evolution`).
    pub provider: String,
    pub scopes: Vec<String>,
}

// ---------------------------------------------------------------------------
// Core trait
// ---------------------------------------------------------------------------

/// A connected service that exposes tools to the agency.
///
/// Callers discover tools with [`Adapter::tools`] and run them with
/// [`Adapter::execute_tool`]; every tool takes and returns JSON.
#[async_trait]
pub trait Adapter: Send + Sync {
    fn id(&self) -> &str;

    fn adapter_type(&self) -> AdapterType;

    /// Validate configuration and mark the adapter usable.  No network I/O.
    async fn connect(&mut self) -> Result<()>;

    async fn disconnect(&mut self) -> Result<()>;

    /// Probe the remote service with the configured credentials.
    async fn health_check(&self) -> Result<HealthStatus>;

    fn tools(&self) -> Vec<ToolDefinition>;

    /// Run tool `name` with a JSON arguments object.
    async fn execute_tool(&self, name: &str, params: Value) -> Result<Value>;

    fn required_auth(&self) -> Option<AuthRequirement>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_serde_names() {
        for t in [AdapterType::Messaging, AdapterType::Productivity, AdapterType::Utility] {
            assert_eq!(serde_json::to_value(t).unwrap(), Value::String(t.to_string()));
        }
        for s in [HealthStatus::Healthy, HealthStatus::Degraded, HealthStatus::Unhealthy] {
            assert_eq!(serde_json::to_value(s).unwrap(), Value::String(s.to_string()));
        }
    }
}
