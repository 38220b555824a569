//! Adapter bridge: converts [`pmagency_adapters::Adapter`] to
//! [`pmagency_agent::ToolAdapter`].
//!
//! The two traits have slightly different signatures (different field names,
//! `Value` vs `String` return types), so this struct handles the conversion.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use pmagency_agent::ToolAdapter;

/// Bridges an adapter-crate `Adapter` to the agent-crate `ToolAdapter`.
pub struct AdapterBridge {
    adapter: Arc<dyn pmagency_adapters::Adapter>,
}

impl AdapterBridge {
    pub fn new(adapter: Arc<dyn pmagency_adapters::Adapter>) -> Self {
        Self { adapter }
    }

    /// Convert an adapter-side `ToolDefinition` to an agent-side `ToolDefinition`.
    fn convert_tool_def(
        td: &pmagency_adapters::ToolDefinition,
    ) -> pmagency_agent::ToolDefinition {
        pmagency_agent::ToolDefinition {
            name: td.name.clone(),
            description: td.description.clone(),
            input_schema: td.parameters.clone(),
        }
    }
}

#[async_trait]
impl ToolAdapter for AdapterBridge {
    fn adapter_id(&self) -> &str {
        self.adapter.id()
    }

    fn tool_definitions(&self) -> Vec<pmagency_agent::ToolDefinition> {
        self.adapter
            .tools()
            .iter()
            .map(Self::convert_tool_def)
            .collect()
    }

    async fn execute(&self, tool_name: &str, arguments: Value) -> pmagency_agent::Result<String> {
        let result = self
            .adapter
            .execute_tool(tool_name, arguments)
            .await
            .map_err(|e| pmagency_agent::AgentError::ToolExecutionFailed {
                tool_name: tool_name.to_owned(),
                reason: e.to_string(),
            })?;

        let text = match result {
            Value::String(s) => s,
            other => serde_json::to_string_pretty(&other).unwrap_or_else(|_| other.to_string()),
        };
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pmagency_adapters::{
        Adapter, AdapterError, AdapterType, AuthRequirement, HealthStatus, ToolDefinition,
    };
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl Adapter for Echo {
        fn id(&self) -> &str {
            "echo"
        }
        fn adapter_type(&self) -> AdapterType {
            AdapterType::Utility
        }
        async fn connect(&mut self) -> pmagency_adapters::Result<()> {
            Ok(())
        }
        async fn disconnect(&mut self) -> pmagency_adapters::Result<()> {
            Ok(())
        }
        async fn health_check(&self) -> pmagency_adapters::Result<HealthStatus> {
            Ok(HealthStatus::Healthy)
        }
        fn tools(&self) -> Vec<ToolDefinition> {
            vec![ToolDefinition {
                name: "echo".into(),
                description: "Echo the input".into(),
                parameters: json!({ "type": "object", "properties": { "text": { "type": "string" } } }),
            }]
        }
        async fn execute_tool(&self, name: &str, params: Value) -> pmagency_adapters::Result<Value> {
            match params.get("text").and_then(Value::as_str) {
                Some("plain") => Ok(json!("plain text")),
                Some(_) => Ok(json!({ "echo": params["text"] })),
                None => Err(AdapterError::InvalidParams {
                    tool_name: name.to_owned(),
                    reason: "missing `text`".into(),
                }),
            }
        }
        fn required_auth(&self) -> Option<AuthRequirement> {
            None
        }
    }

    #[test]
    fn converts_tool_definitions() {
        let bridge = AdapterBridge::new(Arc::new(Echo));
        assert_eq!(bridge.adapter_id(), "echo");
        let defs = bridge.tool_definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "echo");
        assert_eq!(defs[0].input_schema["properties"]["text"]["type"], "string");
    }

    #[tokio::test]
    async fn json_output_is_pretty_printed_and_strings_pass_through() {
        let bridge = AdapterBridge::new(Arc::new(Echo));
        let out = bridge.execute("echo", json!({ "text": "hi" })).await.unwrap();
        assert_eq!(out, "{\n  \"echo\": \"hi\"\n}");
        let out = bridge.execute("echo", json!({ "text": "plain" })).await.unwrap();
        assert_eq!(out, "plain text");
    }

    #[tokio::test]
    async fn adapter_errors_become_tool_failures() {
        let bridge = AdapterBridge::new(Arc::new(Echo));
        let err = bridge.execute("echo", json!({})).await.unwrap_err();
        match err {
            pmagency_agent::AgentError::ToolExecutionFailed { tool_name, reason } => {
                assert_eq!(tool_name, "echo");
                assert!(reason.contains("missing `text`"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
