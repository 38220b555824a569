//! Send-only WhatsApp adapter backed by an Evolution API instance.
//!
//! The agency uses this to reach a human for approval, feedback or missing
//! information.  Incoming messages are not handled.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::error::{AdapterError, Result};
use crate::http;
use crate::params::{required_str, required_text};
use crate::traits::{Adapter, AdapterType, AuthRequirement, HealthStatus, ToolDefinition};

/// E.164 subscriber number once separators are stripped.
static PHONE_DIGITS: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[1-9][0-9]{7,14}$").ok());

/// Connection settings for an Evolution API instance.
#[derive(Debug, Clone)]
pub struct WhatsAppConfig {
    /// Base URL of the Evolution API server.
    pub api_url: String,
    /// Global or instance API key, sent as the `apikey` header.
    pub api_key: String,
    /// Instance name used in the request path.
    pub instance: String,
}

impl WhatsAppConfig {
    pub fn new(api_url: &str, api_key: &str, instance: &str) -> Self {
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            instance: instance.to_string(),
        }
    }
}

/// WhatsApp text sender.
pub struct WhatsAppAdapter {
    id: String,
    connected: bool,
    config: WhatsAppConfig,
    client: reqwest::Client,
}

impl WhatsAppAdapter {
    pub fn new(id: &str, config: WhatsAppConfig) -> Self {
        Self {
            id: id.to_string(),
            connected: false,
            config,
            client: http::build_client(),
        }
    }

    async fn tool_send_text(&self, params: Value) -> Result<Value> {
        let tool = "whatsapp_send_text";
        let raw_number = required_str(&params, "phone_number", tool)?;
        let number = normalize_phone_number(raw_number).ok_or_else(|| {
            AdapterError::invalid(
                tool,
                format!(
                    "`phone_number` must be an E.164 number such as 5521988456100, got `{raw_number}`"
                ),
            )
        })?;
        let message = required_text(&params, "message", tool)?;

        let url = format!(
            "{}/message/sendText/{}",
            self.config.api_url, self.config.instance
        );
        let request = self
            .client
            .post(url)
            .header("apikey", &self.config.api_key)
            .json(&json!({ "number": number, "text": message }));

        let response = http::send_json("Evolution", request, tool).await?;
        info!(
            instance = %self.config.instance,
            chars = message.chars().count(),
            message_id = ?response.pointer("/key/id"),
            "WhatsApp message sent"
        );
        Ok(response)
    }
}

/// Strip `+`, spaces, dashes and parentheses; `None` unless 8-15 digits remain.
fn normalize_phone_number(raw: &str) -> Option<String> {
    let digits: String = raw
        .trim()
        .trim_start_matches('+')
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();
    PHONE_DIGITS
        .as_ref()
        .is_some_and(|re| re.is_match(&digits))
        .then_some(digits)
}

fn build_tool_definitions() -> Vec<ToolDefinition> {
    vec![ToolDefinition {
        name: "whatsapp_send_text".into(),
        description: "Send a WhatsApp text message to a person. Use it to request \
                      authorization, feedback or missing information from a human"
            .into(),
        parameters: json!({
            "type": "object",
            "properties": {
                "phone_number": {
                    "type": "string",
                    "description": "Recipient number in E.164 format without '+', e.g. 5521988456100"
                },
                "message": {
                    "type": "string",
                    "description": "Text to send"
                }
            },
            "required": ["phone_number", "message"]
        }),
    }]
}

#[async_trait]
impl Adapter for WhatsAppAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Messaging
    }

    async fn connect(&mut self) -> Result<()> {
        if self.config.api_key.is_empty() {
            return Err(AdapterError::AuthRequired {
                adapter_id: self.id.clone(),
                provider: "evolution".into(),
            });
        }
        if self.config.api_url.is_empty() || self.config.instance.is_empty() {
            return Err(AdapterError::ConfigError(
                "Evolution API URL and instance name are required".into(),
            ));
        }
        self.connected = true;
        info!(id = %self.id, instance = %self.config.instance, "WhatsApp adapter connected");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.connected = false;
        info!(id = %self.id, "WhatsApp adapter disconnected");
        Ok(())
    }

    async fn health_check(&self) -> Result<HealthStatus> {
        if !self.connected {
            return Ok(HealthStatus::Unhealthy);
        }
        let url = format!(
            "{}/instance/connectionState/{}",
            self.config.api_url, self.config.instance
        );
        let request = self.client.get(url).header("apikey", &self.config.api_key);
        match http::send_json("Evolution", request, "health_check").await {
            Ok(state) => {
                let open = state
                    .pointer("/instance/state")
                    .and_then(Value::as_str)
                    .is_some_and(|s| s == "open");
                Ok(if open {
                    HealthStatus::Healthy
                } else {
                    HealthStatus::Degraded
                })
            }
            Err(e) => {
                warn!(error = %e, "WhatsApp health check failed");
                Ok(HealthStatus::Unhealthy)
            }
        }
    }

    fn tools(&self) -> Vec<ToolDefinition> {
        build_tool_definitions()
    }

    async fn execute_tool(&self, name: &str, params: Value) -> Result<Value> {
        if !self.connected {
            return Err(AdapterError::ExecutionFailed {
                tool_name: name.to_string(),
                reason: format!("adapter `{}` is not connected", self.id),
            });
        }

        match name {
            "whatsapp_send_text" => self.tool_send_text(params).await,
            _ => Err(AdapterError::ToolNotFound {
                adapter_id: self.id.clone(),
                tool_name: name.to_string(),
            }),
        }
    }

    fn required_auth(&self) -> Option<AuthRequirement> {
        Some(AuthRequirement {
            provider: "evolution".into(),
            scopes: vec!["message:send".into()],
        })
    }
}
