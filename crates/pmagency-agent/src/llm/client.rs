//! Chat completion client.
//!
//! Speaks the **OpenAI Chat Completions API**, which covers OpenAI itself,
//! OpenAI-compatible endpoints (Ollama, vLLM, LiteLLM) and **Azure OpenAI**
//! deployments.  Both streaming SSE and non-streaming modes are supported, and
//! every request goes through a bounded retry loop with exponential backoff.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use serde_json::{Value, json};

use crate::error::{AgentError, Result};
use crate::llm::streaming_openai::OpenAiStreamAccumulator;
use crate::llm::types::{ChatRequest, LlmResponse, Message, Role, ToolCall, ToolDefinition, Usage};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default OpenAI API base URL.
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Azure OpenAI data-plane API version used when none is configured.
pub const DEFAULT_AZURE_API_VERSION: &str = "2024-10-21";

const DEFAULT_MAX_TOKENS: u32 = 4096;
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Upper bound for a single retry delay, including server-sent `Retry-After`.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Provider enum
// ---------------------------------------------------------------------------

/// Identifies which flavour of the Chat Completions API the client targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    /// OpenAI or any OpenAI-compatible endpoint (`Authorization: Bearer`).
    OpenAI,
    /// Azure OpenAI deployment (`api-key` header, deployment in the path).
    AzureOpenAI,
}

impl LlmProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::AzureOpenAI => "azure",
        }
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Client configuration
// ---------------------------------------------------------------------------

/// Configuration for connecting to a single LLM endpoint.
#[derive(Debug, Clone)]
pub struct LlmClientConfig {
    /// Which provider this configuration targets.
    pub provider: LlmProvider,
    /// API key for authentication.
    pub api_key: String,
    /// Base URL (OpenAI) or resource endpoint (Azure).
    pub base_url: String,
    /// Default model (OpenAI) or deployment name (Azure).
    pub default_model: String,
    /// Default maximum tokens per response.
    pub max_tokens: u32,
    /// Azure `api-version` query parameter.
    pub api_version: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Retries after the first attempt for transport errors, 429 and 5xx.
    pub max_retries: u32,
    /// Base delay, doubled on every retry.
    pub retry_backoff: Duration,
}

impl LlmClientConfig {
    fn base(provider: LlmProvider, api_key: String, base_url: String, model: String) -> Self {
        Self {
            provider,
            api_key,
            base_url: base_url.trim_end_matches('/').to_owned(),
            default_model: model,
            max_tokens: DEFAULT_MAX_TOKENS,
            api_version: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }

    /// Create a configuration for the OpenAI API.
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::base(
            LlmProvider::OpenAI,
            api_key.into(),
            OPENAI_BASE_URL.to_owned(),
            model.into(),
        )
    }

    /// Create a configuration for any OpenAI-compatible API.
    pub fn openai_compatible(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self::base(
            LlmProvider::OpenAI,
            api_key.into(),
            base_url.into(),
            model.into(),
        )
    }

    /// Create a configuration for an Azure OpenAI deployment.
    pub fn azure(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        deployment: impl Into<String>,
        api_version: Option<String>,
    ) -> Self {
        let mut config = Self::base(
            LlmProvider::AzureOpenAI,
            api_key.into(),
            endpoint.into(),
            deployment.into(),
        );
        config.api_version =
            Some(api_version.unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.to_owned()));
        config
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// An LLM client for the Chat Completions API.
///
/// Cheap to clone; clones share the configuration and the connection pool.
#[derive(Debug, Clone)]
pub struct LlmClient {
    config: Arc<LlmClientConfig>,
    http: reqwest::Client,
}

impl LlmClient {
    /// Create a new client with the given configuration.
    pub fn new(config: LlmClientConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(AgentError::MissingApiKey {
                provider: config.provider.to_string(),
            });
        }
        if config.provider == LlmProvider::AzureOpenAI && config.base_url.is_empty() {
            return Err(AgentError::ConfigError {
                reason: "Azure OpenAI requires an endpoint".into(),
            });
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AgentError::LlmRequestFailed {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            config: Arc::new(config),
            http,
        })
    }

    pub fn provider(&self) -> LlmProvider {
        self.config.provider
    }

    pub fn default_model(&self) -> &str {
        &self.config.default_model
    }

    // -----------------------------------------------------------------------
    // Public API
    // -----------------------------------------------------------------------

    /// Send a chat request and return the full response (non-streaming).
    pub async fn chat(&self, request: &ChatRequest) -> Result<LlmResponse> {
        let body = self.build_request_body(request, false);
        let resp = self.send_with_retry(request, &body).await?;

        let text = resp.text().await.map_err(|e| AgentError::LlmRequestFailed {
            reason: format!("failed to read response body: {e}"),
        })?;
        let v: Value = serde_json::from_str(&text).map_err(|e| AgentError::LlmParseFailed {
            reason: format!("invalid JSON response: {e}"),
        })?;

        if let Some(usage) = Usage::from_openai(&v) {
            log_usage(self.config.provider, &usage);
        }
        parse_openai_response(&v)
    }

    /// Send a chat request using streaming SSE and return the aggregated
    /// response.
    pub async fn stream_chat(&self, request: &ChatRequest) -> Result<LlmResponse> {
        self.stream_chat_with_callback(request, |_| {}).await
    }

    /// Send a chat request using streaming SSE, invoking a callback for each
    /// text delta so callers can render incremental output.
    pub async fn stream_chat_with_callback<F>(
        &self,
        request: &ChatRequest,
        mut on_text: F,
    ) -> Result<LlmResponse>
    where
        F: FnMut(&str) + Send,
    {
        let body = self.build_request_body(request, true);
        let resp = self.send_with_retry(request, &body).await?;
        let (response, usage) = consume_openai_stream(resp, &mut on_text).await?;
        log_usage(self.config.provider, &usage);
        Ok(response)
    }

    // -----------------------------------------------------------------------
    // Request building
    // -----------------------------------------------------------------------

    fn model_for<'a>(&'a self, request: &'a ChatRequest) -> &'a str {
        if request.model.is_empty() {
            &self.config.default_model
        } else {
            &request.model
        }
    }

    /// Build the JSON body for the Chat Completions API.
    fn build_request_body(&self, request: &ChatRequest, stream: bool) -> Value {
        let mut body = json!({
            "model": self.model_for(request),
            "max_tokens": request.max_tokens.unwrap_or(self.config.max_tokens),
            "messages": messages_to_openai(&request.messages),
        });

        if let Some(temp) = request.temperature {
            body["temperature"] = json!(temp);
        }

        if !request.tools.is_empty() {
            body["tools"] = tools_to_openai(&request.tools);
        }

        if stream {
            body["stream"] = json!(true);
            body["stream_options"] = json!({ "include_usage": true });
        }

        body
    }

    /// Endpoint URL for this provider; Azure puts the deployment in the path.
    fn endpoint_url(&self, request: &ChatRequest) -> String {
        match self.config.provider {
            LlmProvider::OpenAI => format!("{}/chat/completions", self.config.base_url),
            LlmProvider::AzureOpenAI => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                self.config.base_url,
                self.model_for(request),
                self.config
                    .api_version
                    .as_deref()
                    .unwrap_or(DEFAULT_AZURE_API_VERSION),
            ),
        }
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let (name, value) = match self.config.provider {
            LlmProvider::OpenAI => (AUTHORIZATION, format!("Bearer {}", self.config.api_key)),
            LlmProvider::AzureOpenAI => (
                HeaderName::from_static("api-key"),
                self.config.api_key.clone(),
            ),
        };
        headers.insert(
            name,
            HeaderValue::from_str(&value).map_err(|e| AgentError::LlmRequestFailed {
                reason: format!("invalid authorization header: {e}"),
            })?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    // -----------------------------------------------------------------------
    // Retry loop
    // -----------------------------------------------------------------------

    /// POST the body, retrying transport errors, 429 and 5xx responses.
    ///
    /// Returns the first successful response; a non-retryable status (or one
    /// that is still failing after the last retry) becomes
    /// [`AgentError::LlmStatus`].
    async fn send_with_retry(&self, request: &ChatRequest, body: &Value) -> Result<reqwest::Response> {
        let url = self.endpoint_url(request);
        let headers = self.headers()?;
        let max_retries = self.config.max_retries;

        let mut attempt: u32 = 0;
        loop {
            tracing::debug!(
                url = %url,
                model = %body["model"],
                provider = %self.config.provider,
                attempt,
                "sending LLM request"
            );

            let result = self
                .http
                .post(&url)
                .headers(headers.clone())
                .json(body)
                .send()
                .await;

            let delay = match result {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) => {
                    let status = resp.status();
                    if !is_retryable_status(status) || attempt >= max_retries {
                        let text = resp.text().await.unwrap_or_default();
                        return Err(AgentError::LlmStatus {
                            status: status.as_u16(),
                            body: text,
                        });
                    }
                    let delay = retry_after(resp.headers())
                        .unwrap_or_else(|| backoff_delay(self.config.retry_backoff, attempt));
                    tracing::warn!(
                        status = status.as_u16(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "LLM request failed, retrying"
                    );
                    delay
                }
                Err(e) => {
                    if attempt >= max_retries {
                        return Err(AgentError::LlmRequestFailed {
                            reason: format!("{e} (after {} attempts)", attempt + 1),
                        });
                    }
                    let delay = backoff_delay(self.config.retry_backoff, attempt);
                    tracing::warn!(
                        error = %e,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "LLM transport error, retrying"
                    );
                    delay
                }
            };

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// `base * 2^attempt`, capped.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
        .min(MAX_RETRY_DELAY)
}

/// Seconds form of the `Retry-After` header, capped.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let secs: u64 = headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse().ok()?;
    Some(Duration::from_secs(secs).min(MAX_RETRY_DELAY))
}

fn log_usage(provider: LlmProvider, usage: &Usage) {
    tracing::debug!(
        provider = %provider,
        input_tokens = usage.input_tokens,
        output_tokens = usage.output_tokens,
        "LLM usage"
    );
}

// ---------------------------------------------------------------------------
// Streaming
// ---------------------------------------------------------------------------

/// Consume an SSE stream and aggregate it into a final response.
///
/// Bytes are buffered until a full line is available so multi-byte
/// characters split across chunks decode correctly.
async fn consume_openai_stream<F>(
    resp: reqwest::Response,
    on_text: &mut F,
) -> Result<(LlmResponse, Usage)>
where
    F: FnMut(&str),
{
    let mut accumulator = OpenAiStreamAccumulator::new();
    let mut byte_stream = resp.bytes_stream();
    let mut buffer: Vec<u8> = Vec::new();

    while let Some(chunk_result) = byte_stream.next().await {
        let chunk = chunk_result.map_err(|e| AgentError::LlmStreamError {
            reason: format!("stream read error: {e}"),
        })?;
        buffer.extend_from_slice(&chunk);

        while let Some(newline_pos) = buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = buffer.drain(..=newline_pos).collect();
            let line = std::str::from_utf8(&raw).map_err(|e| AgentError::LlmStreamError {
                reason: format!("invalid UTF-8 in stream: {e}"),
            })?;

            if let Some(delta_text) = accumulator.feed_line(line)? {
                on_text(&delta_text);
            }

            if accumulator.is_done() {
                return accumulator.into_response();
            }
        }
    }

    // Trailing line without a newline.
    if !buffer.is_empty() {
        let line = String::from_utf8_lossy(&buffer).into_owned();
        if let Some(delta_text) = accumulator.feed_line(&line)? {
            on_text(&delta_text);
        }
    }

    accumulator.into_response()
}

// ===========================================================================
// Wire format conversion
// ===========================================================================

/// Convert internal messages into the Chat Completions wire format.
///
/// System messages stay in the `messages` array, tool calls live in
/// `assistant.tool_calls`, and tool results use `role: "tool"` with a
/// `tool_call_id`.
pub fn messages_to_openai(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|msg| match msg.role {
            Role::System => json!({ "role": "system", "content": msg.content }),
            Role::User => json!({ "role": "user", "content": msg.content }),
            Role::Assistant if msg.tool_calls.is_empty() => {
                json!({ "role": "assistant", "content": msg.content })
            }
            Role::Assistant => {
                let tool_calls: Vec<Value> = msg
                    .tool_calls
                    .iter()
                    .map(|tc| {
                        json!({
                            "id": tc.id,
                            "type": "function",
                            "function": {
                                "name": tc.name,
                                "arguments": tc.arguments_json(),
                            }
                        })
                    })
                    .collect();

                let mut m = json!({ "role": "assistant", "tool_calls": tool_calls });
                if !msg.content.is_empty() {
                    m["content"] = json!(msg.content);
                }
                m
            }
            Role::Tool => json!({
                "role": "tool",
                "tool_call_id": msg.tool_call_id,
                "content": msg.content,
            }),
        })
        .collect()
}

/// Convert tool definitions into the Chat Completions format.
pub fn tools_to_openai(tools: &[ToolDefinition]) -> Value {
    let tool_values: Vec<Value> = tools
        .iter()
        .map(|t| {
            json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.input_schema,
                }
            })
        })
        .collect();
    json!(tool_values)
}

/// Parse a non-streaming Chat Completions response into an [`LlmResponse`].
pub fn parse_openai_response(v: &Value) -> Result<LlmResponse> {
    let message = &v["choices"][0]["message"];

    if message.is_null() {
        return Err(AgentError::LlmParseFailed {
            reason: "missing `choices[0].message` in response".into(),
        });
    }

    if let Some(tool_calls_arr) = message["tool_calls"].as_array()
        && !tool_calls_arr.is_empty()
    {
        let calls = tool_calls_arr
            .iter()
            .map(|tc| {
                let func = &tc["function"];
                let name = func["name"].as_str().unwrap_or_default().to_owned();
                ToolCall::from_raw_arguments(
                    tc["id"].as_str().unwrap_or_default(),
                    name,
                    func["arguments"].as_str().unwrap_or_default(),
                )
            })
            .collect();

        return Ok(LlmResponse::ToolCalls(calls));
    }

    let content = message["content"].as_str().unwrap_or_default();
    Ok(LlmResponse::Text(content.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn request(messages: Vec<Message>) -> ChatRequest {
        ChatRequest {
            model: String::new(),
            messages,
            tools: vec![],
            temperature: None,
            max_tokens: None,
            stream: false,
        }
    }

    fn openai_client(base_url: &str) -> LlmClient {
        LlmClient::new(
            LlmClientConfig::openai_compatible("sk-test", "gpt-4o", base_url)
                .with_retry_backoff(Duration::from_millis(1)),
        )
        .unwrap()
    }

    #[test]
    fn empty_api_key_returns_error() {
        let err = LlmClient::new(LlmClientConfig::openai("", "gpt-4o")).unwrap_err();
        assert!(matches!(err, AgentError::MissingApiKey { provider } if provider == "openai"));
    }

    #[test]
    fn azure_config_defaults_api_version() {
        let config = LlmClientConfig::azure("k", "https://vrsen.openai.azure.com/", "gpt-4o", None);
        assert_eq!(config.provider, LlmProvider::AzureOpenAI);
        assert_eq!(config.base_url, "https://vrsen.openai.azure.com");
        assert_eq!(config.api_version.as_deref(), Some(DEFAULT_AZURE_API_VERSION));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.timeout_secs, 60);
    }

    #[test]
    fn azure_endpoint_uses_deployment_path() {
        let client = LlmClient::new(LlmClientConfig::azure(
            "k",
            "https://vrsen.openai.azure.com",
            "gpt-4o-pm",
            Some("2024-06-01".into()),
        ))
        .unwrap();
        assert_eq!(
            client.endpoint_url(&request(vec![])),
            "https://vrsen.openai.azure.com/openai/deployments/gpt-4o-pm/chat/completions?api-version=2024-06-01"
        );
    }

    #[test]
    fn build_request_body_with_tools_and_stream() {
        let client = openai_client("http://localhost");
        let mut req = request(vec![Message::system("be brief"), Message::user("hi")]);
        req.temperature = Some(0.3);
        req.tools = vec![ToolDefinition {
            name: "notion_get_tasks".into(),
            description: "List tasks".into(),
            input_schema: json!({ "type": "object", "properties": {} }),
        }];

        let body = client.build_request_body(&req, true);
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["max_tokens"], 4096);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["tools"][0]["function"]["name"], "notion_get_tasks");
        assert_eq!(body["stream"], true);
        assert!((body["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn messages_to_openai_tool_round() {
        let call = ToolCall::new("call_1", "clickup_get_task", json!({ "task_id": "86a1" }));
        let wire = messages_to_openai(&[
            Message::assistant_tool_calls(vec![call]),
            Message::tool_result("call_1", "{\"id\":\"86a1\"}"),
        ]);
        assert_eq!(wire[0]["tool_calls"][0]["type"], "function");
        assert_eq!(
            wire[0]["tool_calls"][0]["function"]["arguments"],
            "{\"task_id\":\"86a1\"}"
        );
        assert!(wire[0].get("content").is_none());
        assert_eq!(wire[1]["role"], "tool");
        assert_eq!(wire[1]["tool_call_id"], "call_1");
    }

    #[test]
    fn parse_openai_text_and_tool_calls() {
        let text = json!({ "choices": [{ "message": { "role": "assistant", "content": "Done." } }] });
        assert!(matches!(parse_openai_response(&text).unwrap(), LlmResponse::Text(t) if t == "Done."));

        let calls = json!({
            "choices": [{ "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_9",
                    "type": "function",
                    "function": { "name": "send_message", "arguments": "{\"recipient\":\"NotionProjectAgent\"}" }
                }]
            }}]
        });
        match parse_openai_response(&calls).unwrap() {
            LlmResponse::ToolCalls(c) => {
                assert_eq!(c[0].id, "call_9");
                assert_eq!(c[0].arguments["recipient"], "NotionProjectAgent");
            }
            other => panic!("expected tool calls, got {other:?}"),
        }

        assert!(parse_openai_response(&json!({ "choices": [] })).is_err());
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let base = Duration::from_millis(500);
        assert_eq!(backoff_delay(base, 0), Duration::from_millis(500));
        assert_eq!(backoff_delay(base, 2), Duration::from_secs(2));
        assert_eq!(backoff_delay(base, 20), MAX_RETRY_DELAY);
    }

    #[test]
    fn retry_after_header_is_parsed() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("2"));
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(2)));
        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(retry_after(&headers), None);
    }

    #[tokio::test]
    async fn chat_sends_bearer_and_parses_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(json!({ "model": "gpt-4o" })))
            .with_status(200)
            .with_body(
                json!({
                    "choices": [{ "message": { "role": "assistant", "content": "Hello" } }],
                    "usage": { "prompt_tokens": 10, "completion_tokens": 1 }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = openai_client(&server.url());
        let resp = client.chat(&request(vec![Message::user("hi")])).await.unwrap();
        assert!(matches!(resp, LlmResponse::Text(t) if t == "Hello"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn azure_sends_api_key_header() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/openai/deployments/pm-gpt/chat/completions")
            .match_query(Matcher::UrlEncoded("api-version".into(), "2024-10-21".into()))
            .match_header("api-key", "azure-key")
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"ok"}}]}"#)
            .create_async()
            .await;

        let client = LlmClient::new(LlmClientConfig::azure(
            "azure-key",
            server.url(),
            "pm-gpt",
            None,
        ))
        .unwrap();
        let resp = client.chat(&request(vec![Message::user("hi")])).await.unwrap();
        assert!(matches!(resp, LlmResponse::Text(t) if t == "ok"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn server_errors_are_retried_then_surface_status() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(503)
            .with_body("overloaded")
            .expect(4)
            .create_async()
            .await;

        let client = openai_client(&server.url());
        let err = client.chat(&request(vec![Message::user("hi")])).await.unwrap_err();
        assert!(matches!(err, AgentError::LlmStatus { status: 503, ref body } if body == "overloaded"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rate_limited_request_is_retried_until_success() {
        let mut server = mockito::Server::new_async().await;
        let limited = server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_header("retry-after", "0")
            .with_body("slow down")
            .expect(1)
            .create_async()
            .await;
        let ok = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(
                json!({
                    "choices": [{ "message": { "role": "assistant", "content": "back online" },
                                  "finish_reason": "stop" }]
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let client = openai_client(&server.url());
        let resp = client.chat(&request(vec![Message::user("hi")])).await.unwrap();
        assert!(matches!(resp, LlmResponse::Text(t) if t == "back online"));
        limited.assert_async().await;
        ok.assert_async().await;
    }

    #[tokio::test]
    async fn transport_errors_report_attempt_count() {
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let client = LlmClient::new(
            LlmClientConfig::openai_compatible("sk-test", "gpt-4o", format!("http://{addr}"))
                .with_retry_backoff(Duration::from_millis(1))
                .with_max_retries(1),
        )
        .unwrap();

        let err = client.chat(&request(vec![Message::user("hi")])).await.unwrap_err();
        match err {
            AgentError::LlmRequestFailed { reason } => {
                assert!(reason.ends_with("(after 2 attempts)"), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body(r#"{"error":{"message":"bad key"}}"#)
            .expect(1)
            .create_async()
            .await;

        let client = openai_client(&server.url());
        let err = client.chat(&request(vec![Message::user("hi")])).await.unwrap_err();
        assert!(matches!(err, AgentError::LlmStatus { status: 401, .. }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn stream_chat_invokes_callback_per_delta() {
        let mut server = mockito::Server::new_async().await;
        let sse = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\",\"content\":\"Sprint \"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"is on track\"}}]}\n\n",
            "data: [DONE]\n\n",
        );
        let _mock = server
            .mock("POST", "/chat/completions")
            .match_body(Matcher::PartialJson(json!({ "stream": true })))
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(sse)
            .create_async()
            .await;

        let client = openai_client(&server.url());
        let mut deltas = Vec::new();
        let resp = client
            .stream_chat_with_callback(&request(vec![Message::user("status?")]), |d| {
                deltas.push(d.to_owned())
            })
            .await
            .unwrap();
        assert_eq!(deltas, vec!["Sprint ", "is on track"]);
        assert!(matches!(resp, LlmResponse::Text(t) if t == "Sprint is on track"));
    }
}
