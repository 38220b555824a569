//! Shared request plumbing for the JSON-over-HTTPS adapters.

use std::time::Duration;

use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::{AdapterError, Result};

/// Per-request timeout applied to every adapter client.
pub(crate) const REQUEST_TIMEOUT_SECS: u64 = 30;

/// `User-Agent` sent by every adapter client.
const USER_AGENT: &str = concat!("pmagency/", env!("CARGO_PKG_VERSION"));

/// Build the shared `reqwest` client used by an adapter.
pub(crate) fn build_client() -> reqwest::Client {
    client_or_fallback(
        reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build(),
    )
}

/// Unwrap a built client, falling back to reqwest's defaults (no timeout,
/// no user agent) with a warning so the lost settings are visible.
fn client_or_fallback(built: reqwest::Result<reqwest::Client>) -> reqwest::Client {
    built.unwrap_or_else(|e| {
        warn!(
            error = %e,
            timeout_secs = REQUEST_TIMEOUT_SECS,
            "failed to build HTTP client; using defaults without timeout or user agent"
        );
        reqwest::Client::default()
    })
}

/// Send a request and parse its JSON body.
///
/// Non-success statuses become [`AdapterError::Api`] carrying the most
/// specific error text found in the body (`err`, `message` or `error`).
/// An empty success body (e.g. `204 No Content`) is returned as `null`.
pub(crate) async fn send_json(
    service: &'static str,
    request: reqwest::RequestBuilder,
    tool_name: &str,
) -> Result<Value> {
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            AdapterError::Timeout {
                seconds: REQUEST_TIMEOUT_SECS,
                reason: format!("{service} API request timed out: {e}"),
            }
        } else {
            AdapterError::ExecutionFailed {
                tool_name: tool_name.to_string(),
                reason: format!("{service} API request failed: {e}"),
            }
        }
    })?;

    let status = response.status();
    let body_text = response
        .text()
        .await
        .map_err(|e| AdapterError::ExecutionFailed {
            tool_name: tool_name.to_string(),
            reason: format!("failed to read response body: {e}"),
        })?;

    debug!(
        service,
        tool = tool_name,
        status = status.as_u16(),
        bytes = body_text.len(),
        "API response received"
    );

    if !status.is_success() {
        let message = extract_error_message(&body_text);
        warn!(
            service,
            tool = tool_name,
            status = status.as_u16(),
            error = %message,
            "API request rejected"
        );
        return Err(AdapterError::Api {
            service,
            tool_name: tool_name.to_string(),
            status: status.as_u16(),
            message,
        });
    }

    if body_text.trim().is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_str(&body_text).map_err(|e| AdapterError::ExecutionFailed {
        tool_name: tool_name.to_string(),
        reason: format!("failed to parse {service} API response as JSON: {e}"),
    })
}

/// Pull a human-readable message out of an error body.
fn extract_error_message(body_text: &str) -> String {
    let body: Value = serde_json::from_str(body_text).unwrap_or_else(|_| json!({}));
    for key in ["err", "message", "error"] {
        match body.get(key) {
            Some(Value::String(s)) if !s.is_empty() => return s.clone(),
            Some(Value::Object(inner)) => {
                if let Some(Value::String(s)) = inner.get("message") {
                    return s.clone();
                }
            }
            _ => {}
        }
    }
    if body_text.trim().is_empty() {
        "empty response body".to_string()
    } else {
        body_text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_error_prefers_clickup_err() {
        let body = r#"{"err":"Team not authorized","ECODE":"OAUTH_027"}"#;
        assert_eq!(extract_error_message(body), "Team not authorized");
    }

    #[test]
    fn extract_error_reads_notion_message() {
        let body = r#"{"object":"error","status":400,"code":"validation_error","message":"body failed validation"}"#;
        assert_eq!(extract_error_message(body), "body failed validation");
    }

    #[test]
    fn extract_error_reads_nested_error_object() {
        let body = r#"{"error":{"message":"instance not found"}}"#;
        assert_eq!(extract_error_message(body), "instance not found");
    }

    #[test]
    fn extract_error_falls_back_to_raw_text() {
        assert_eq!(extract_error_message("Bad Gateway"), "Bad Gateway");
        assert_eq!(extract_error_message(""), "empty response body");
    }

    #[tokio::test]
    async fn send_json_maps_status_to_api_error() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/thing")
            .with_status(404)
            .with_body(r#"{"message":"Could not find page"}"#)
            .create_async()
            .await;

        let client = build_client();
        let err = send_json("Notion", client.get(format!("{}/thing", server.url())), "t")
            .await
            .unwrap_err();
        mock.assert_async().await;
        match err {
            AdapterError::Api {
                status, message, ..
            } => {
                assert_eq!(status, 404);
                assert_eq!(message, "Could not find page");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn built_client_sends_user_agent() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/ping")
            .match_header("user-agent", USER_AGENT)
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let client = build_client();
        send_json("Notion", client.get(format!("{}/ping", server.url())), "t")
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn builder_failure_falls_back_to_default_client() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/ping")
            .with_status(200)
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;

        let err = reqwest::Client::new().get("not a url").build().unwrap_err();
        let client = client_or_fallback(Err(err));
        let value = send_json("Notion", client.get(format!("{}/ping", server.url())), "t")
            .await
            .unwrap();
        assert_eq!(value["ok"], true);
    }

    #[tokio::test]
    async fn send_json_returns_null_for_empty_success() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("DELETE", "/task/1")
            .with_status(204)
            .create_async()
            .await;

        let client = build_client();
        let value = send_json(
            "ClickUp",
            client.delete(format!("{}/task/1", server.url())),
            "t",
        )
        .await
        .unwrap();
        assert!(value.is_null());
    }
}
