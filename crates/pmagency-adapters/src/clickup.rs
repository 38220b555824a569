//! ClickUp API v2 adapter.
//!
//! Task CRUD, dependencies, list lookup and a date helper for the
//! millisecond timestamps ClickUp expects.  Responses are filtered down to the
//! fields an agent needs to reason about a task.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{AdapterError, Result};
use crate::http;
use crate::params::{optional_bool, optional_str, optional_str_list, optional_u64, required_str};
use crate::traits::{Adapter, AdapterType, AuthRequirement, HealthStatus, ToolDefinition};

/// Default ClickUp API base URL.
const DEFAULT_BASE_URL: &str = "https://api.clickup.com/api/v2";

/// Public web URL prefix for task links.
const TASK_WEB_URL: &str = "https://app.clickup.com/t";

/// Parameters that travel in the query string rather than the body.
const QUERY_KEYS: &[&str] = &["custom_task_ids", "team_id"];

/// Connection settings for ClickUp.
#[derive(Debug, Clone)]
pub struct ClickUpConfig {
    /// Personal API token, sent verbatim in `Authorization`.
    pub token: String,
    /// API base URL (default: `https://api.clickup.com/api/v2`).
    pub base_url: String,
    /// List used when a list-scoped tool omits `list_id`.
    pub default_list_id: Option<String>,
}

impl ClickUpConfig {
    pub fn new(token: &str) -> Self {
        Self {
            token: token.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            default_list_id: None,
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_default_list(mut self, list_id: &str) -> Self {
        self.default_list_id = Some(list_id.to_string());
        self
    }
}

/// ClickUp task-management adapter.
pub struct ClickUpAdapter {
    id: String,
    connected: bool,
    config: ClickUpConfig,
    client: reqwest::Client,
}

impl ClickUpAdapter {
    pub fn new(id: &str, config: ClickUpConfig) -> Self {
        Self {
            id: id.to_string(),
            connected: false,
            config,
            client: http::build_client(),
        }
    }

    // -----------------------------------------------------------------------
    // HTTP helpers
    // -----------------------------------------------------------------------

    /// Build a full API URL with the given query pairs.
    fn api_url(&self, path: &str, query: &[(String, String)], tool_name: &str) -> Result<Url> {
        let mut url = Url::parse(&format!("{}{}", self.config.base_url, path)).map_err(|e| {
            AdapterError::ExecutionFailed {
                tool_name: tool_name.to_string(),
                reason: format!("invalid ClickUp URL: {e}"),
            }
        })?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("Authorization", &self.config.token)
    }

    /// Resolve `list_id` from the parameters or the configured default.
    fn resolve_list_id(&self, params: &Value, tool_name: &str) -> Result<String> {
        if let Some(id) = id_param(params, "list_id") {
            return Ok(id);
        }
        self.config.default_list_id.clone().ok_or_else(|| {
            AdapterError::invalid(
                tool_name,
                "missing `list_id` and no default ClickUp list is configured",
            )
        })
    }

    // -----------------------------------------------------------------------
    // Tool implementations
    // -----------------------------------------------------------------------

    async fn tool_create_task(&self, params: Value) -> Result<Value> {
        let tool = "clickup_create_task";
        let list_id = self.resolve_list_id(&params, tool)?;
        required_str(&params, "name", tool)?;
        let assignees = optional_str_list(&params, "assignees", tool)?;
        if assignees.is_empty() {
            return Err(AdapterError::invalid(
                tool,
                "`assignees` must list at least one user id; ask the user who is responsible",
            ));
        }

        let query = query_pairs(&params, tool)?;
        let mut body = body_fields(&params, &["list_id"]);
        body.insert(
            "assignees".into(),
            numeric_user_ids(&params["assignees"], "assignees", tool)?,
        );
        let url = self.api_url(&format!("/list/{list_id}/task"), &query, tool)?;

        let task = http::send_json("ClickUp", self.request(reqwest::Method::POST, url).json(&body), tool)
            .await?;
        info!(list_id = %list_id, task_id = ?task.get("id"), "created ClickUp task");
        Ok(filter_task_summary(&task))
    }

    async fn tool_update_task(&self, params: Value) -> Result<Value> {
        let tool = "clickup_update_task";
        let task_id = required_id(&params, "task_id", tool)?;

        if let Some(assignees) = params.get("assignees")
            && !assignees.is_null()
            && !assignees.is_object()
        {
            return Err(AdapterError::invalid(
                tool,
                "`assignees` must be an object of the form {\"add\": [...], \"rem\": [...]}",
            ));
        }

        let query = query_pairs(&params, tool)?;
        let mut body = body_fields(&params, &["task_id"]);
        if let Some(Value::Object(changes)) = body.get_mut("assignees") {
            for key in ["add", "rem"] {
                if let Some(ids) = changes.get_mut(key).filter(|v| !v.is_null()) {
                    *ids = numeric_user_ids(ids, key, tool)?;
                }
            }
        }
        if body.is_empty() {
            return Err(AdapterError::invalid(tool, "no fields to update"));
        }
        let url = self.api_url(&format!("/task/{task_id}"), &query, tool)?;

        let task = http::send_json("ClickUp", self.request(reqwest::Method::PUT, url).json(&body), tool)
            .await?;
        info!(task_id = %task_id, "updated ClickUp task");
        Ok(filter_task_summary(&task))
    }

    async fn tool_delete_task(&self, params: Value) -> Result<Value> {
        let tool = "clickup_delete_task";
        let task_id = required_id(&params, "task_id", tool)?;
        let query = query_pairs(&params, tool)?;
        let url = self.api_url(&format!("/task/{task_id}"), &query, tool)?;

        http::send_json("ClickUp", self.request(reqwest::Method::DELETE, url), tool).await?;
        info!(task_id = %task_id, "deleted ClickUp task");
        Ok(json!({ "message": "Task deleted successfully" }))
    }

    async fn tool_add_dependency(&self, params: Value) -> Result<Value> {
        let tool = "clickup_add_dependency";
        let task_id = required_id(&params, "task_id", tool)?;

        let body = match (
            id_param(&params, "depends_on"),
            id_param(&params, "dependency_of"),
        ) {
            (Some(other), None) => json!({ "depends_on": other }),
            (None, Some(other)) => json!({ "dependency_of": other }),
            _ => {
                return Err(AdapterError::invalid(
                    tool,
                    "supply exactly one of `depends_on` or `dependency_of`",
                ));
            }
        };

        let query = query_pairs(&params, tool)?;
        let url = self.api_url(&format!("/task/{task_id}/dependency"), &query, tool)?;
        http::send_json("ClickUp", self.request(reqwest::Method::POST, url).json(&body), tool)
            .await?;
        info!(task_id = %task_id, "added ClickUp dependency");
        Ok(json!({ "message": "Dependency added successfully" }))
    }

    async fn tool_get_list(&self, params: Value) -> Result<Value> {
        let tool = "clickup_get_list";
        let list_id = self.resolve_list_id(&params, tool)?;
        let url = self.api_url(&format!("/list/{list_id}"), &[], tool)?;
        let list = http::send_json("ClickUp", self.request(reqwest::Method::GET, url), tool).await?;

        Ok(json!({
            "list_id": list.get("id"),
            "list_name": list.get("name"),
            "folder_id": list.pointer("/folder/id"),
            "folder_name": list.pointer("/folder/name"),
        }))
    }

    async fn tool_get_tasks(&self, params: Value) -> Result<Value> {
        let tool = "clickup_get_tasks";
        let list_id = self.resolve_list_id(&params, tool)?;

        let mut query = Vec::new();
        for key in ["archived", "reverse", "subtasks", "include_closed"] {
            if let Some(flag) = optional_bool(&params, key, tool)? {
                query.push((key.to_string(), flag.to_string()));
            }
        }
        for key in ["page", "due_date_gt", "due_date_lt"] {
            if let Some(n) = optional_u64(&params, key, tool)? {
                query.push((key.to_string(), n.to_string()));
            }
        }
        if let Some(order_by) = optional_str(&params, "order_by") {
            query.push(("order_by".to_string(), order_by.to_string()));
        }
        for status in optional_str_list(&params, "statuses", tool)? {
            query.push(("statuses[]".to_string(), status));
        }
        for assignee in optional_str_list(&params, "assignees", tool)? {
            query.push(("assignees[]".to_string(), assignee));
        }

        debug!(list_id = %list_id, filters = query.len(), "listing ClickUp tasks");
        let url = self.api_url(&format!("/list/{list_id}/task"), &query, tool)?;
        let response = http::send_json("ClickUp", self.request(reqwest::Method::GET, url), tool).await?;

        let tasks: Vec<Value> = response
            .get("tasks")
            .and_then(Value::as_array)
            .map(|tasks| tasks.iter().map(filter_list_task).collect())
            .unwrap_or_default();
        info!(list_id = %list_id, count = tasks.len(), "retrieved ClickUp tasks");
        Ok(Value::Array(tasks))
    }

    async fn tool_get_task(&self, params: Value) -> Result<Value> {
        let tool = "clickup_get_task";
        let task_id = required_id(&params, "task_id", tool)?;
        let mut query = query_pairs(&params, tool)?;
        if let Some(flag) = optional_bool(&params, "include_subtasks", tool)? {
            query.push(("include_subtasks".to_string(), flag.to_string()));
        }

        let url = self.api_url(&format!("/task/{task_id}"), &query, tool)?;
        let task = http::send_json("ClickUp", self.request(reqwest::Method::GET, url), tool).await?;

        let assignees: Vec<Value> = task
            .get("assignees")
            .and_then(Value::as_array)
            .map(|people| {
                people
                    .iter()
                    .map(|p| json!({ "id": p.get("id"), "username": p.get("username") }))
                    .collect()
            })
            .unwrap_or_default();

        Ok(json!({
            "id": task.get("id"),
            "name": task.get("name"),
            "status": task.pointer("/status/status"),
            "due_date": task.get("due_date"),
            "date_created": task.get("date_created"),
            "url": task.get("url"),
            "assignees": assignees,
        }))
    }

    fn tool_date_to_timestamp(&self, params: Value) -> Result<Value> {
        let tool = "date_to_timestamp";
        let raw = required_str(&params, "date", tool)?;
        let timestamp_ms = date_to_timestamp(raw).ok_or_else(|| {
            AdapterError::invalid(tool, format!("`date` must be YYYY-MM-DD, got `{raw}`"))
        })?;
        Ok(json!({ "date": raw, "timestamp_ms": timestamp_ms }))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Convert `YYYY-MM-DD` to Unix milliseconds at 00:00 UTC.
pub fn date_to_timestamp(date: &str) -> Option<i64> {
    let day = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    Some(day.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis())
}

/// Read an id that may arrive as a string or a number.
fn id_param(params: &Value, key: &str) -> Option<String> {
    match params.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn required_id(params: &Value, key: &str, tool_name: &str) -> Result<String> {
    id_param(params, key)
        .ok_or_else(|| AdapterError::invalid(tool_name, format!("missing required field `{key}`")))
}

/// Extract `custom_task_ids` / `team_id` into query pairs.
fn query_pairs(params: &Value, tool_name: &str) -> Result<Vec<(String, String)>> {
    let mut pairs = Vec::new();
    if let Some(flag) = optional_bool(params, "custom_task_ids", tool_name)? {
        pairs.push(("custom_task_ids".to_string(), flag.to_string()));
    }
    if let Some(team) = id_param(params, "team_id") {
        pairs.push(("team_id".to_string(), team));
    }
    Ok(pairs)
}

/// Every non-null field except path and query parameters.
fn body_fields(params: &Value, path_keys: &[&str]) -> Map<String, Value> {
    params
        .as_object()
        .map(|fields| {
            fields
                .iter()
                .filter(|(key, value)| {
                    !value.is_null()
                        && !path_keys.contains(&key.as_str())
                        && !QUERY_KEYS.contains(&key.as_str())
                })
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect()
        })
        .unwrap_or_default()
}

/// ClickUp user ids are integers, but models often send them quoted.
fn numeric_user_ids(value: &Value, key: &str, tool_name: &str) -> Result<Value> {
    let invalid = || {
        AdapterError::invalid(tool_name, format!("`{key}` must be an array of numeric user ids"))
    };
    let Value::Array(items) = value else {
        return Err(invalid());
    };
    items
        .iter()
        .map(|id| match id {
            Value::Number(n) if n.is_u64() => Ok(id.clone()),
            Value::String(s) => s.trim().parse::<u64>().map(Value::from).map_err(|_| invalid()),
            _ => Err(invalid()),
        })
        .collect::<Result<Vec<_>>>()
        .map(Value::Array)
}

fn filter_task_summary(task: &Value) -> Value {
    json!({
        "id": task.get("id"),
        "name": task.get("name"),
        "status": task.pointer("/status/status"),
        "assignees": task.get("assignees"),
        "due_date": task.get("due_date"),
        "error": task.get("err"),
    })
}

fn filter_list_task(task: &Value) -> Value {
    let id = task.get("id").and_then(Value::as_str).unwrap_or_default();
    let assignees: Vec<Value> = task
        .get("assignees")
        .and_then(Value::as_array)
        .map(|people| people.iter().filter_map(|p| p.get("username").cloned()).collect())
        .unwrap_or_default();
    json!({
        "id": id,
        "name": task.get("name"),
        "assignees": assignees,
        "due_date": task.get("due_date"),
        "date_created": task.get("date_created"),
        "status": task.pointer("/status/status"),
        "url": format!("{TASK_WEB_URL}/{id}"),
    })
}

// ---------------------------------------------------------------------------
// Tool definitions
// ---------------------------------------------------------------------------

fn build_tool_definitions() -> Vec<ToolDefinition> {
    let id_schema = json!({ "type": ["string", "integer"] });
    vec![
        ToolDefinition {
            name: "clickup_create_task".into(),
            description: "Create a task in a ClickUp list. Use date_to_timestamp for any \
                          date field. Never invent assignees; the user must name them"
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "list_id": {
                        "type": ["string", "integer"],
                        "description": "List to create the task in (defaults to the configured list)"
                    },
                    "name": { "type": "string", "description": "Task name" },
                    "description": { "type": "string", "description": "Task description" },
                    "assignees": {
                        "type": "array",
                        "items": { "type": "integer" },
                        "description": "ClickUp user ids responsible for the task"
                    },
                    "tags": { "type": "array", "items": { "type": "string" } },
                    "status": { "type": "string" },
                    "priority": {
                        "type": "integer",
                        "description": "1 urgent, 2 high, 3 normal, 4 low"
                    },
                    "due_date": { "type": "integer", "description": "Unix milliseconds" },
                    "due_date_time": { "type": "boolean" },
                    "time_estimate": { "type": "integer", "description": "Milliseconds" },
                    "start_date": { "type": "integer", "description": "Unix milliseconds" },
                    "start_date_time": { "type": "boolean" },
                    "notify_all": { "type": "boolean" },
                    "parent": {
                        "type": "string",
                        "description": "Create as a subtask of this task id"
                    },
                    "links_to": {
                        "type": "string",
                        "description": "Task id to create a linked dependency with"
                    },
                    "custom_task_ids": { "type": "boolean" },
                    "team_id": id_schema
                },
                "required": ["name", "assignees"]
            }),
        },
        ToolDefinition {
            name: "clickup_update_task".into(),
            description: "Update fields of a ClickUp task; only supplied fields change".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "task_id": id_schema,
                    "name": { "type": "string" },
                    "description": { "type": "string" },
                    "status": { "type": "string" },
                    "priority": { "type": "integer" },
                    "due_date": { "type": "integer", "description": "Unix milliseconds" },
                    "due_date_time": { "type": "boolean" },
                    "time_estimate": { "type": "integer" },
                    "start_date": { "type": "integer" },
                    "start_date_time": { "type": "boolean" },
                    "parent": { "type": "string" },
                    "archived": { "type": "boolean" },
                    "assignees": {
                        "type": "object",
                        "properties": {
                            "add": { "type": "array", "items": { "type": "integer" } },
                            "rem": { "type": "array", "items": { "type": "integer" } }
                        },
                        "description": "User ids to add and remove"
                    },
                    "custom_task_ids": { "type": "boolean" },
                    "team_id": id_schema
                },
                "required": ["task_id"]
            }),
        },
        ToolDefinition {
            name: "clickup_delete_task".into(),
            description: "Delete a ClickUp task".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "task_id": id_schema,
                    "custom_task_ids": { "type": "boolean" },
                    "team_id": id_schema
                },
                "required": ["task_id"]
            }),
        },
        ToolDefinition {
            name: "clickup_add_dependency".into(),
            description: "Make a task wait on another (depends_on) or block another \
                          (dependency_of). Supply exactly one of the two"
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "task_id": id_schema,
                    "depends_on": {
                        "type": "string",
                        "description": "Task that must finish before task_id"
                    },
                    "dependency_of": {
                        "type": "string",
                        "description": "Task that waits on task_id"
                    },
                    "custom_task_ids": { "type": "boolean" },
                    "team_id": id_schema
                },
                "required": ["task_id"]
            }),
        },
        ToolDefinition {
            name: "clickup_get_list".into(),
            description: "Get the name and folder of a ClickUp list".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "list_id": id_schema
                },
                "required": []
            }),
        },
        ToolDefinition {
            name: "clickup_get_tasks".into(),
            description: "List tasks in a ClickUp list with optional filters".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "list_id": id_schema,
                    "archived": { "type": "boolean" },
                    "page": { "type": "integer", "description": "Page number, starting at 0" },
                    "order_by": {
                        "type": "string",
                        "enum": ["id", "created", "updated", "due_date"]
                    },
                    "reverse": { "type": "boolean" },
                    "subtasks": { "type": "boolean" },
                    "include_closed": { "type": "boolean" },
                    "statuses": { "type": "array", "items": { "type": "string" } },
                    "assignees": { "type": "array", "items": { "type": "string" } },
                    "due_date_gt": { "type": "integer", "description": "Unix milliseconds" },
                    "due_date_lt": { "type": "integer", "description": "Unix milliseconds" }
                },
                "required": []
            }),
        },
        ToolDefinition {
            name: "clickup_get_task".into(),
            description: "Get details of a ClickUp task".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "task_id": id_schema,
                    "include_subtasks": { "type": "boolean" },
                    "custom_task_ids": { "type": "boolean" },
                    "team_id": id_schema
                },
                "required": ["task_id"]
            }),
        },
        ToolDefinition {
            name: "date_to_timestamp".into(),
            description: "Convert a YYYY-MM-DD date to a Unix millisecond timestamp \
                          (midnight UTC). Always use this before setting ClickUp dates"
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "date": { "type": "string", "description": "Date in YYYY-MM-DD format" }
                },
                "required": ["date"]
            }),
        },
    ]
}

// ---------------------------------------------------------------------------
// Adapter trait implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl Adapter for ClickUpAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Productivity
    }

    async fn connect(&mut self) -> Result<()> {
        if self.config.token.is_empty() {
            return Err(AdapterError::AuthRequired {
                adapter_id: self.id.clone(),
                provider: "clickup".into(),
            });
        }
        self.connected = true;
        info!(
            id = %self.id,
            default_list = ?self.config.default_list_id,
            "ClickUp adapter connected"
        );
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.connected = false;
        info!(id = %self.id, "ClickUp adapter disconnected");
        Ok(())
    }

    async fn health_check(&self) -> Result<HealthStatus> {
        if !self.connected {
            return Ok(HealthStatus::Unhealthy);
        }
        let url = self.api_url("/user", &[], "health_check")?;
        match http::send_json("ClickUp", self.request(reqwest::Method::GET, url), "health_check").await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(AdapterError::Api { status: 401, .. }) => Ok(HealthStatus::Unhealthy),
            Err(e) => {
                warn!(error = %e, "ClickUp health check failed");
                Ok(HealthStatus::Degraded)
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
            "clickup_create_task" => self.tool_create_task(params).await,
            "clickup_update_task" => self.tool_update_task(params).await,
            "clickup_delete_task" => self.tool_delete_task(params).await,
            "clickup_add_dependency" => self.tool_add_dependency(params).await,
            "clickup_get_list" => self.tool_get_list(params).await,
            "clickup_get_tasks" => self.tool_get_tasks(params).await,
            "clickup_get_task" => self.tool_get_task(params).await,
            "date_to_timestamp" => self.tool_date_to_timestamp(params),
            _ => Err(AdapterError::ToolNotFound {
                adapter_id: self.id.clone(),
                tool_name: name.to_string(),
            }),
        }
    }

    fn required_auth(&self) -> Option<AuthRequirement> {
        Some(AuthRequirement {
            provider: "clickup".into(),
            scopes: vec!["personal_token".into()],
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
