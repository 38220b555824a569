//! Notion task-database adapter.
//!
//! Talks to the Notion REST API (version `2022-06-28`) for a single task
//! database with a fixed property schema:
//!
//! | Property           | Type      |
//! |--------------------|-----------|
//! | `Task Name`        | title     |
//! | `Task Description` | rich_text |
//! | `Status`           | status    |
//! | `Priority`         | select    |
//! | `Due Date`         | date      |
//! | `Assigned to`      | people    |
//!
//! Pages are returned to the model in a simplified [`Task`] shape rather than
//! the raw, deeply nested page objects.

use std::collections::BTreeMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{Days, NaiveDate, Utc};
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use crate::error::{AdapterError, Result};
use crate::http;
use crate::params::{
    ensure_one_of, optional_str, optional_str_list, optional_text, optional_u64, parse_iso_date,
    required_str, required_text,
};
use crate::traits::{Adapter, AdapterType, AuthRequirement, HealthStatus, ToolDefinition};

/// Default Notion API base URL.
const DEFAULT_BASE_URL: &str = "https://api.notion.com/v1";

/// Value of the `Notion-Version` header sent with every request.
pub const NOTION_VERSION: &str = "2022-06-28";

/// Upper bound on pages fetched while building a status report.
const MAX_REPORT_PAGES: usize = 20;

/// Notion caps `page_size` at 100.
const MAX_PAGE_SIZE: u64 = 100;

const PROP_TITLE: &str = "Task Name";
const PROP_DESCRIPTION: &str = "Task Description";
const PROP_STATUS: &str = "Status";
const PROP_PRIORITY: &str = "Priority";
const PROP_DUE_DATE: &str = "Due Date";
const PROP_ASSIGNEES: &str = "Assigned to";

const PRIORITIES: &[&str] = &["High", "Medium", "Low"];
const SORT_PROPERTIES: &[&str] = &[PROP_DUE_DATE, PROP_STATUS, PROP_PRIORITY, PROP_TITLE];
const SORT_DIRECTIONS: &[&str] = &["ascending", "descending"];

// ---------------------------------------------------------------------------
// Domain types
// ---------------------------------------------------------------------------

/// The workflow states of the task database, in board order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    Backlog,
    InProgress,
    InReview,
    Testing,
    Completed,
}

impl TaskStatus {
    /// Every status in canonical board order.
    pub const ALL: [TaskStatus; 5] = [
        Self::Backlog,
        Self::InProgress,
        Self::InReview,
        Self::Testing,
        Self::Completed,
    ];

    /// The option name as it appears in Notion.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Backlog => "Backlog",
            Self::InProgress => "In Progress",
            Self::InReview => "In Review",
            Self::Testing => "Testing",
            Self::Completed => "Completed",
        }
    }

    fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|s| s.as_str()).collect()
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown task status `{s}`"))
    }
}

/// A task page flattened into the fields the agents care about.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub due_date: Option<String>,
    pub assignees: Vec<String>,
    pub url: Option<String>,
    pub archived: bool,
}

impl Task {
    /// Flatten a Notion page object.  Missing or mistyped properties become
    /// `None` instead of failing, since databases drift.
    pub fn from_page(page: &Value) -> Self {
        let props = page.get("properties").unwrap_or(&Value::Null);

        let title = props
            .get(PROP_TITLE)
            .and_then(|p| p.get("title"))
            .and_then(join_plain_text);
        let description = props
            .get(PROP_DESCRIPTION)
            .and_then(|p| p.get("rich_text"))
            .and_then(join_plain_text);
        let status = props
            .pointer(&format!("/{PROP_STATUS}/status/name"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let priority = props
            .pointer(&format!("/{PROP_PRIORITY}/select/name"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let due_date = props
            .pointer(&format!("/{PROP_DUE_DATE}/date/start"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let assignees = props
            .get(PROP_ASSIGNEES)
            .and_then(|p| p.get("people"))
            .and_then(Value::as_array)
            .map(|people| {
                people
                    .iter()
                    .filter_map(|person| {
                        person
                            .get("name")
                            .and_then(Value::as_str)
                            .or_else(|| person.get("id").and_then(Value::as_str))
                            .map(str::to_string)
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            id: page
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            title,
            description,
            status,
            priority,
            due_date,
            assignees,
            url: page.get("url").and_then(Value::as_str).map(str::to_string),
            archived: page
                .get("archived")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        }
    }

    /// The due date as a calendar date.  Datetime values are truncated.
    fn due(&self) -> Option<NaiveDate> {
        let raw = self.due_date.as_deref()?;
        let date_part = raw.get(..10).unwrap_or(raw);
        NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
    }

    fn is_completed(&self) -> bool {
        self.status.as_deref() == Some(TaskStatus::Completed.as_str())
    }

    fn summary(&self) -> Value {
        json!({
            "id": self.id,
            "title": self.title,
            "status": self.status,
            "priority": self.priority,
            "due_date": self.due_date,
            "assignees": self.assignees,
        })
    }
}

/// Concatenate the `plain_text` of a rich-text array; `None` when empty.
fn join_plain_text(value: &Value) -> Option<String> {
    let text: String = value
        .as_array()?
        .iter()
        .filter_map(|fragment| fragment.get("plain_text").and_then(Value::as_str))
        .collect();
    if text.is_empty() { None } else { Some(text) }
}

fn rich_text(content: &str) -> Value {
    json!([{ "type": "text", "text": { "content": content } }])
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Connection settings for a Notion task database.
#[derive(Debug, Clone)]
pub struct NotionConfig {
    /// Internal integration secret.
    pub token: String,
    /// Id of the task database.
    pub database_id: String,
    /// API base URL (default: `https://api.notion.com/v1`).
    pub base_url: String,
}

impl NotionConfig {
    pub fn new(token: &str, database_id: &str) -> Self {
        Self {
            token: token.to_string(),
            database_id: database_id.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point the adapter at a different API host (used by tests).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// Notion task-database adapter.
pub struct NotionAdapter {
    id: String,
    connected: bool,
    config: NotionConfig,
    client: reqwest::Client,
}

impl NotionAdapter {
    pub fn new(id: &str, config: NotionConfig) -> Self {
        Self {
            id: id.to_string(),
            connected: false,
            config,
            client: http::build_client(),
        }
    }

    /// The configured task database id.
    pub fn database_id(&self) -> &str {
        &self.config.database_id
    }

    // -----------------------------------------------------------------------
    // HTTP helpers
    // -----------------------------------------------------------------------

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.api_url(path))
            .header("Authorization", format!("Bearer {}", self.config.token))
            .header("Notion-Version", NOTION_VERSION)
    }

    async fn query_database(&self, body: &Value, tool_name: &str) -> Result<Value> {
        let path = format!("/databases/{}/query", self.config.database_id);
        let request = self.request(reqwest::Method::POST, &path).json(body);
        http::send_json("Notion", request, tool_name).await
    }

    // -----------------------------------------------------------------------
    // Tool implementations
    // -----------------------------------------------------------------------

    async fn tool_get_tasks(&self, params: Value) -> Result<Value> {
        let body = build_query_body(&params)?;
        debug!(body = %body, "querying Notion task database");

        let response = self.query_database(&body, "notion_get_tasks").await?;
        let tasks: Vec<Task> = response
            .get("results")
            .and_then(Value::as_array)
            .map(|pages| pages.iter().map(Task::from_page).collect())
            .unwrap_or_default();

        info!(count = tasks.len(), "retrieved Notion tasks");

        Ok(json!({
            "tasks": tasks,
            "has_more": response.get("has_more").and_then(Value::as_bool).unwrap_or(false),
            "next_cursor": response.get("next_cursor").cloned().unwrap_or(Value::Null),
        }))
    }

    async fn tool_get_task(&self, params: Value) -> Result<Value> {
        let page_id = required_str(&params, "page_id", "notion_get_task")?;
        let request = self.request(reqwest::Method::GET, &format!("/pages/{page_id}"));
        let page = http::send_json("Notion", request, "notion_get_task").await?;
        Ok(serde_json::to_value(Task::from_page(&page))?)
    }

    async fn tool_create_task(&self, params: Value) -> Result<Value> {
        let body = build_create_body(&self.config.database_id, &params)?;
        let request = self.request(reqwest::Method::POST, "/pages").json(&body);
        let page = http::send_json("Notion", request, "notion_create_task").await?;
        let task = Task::from_page(&page);
        info!(page_id = %task.id, "created Notion task");
        Ok(serde_json::to_value(task)?)
    }

    async fn tool_update_task(&self, params: Value) -> Result<Value> {
        let page_id = required_str(&params, "page_id", "notion_update_task")?;
        let properties = build_update_properties(&params)?;
        let body = json!({ "properties": properties });

        let request = self
            .request(reqwest::Method::PATCH, &format!("/pages/{page_id}"))
            .json(&body);
        let page = http::send_json("Notion", request, "notion_update_task").await?;
        info!(page_id, "updated Notion task");
        Ok(serde_json::to_value(Task::from_page(&page))?)
    }

    async fn tool_delete_task(&self, params: Value) -> Result<Value> {
        let page_id = required_str(&params, "page_id", "notion_delete_task")?;
        let request = self
            .request(reqwest::Method::PATCH, &format!("/pages/{page_id}"))
            .json(&json!({ "archived": true }));
        let page = http::send_json("Notion", request, "notion_delete_task").await?;
        info!(page_id, "archived Notion task");
        Ok(serde_json::to_value(Task::from_page(&page))?)
    }

    async fn tool_status_report(&self, params: Value) -> Result<Value> {
        let tool = "notion_status_report";
        let today = match optional_str(&params, "today") {
            Some(raw) => parse_iso_date(raw, "today", tool)?,
            None => Utc::now().date_naive(),
        };
        let within_days = optional_u64(&params, "due_within_days", tool)?.unwrap_or(7);

        let mut tasks = Vec::new();
        let mut cursor: Option<String> = None;
        let mut truncated = false;

        for page_number in 0..MAX_REPORT_PAGES {
            let mut body = json!({ "page_size": MAX_PAGE_SIZE });
            if let Some(ref c) = cursor {
                body["start_cursor"] = json!(c);
            }
            let response = self.query_database(&body, tool).await?;
            if let Some(pages) = response.get("results").and_then(Value::as_array) {
                tasks.extend(pages.iter().map(Task::from_page));
            }

            let has_more = response
                .get("has_more")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            cursor = response
                .get("next_cursor")
                .and_then(Value::as_str)
                .map(str::to_string);

            if !has_more || cursor.is_none() {
                break;
            }
            if page_number + 1 == MAX_REPORT_PAGES {
                warn!(pages = MAX_REPORT_PAGES, "status report truncated");
                truncated = true;
            }
        }

        let mut report = build_status_report(&tasks, today, within_days);
        report["truncated"] = json!(truncated);
        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// Request body builders
// ---------------------------------------------------------------------------

/// Build the body of a database query from `notion_get_tasks` parameters.
fn build_query_body(params: &Value) -> Result<Value> {
    let tool = "notion_get_tasks";
    let mut filters = Vec::new();

    if let Some(status) = optional_str(params, "status") {
        ensure_one_of(status, &TaskStatus::names(), "status", tool)?;
        filters.push(json!({ "property": PROP_STATUS, "status": { "equals": status } }));
    }
    if let Some(priority) = optional_str(params, "priority") {
        ensure_one_of(priority, PRIORITIES, "priority", tool)?;
        filters.push(json!({ "property": PROP_PRIORITY, "select": { "equals": priority } }));
    }
    if let Some(before) = optional_str(params, "due_date_before") {
        parse_iso_date(before, "due_date_before", tool)?;
        filters.push(json!({ "property": PROP_DUE_DATE, "date": { "before": before } }));
    }
    if let Some(after) = optional_str(params, "due_date_after") {
        parse_iso_date(after, "due_date_after", tool)?;
        filters.push(json!({ "property": PROP_DUE_DATE, "date": { "after": after } }));
    }

    let sort_by = optional_str(params, "sort_by").unwrap_or(PROP_DUE_DATE);
    ensure_one_of(sort_by, SORT_PROPERTIES, "sort_by", tool)?;
    let direction = optional_str(params, "sort_direction").unwrap_or("ascending");
    ensure_one_of(direction, SORT_DIRECTIONS, "sort_direction", tool)?;

    let mut body = Map::new();
    match filters.len() {
        0 => {}
        1 => {
            body.insert("filter".into(), filters.remove(0));
        }
        _ => {
            body.insert("filter".into(), json!({ "and": filters }));
        }
    }
    body.insert(
        "sorts".into(),
        json!([{ "property": sort_by, "direction": direction }]),
    );

    if let Some(cursor) = optional_str(params, "start_cursor") {
        body.insert("start_cursor".into(), json!(cursor));
    }
    if let Some(size) = optional_u64(params, "page_size", tool)? {
        if !(1..=MAX_PAGE_SIZE).contains(&size) {
            return Err(AdapterError::invalid(
                tool,
                format!("`page_size` must be between 1 and {MAX_PAGE_SIZE}"),
            ));
        }
        body.insert("page_size".into(), json!(size));
    }

    Ok(Value::Object(body))
}

/// Build the `POST /pages` body for a new task.
fn build_create_body(database_id: &str, params: &Value) -> Result<Value> {
    let tool = "notion_create_task";
    let title = required_text(params, "title", tool)?;

    let mut properties = Map::new();
    properties.insert(PROP_TITLE.into(), json!({ "title": rich_text(title) }));

    if let Some(description) = optional_text(params, "task_description") {
        properties.insert(
            PROP_DESCRIPTION.into(),
            json!({ "rich_text": rich_text(description) }),
        );
    }
    if let Some(status) = optional_str(params, "status") {
        ensure_one_of(status, &TaskStatus::names(), "status", tool)?;
        properties.insert(PROP_STATUS.into(), json!({ "status": { "name": status } }));
    }
    if let Some(priority) = optional_str(params, "priority") {
        ensure_one_of(priority, PRIORITIES, "priority", tool)?;
        properties.insert(PROP_PRIORITY.into(), json!({ "select": { "name": priority } }));
    }
    if let Some(due) = optional_str(params, "due_date") {
        parse_iso_date(due, "due_date", tool)?;
        properties.insert(PROP_DUE_DATE.into(), json!({ "date": { "start": due } }));
    }
    let assignees = optional_str_list(params, "assigned_to", tool)?;
    if !assignees.is_empty() {
        properties.insert(PROP_ASSIGNEES.into(), people(&assignees));
    }

    let mut body = json!({
        "parent": { "database_id": database_id },
        "properties": properties,
    });

    match params.get("content_blocks") {
        None | Some(Value::Null) => {}
        Some(Value::Array(blocks)) => {
            if !blocks.is_empty() {
                body["children"] = Value::Array(blocks.clone());
            }
        }
        Some(_) => {
            return Err(AdapterError::invalid(
                tool,
                "`content_blocks` must be an array of Notion block objects",
            ));
        }
    }

    Ok(body)
}

/// Collect only the properties the caller supplied for an update.
fn build_update_properties(params: &Value) -> Result<Map<String, Value>> {
    let tool = "notion_update_task";
    let mut properties = Map::new();

    if let Some(title) = optional_text(params, "title") {
        properties.insert(PROP_TITLE.into(), json!({ "title": rich_text(title) }));
    }
    if let Some(description) = optional_text(params, "task_description") {
        properties.insert(
            PROP_DESCRIPTION.into(),
            json!({ "rich_text": rich_text(description) }),
        );
    }
    if let Some(status) = optional_str(params, "status") {
        ensure_one_of(status, &TaskStatus::names(), "status", tool)?;
        properties.insert(PROP_STATUS.into(), json!({ "status": { "name": status } }));
    }
    if let Some(priority) = optional_str(params, "priority") {
        ensure_one_of(priority, PRIORITIES, "priority", tool)?;
        properties.insert(PROP_PRIORITY.into(), json!({ "select": { "name": priority } }));
    }
    if let Some(due) = optional_str(params, "due_date") {
        if due.eq_ignore_ascii_case("null") {
            properties.insert(PROP_DUE_DATE.into(), json!({ "date": null }));
        } else {
            parse_iso_date(due, "due_date", tool)?;
            properties.insert(PROP_DUE_DATE.into(), json!({ "date": { "start": due } }));
        }
    }
    if params.get("assigned_to").is_some_and(|v| !v.is_null()) {
        let assignees = optional_str_list(params, "assigned_to", tool)?;
        properties.insert(PROP_ASSIGNEES.into(), people(&assignees));
    }

    if properties.is_empty() {
        return Err(AdapterError::invalid(
            tool,
            "no properties to update; supply at least one of title, task_description, \
             status, priority, due_date, assigned_to",
        ));
    }
    Ok(properties)
}

fn people(user_ids: &[String]) -> Value {
    let people: Vec<Value> = user_ids.iter().map(|id| json!({ "id": id })).collect();
    json!({ "people": people })
}

// ---------------------------------------------------------------------------
// Status report
// ---------------------------------------------------------------------------

/// Group tasks by status and surface overdue and upcoming work.
///
/// Groups follow board order; statuses outside the known set follow
/// alphabetically, with tasks lacking a status under `"No Status"`.
fn build_status_report(tasks: &[Task], today: NaiveDate, within_days: u64) -> Value {
    let horizon = today
        .checked_add_days(Days::new(within_days))
        .unwrap_or(NaiveDate::MAX);

    let mut known: Vec<(&str, Vec<Value>)> = TaskStatus::ALL
        .iter()
        .map(|s| (s.as_str(), Vec::new()))
        .collect();
    let mut unknown: BTreeMap<String, Vec<Value>> = BTreeMap::new();
    let mut overdue = Vec::new();
    let mut due_soon = Vec::new();

    for task in tasks {
        let status = task.status.as_deref().unwrap_or("No Status");
        match known.iter_mut().find(|(name, _)| *name == status) {
            Some((_, group)) => group.push(task.summary()),
            None => unknown
                .entry(status.to_string())
                .or_default()
                .push(task.summary()),
        }

        if task.is_completed() {
            continue;
        }
        if let Some(due) = task.due() {
            if due < today {
                overdue.push(task.summary());
            } else if due <= horizon {
                due_soon.push(task.summary());
            }
        }
    }

    let by_status: Vec<Value> = known
        .into_iter()
        .map(|(name, group)| (name.to_string(), group))
        .chain(unknown)
        .map(|(name, group)| {
            json!({
                "status": name,
                "count": group.len(),
                "tasks": group,
            })
        })
        .collect();

    json!({
        "today": today.format("%Y-%m-%d").to_string(),
        "total": tasks.len(),
        "by_status": by_status,
        "overdue": overdue,
        "due_within_days": within_days,
        "due_soon": due_soon,
    })
}

// ---------------------------------------------------------------------------
// Tool definitions
// ---------------------------------------------------------------------------

fn build_tool_definitions() -> Vec<ToolDefinition> {
    let statuses = TaskStatus::names();
    vec![
        ToolDefinition {
            name: "notion_get_tasks".into(),
            description: "Query tasks in the Notion task database with optional filtering \
                          by status, priority and due date, sorted by a task property"
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "status": {
                        "type": "string",
                        "enum": statuses,
                        "description": "Only return tasks with this status"
                    },
                    "priority": {
                        "type": "string",
                        "enum": PRIORITIES,
                        "description": "Only return tasks with this priority"
                    },
                    "due_date_before": {
                        "type": "string",
                        "description": "Only tasks due before this date (YYYY-MM-DD)"
                    },
                    "due_date_after": {
                        "type": "string",
                        "description": "Only tasks due after this date (YYYY-MM-DD)"
                    },
                    "sort_by": {
                        "type": "string",
                        "enum": SORT_PROPERTIES,
                        "description": "Property to sort by (default: Due Date)"
                    },
                    "sort_direction": {
                        "type": "string",
                        "enum": SORT_DIRECTIONS,
                        "description": "Sort direction (default: ascending)"
                    },
                    "start_cursor": {
                        "type": "string",
                        "description": "Cursor from a previous response's next_cursor"
                    },
                    "page_size": {
                        "type": "integer",
                        "description": "Maximum number of tasks to return (1-100)"
                    }
                },
                "required": []
            }),
        },
        ToolDefinition {
            name: "notion_get_task".into(),
            description: "Retrieve a single task by its Notion page id".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "page_id": {
                        "type": "string",
                        "description": "Id of the task page"
                    }
                },
                "required": ["page_id"]
            }),
        },
        ToolDefinition {
            name: "notion_create_task".into(),
            description: "Create a task in the Notion task database, optionally with \
                          page content blocks (e.g. subtasks as to_do blocks)"
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "title": {
                        "type": "string",
                        "description": "Task name"
                    },
                    "task_description": {
                        "type": "string",
                        "description": "Short description of the task"
                    },
                    "status": {
                        "type": "string",
                        "enum": statuses,
                        "description": "Initial status"
                    },
                    "priority": {
                        "type": "string",
                        "enum": PRIORITIES,
                        "description": "Task priority"
                    },
                    "due_date": {
                        "type": "string",
                        "description": "Due date (YYYY-MM-DD)"
                    },
                    "assigned_to": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Notion user ids to assign"
                    },
                    "content_blocks": {
                        "type": "array",
                        "items": { "type": "object" },
                        "description": "Notion block objects to add as the page body"
                    }
                },
                "required": ["title"]
            }),
        },
        ToolDefinition {
            name: "notion_update_task".into(),
            description: "Update properties of an existing task; only supplied fields \
                          change. Pass due_date \"null\" to clear the due date"
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "page_id": {
                        "type": "string",
                        "description": "Id of the task page"
                    },
                    "title": {
                        "type": "string",
                        "description": "New task name"
                    },
                    "task_description": {
                        "type": "string",
                        "description": "New description"
                    },
                    "status": {
                        "type": "string",
                        "enum": statuses,
                        "description": "New status"
                    },
                    "priority": {
                        "type": "string",
                        "enum": PRIORITIES,
                        "description": "New priority"
                    },
                    "due_date": {
                        "type": "string",
                        "description": "New due date (YYYY-MM-DD) or \"null\" to clear"
                    },
                    "assigned_to": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Replacement list of Notion user ids"
                    }
                },
                "required": ["page_id"]
            }),
        },
        ToolDefinition {
            name: "notion_delete_task".into(),
            description: "Delete a task by archiving its Notion page".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "page_id": {
                        "type": "string",
                        "description": "Id of the task page to archive"
                    }
                },
                "required": ["page_id"]
            }),
        },
        ToolDefinition {
            name: "notion_status_report".into(),
            description: "Summarize the whole task database: tasks grouped by status, \
                          overdue tasks and tasks due soon"
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "due_within_days": {
                        "type": "integer",
                        "description": "Window for the due-soon list in days (default: 7)"
                    },
                    "today": {
                        "type": "string",
                        "description": "Reference date (YYYY-MM-DD); defaults to the current UTC date"
                    }
                },
                "required": []
            }),
        },
    ]
}

// ---------------------------------------------------------------------------
// Adapter trait implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl Adapter for NotionAdapter {
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
                provider: "notion".into(),
            });
        }
        if self.config.database_id.is_empty() {
            return Err(AdapterError::ConfigError(
                "Notion database id is not configured".into(),
            ));
        }
        self.connected = true;
        info!(id = %self.id, database_id = %self.config.database_id, "Notion adapter connected");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.connected = false;
        info!(id = %self.id, "Notion adapter disconnected");
        Ok(())
    }

    async fn health_check(&self) -> Result<HealthStatus> {
        if !self.connected {
            return Ok(HealthStatus::Unhealthy);
        }
        let path = format!("/databases/{}", self.config.database_id);
        let request = self.request(reqwest::Method::GET, &path);
        match http::send_json("Notion", request, "health_check").await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(AdapterError::Api { status, .. }) if status == 401 || status == 404 => {
                warn!(status, "Notion database is not reachable with this integration");
                Ok(HealthStatus::Unhealthy)
            }
            Err(e) => {
                warn!(error = %e, "Notion health check failed");
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
            "notion_get_tasks" => self.tool_get_tasks(params).await,
            "notion_get_task" => self.tool_get_task(params).await,
            "notion_create_task" => self.tool_create_task(params).await,
            "notion_update_task" => self.tool_update_task(params).await,
            "notion_delete_task" => self.tool_delete_task(params).await,
            "notion_status_report" => self.tool_status_report(params).await,
            _ => Err(AdapterError::ToolNotFound {
                adapter_id: self.id.clone(),
                tool_name: name.to_string(),
            }),
        }
    }

    fn required_auth(&self) -> Option<AuthRequirement> {
        Some(AuthRequirement {
            provider: "notion".into(),
            scopes: vec!["read_content".into(), "update_content".into(), "insert_content".into()],
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
