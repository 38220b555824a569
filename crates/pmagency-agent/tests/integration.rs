//! Integration tests for the pmagency-agent crate.
//!
//! A mock chat completion server scripts the model's replies so a whole
//! agency conversation (delegation, tool use, threads, events) runs end to
//! end without a live LLM.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mockito::Matcher;
use pmagency_agent::{
    Agency, AgencyChart, AgencyDefinition, AgencyEvent, AgentProfile, LlmClient, LlmClientConfig,
    Role, ToolAdapter, ToolDefinition, load_agency,
};
use serde_json::{Value, json};

const PM: &str = "TechnicalProjectManager";
const NOTION: &str = "NotionProjectAgent";

struct FakeNotion;

#[async_trait]
impl ToolAdapter for FakeNotion {
    fn adapter_id(&self) -> &str {
        "notion"
    }

    fn tool_definitions(&self) -> Vec<ToolDefinition> {
        vec![ToolDefinition {
            name: "notion_get_tasks".into(),
            description: "List tasks".into(),
            input_schema: json!({ "type": "object", "properties": {} }),
        }]
    }

    async fn execute(&self, _tool_name: &str, _arguments: Value) -> pmagency_agent::Result<String> {
        Ok(json!([
            { "title": "Draft WBS", "status": "In Progress", "due_date": "2025-03-01" },
            { "title": "Kickoff deck", "status": "Backlog", "due_date": "2025-03-02" }
        ])
        .to_string())
    }
}

fn definition() -> AgencyDefinition {
    AgencyDefinition {
        manifesto: "# VRSEN AI".into(),
        agents: vec![
            AgentProfile::new(PM, "Leads the project.", "Delegate task work to Notion."),
            AgentProfile::new(NOTION, "Manages the Notion task board.", "Use the task tools.")
                .with_tools(["notion_get_tasks"]),
        ],
        chart: AgencyChart {
            entry_points: vec![PM.into()],
            flows: vec![(PM.into(), NOTION.into())],
        },
    }
}

fn llm(url: &str) -> Arc<LlmClient> {
    Arc::new(
        LlmClient::new(
            LlmClientConfig::openai_compatible("sk-test", "gpt-4o", url)
                .with_max_retries(0)
                .with_retry_backoff(Duration::from_millis(1)),
        )
        .unwrap(),
    )
}

fn sse_text(text: &str) -> String {
    format!(
        "data: {}\n\ndata: [DONE]\n\n",
        json!({ "choices": [{ "delta": { "content": text } }] })
    )
}

fn sse_tool_call(id: &str, name: &str, args: Value) -> String {
    format!(
        "data: {}\n\ndata: [DONE]\n\n",
        json!({ "choices": [{ "delta": { "tool_calls": [{
            "index": 0,
            "id": id,
            "type": "function",
            "function": { "name": name, "arguments": args.to_string() }
        }] } }] })
    )
}

async fn scripted(server: &mut mockito::ServerGuard, body_contains: &str, reply: String) -> mockito::Mock {
    server
        .mock("POST", "/chat/completions")
        .match_body(Matcher::Regex(regex_escape(body_contains)))
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(reply)
        .expect(1)
        .create_async()
        .await
}

fn regex_escape(s: &str) -> String {
    s.chars()
        .flat_map(|c| {
            let special = "\\.+*?()|[]{}^$".contains(c);
            special.then_some('\\').into_iter().chain(std::iter::once(c))
        })
        .collect()
}

#[tokio::test]
async fn manager_delegates_to_notion_agent() {
    let mut server = mockito::Server::new_async().await;
    let m1 = scripted(
        &mut server,
        "You are **TechnicalProjectManager**",
        sse_tool_call(
            "call_pm",
            "send_message",
            json!({ "recipient": NOTION, "message": "Which tasks are overdue?" }),
        ),
    )
    .await;
    let m2 = scripted(
        &mut server,
        "You are **NotionProjectAgent**",
        sse_tool_call("call_n", "notion_get_tasks", json!({})),
    )
    .await;
    let m3 = scripted(&mut server, "Kickoff deck", sse_text("Draft WBS and Kickoff deck are overdue.")).await;
    let m4 = scripted(
        &mut server,
        "are overdue.",
        sse_text("Two tasks are overdue: Draft WBS and Kickoff deck."),
    )
    .await;

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let agency = Agency::builder(definition(), llm(&server.url()))
        .with_tools(vec![Arc::new(FakeNotion) as Arc<dyn ToolAdapter>])
        .with_event_callback(Arc::new(move |e| {
            if !matches!(e, AgencyEvent::TextDelta { .. }) {
                sink.lock().unwrap().push(e);
            }
        }))
        .build()
        .unwrap();

    let answer = agency.get_completion("Status update please", None).await.unwrap();
    assert_eq!(answer, "Two tasks are overdue: Draft WBS and Kickoff deck.");

    for m in [m1, m2, m3, m4] {
        m.assert_async().await;
    }

    let events = events.lock().unwrap();
    let summary: Vec<String> = events
        .iter()
        .map(|e| match e {
            AgencyEvent::MessageCreated { from, to, .. } => format!("{from}->{to}"),
            AgencyEvent::ToolCall { agent, tool, .. } => format!("{agent} calls {tool}"),
            AgencyEvent::ToolOutput { agent, tool, .. } => format!("{agent} got {tool}"),
            AgencyEvent::TextDelta { .. } => unreachable!(),
        })
        .collect();
    assert_eq!(
        summary,
        vec![
            format!("user->{PM}"),
            format!("{PM}->{NOTION}"),
            format!("{NOTION} calls notion_get_tasks"),
            format!("{NOTION} got notion_get_tasks"),
            format!("{NOTION}->{PM}"),
            format!("{PM}->user"),
        ]
    );

    let pm_thread = agency.thread("user", PM).unwrap();
    assert_eq!(pm_thread.len(), 4);
    assert_eq!(pm_thread[0].role, Role::User);
    assert_eq!(pm_thread[2].content, "Draft WBS and Kickoff deck are overdue.");

    let notion_thread = agency.thread(PM, NOTION).unwrap();
    assert_eq!(notion_thread[0].content, "Which tasks are overdue?");
    assert_eq!(notion_thread.len(), 4);
}

#[tokio::test]
async fn disallowed_recipient_is_reported_to_the_model() {
    let mut server = mockito::Server::new_async().await;
    let _m1 = scripted(
        &mut server,
        "You are **TechnicalProjectManager**",
        sse_tool_call(
            "call_1",
            "send_message",
            json!({ "recipient": PM, "message": "talking to myself" }),
        ),
    )
    .await;
    let m2 = scripted(
        &mut server,
        "cannot send messages to",
        sse_text("I can only delegate to the Notion agent."),
    )
    .await;

    let agency = Agency::builder(definition(), llm(&server.url()))
        .with_tools(vec![Arc::new(FakeNotion) as Arc<dyn ToolAdapter>])
        .build()
        .unwrap();

    let answer = agency.get_completion("Ping yourself", Some(PM)).await.unwrap();
    assert_eq!(answer, "I can only delegate to the Notion agent.");
    m2.assert_async().await;
    assert!(agency.thread(PM, PM).is_none());
}

#[tokio::test]
async fn threads_persist_across_completions() {
    let mut server = mockito::Server::new_async().await;
    let first = scripted(&mut server, "What is a WBS?", sse_text("A work breakdown structure.")).await;
    let second = scripted(
        &mut server,
        "A work breakdown structure.",
        sse_text("Start from the deliverables."),
    )
    .await;

    let agency = Agency::builder(definition(), llm(&server.url()))
        .with_tools(vec![Arc::new(FakeNotion) as Arc<dyn ToolAdapter>])
        .build()
        .unwrap();

    agency.get_completion("What is a WBS?", None).await.unwrap();
    let answer = agency.get_completion("How do I build one?", None).await.unwrap();
    assert_eq!(answer, "Start from the deliverables.");

    first.assert_async().await;
    second.assert_async().await;
    assert_eq!(agency.thread("user", PM).unwrap().len(), 4);
}

#[tokio::test]
async fn failed_request_still_keeps_the_user_message() {
    let mut server = mockito::Server::new_async().await;
    let _down = server
        .mock("POST", "/chat/completions")
        .with_status(500)
        .create_async()
        .await;

    let agency = Agency::builder(definition(), llm(&server.url()))
        .with_tools(vec![Arc::new(FakeNotion) as Arc<dyn ToolAdapter>])
        .build()
        .unwrap();

    assert!(agency.get_completion("hello?", None).await.is_err());
    let thread = agency.thread("user", PM).unwrap();
    assert_eq!(thread.len(), 1);
    assert_eq!(thread[0].content, "hello?");
}

#[test]
fn shipped_agency_definition_loads() {
    let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../agency");
    let def = load_agency(&dir).unwrap();

    assert_eq!(def.chart.entry_points, vec![PM]);
    assert!(def.manifesto.contains("VRSEN"));
    for name in [PM, NOTION, "ResearchAndReportAgent"] {
        assert!(def.agent(name).is_some(), "missing {name}");
    }
    let notion = def.agent(NOTION).unwrap();
    assert!(notion.instructions.contains("1a88235ee2ff801e8f93d8ab2e14de1d"));
    assert!(notion.tools.iter().any(|t| t == "notion_status_report"));
}

#[test]
fn shipped_clickup_agency_loads() {
    let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../clickup-agency");
    let def = load_agency(&dir).unwrap();

    assert_eq!(def.chart.entry_points, vec!["ClickUpAgent"]);
    assert!(def.chart.flows.is_empty());
    let agent = def.agent("ClickUpAgent").unwrap();
    assert!(agent.instructions.contains("901307715461"));
    assert!(agent.tools.iter().any(|t| t == "date_to_timestamp"));
}
