//! Multi-agent agency.
//!
//! An agency is a set of role-based agents that share a company manifesto and
//! talk to each other along directed flows.  The user talks to the entry-point
//! agents; every agent with outgoing flows gets a `send_message` tool that
//! runs the recipient's ReAct loop and returns its final answer.
//!
//! ```text
//!   user ──> TechnicalProjectManager ──send_message──> NotionProjectAgent
//!                      │
//!                      └──────────send_message──> ResearchAndReportAgent
//! ```
//!
//! Every (sender, recipient) pair owns a persistent thread, so an agent
//! remembers what a given caller told it earlier.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::{AgentError, Result};
use crate::llm::LlmClient;
use crate::llm::types::{Message, ToolDefinition};
use crate::runtime::{AgentConfig, AgentContext, AgentEvent, ToolAdapter, react_loop};

/// Sender name used for messages that come from the human user.
pub const USER: &str = "user";

/// Default limit on nested `send_message` hops.
pub const DEFAULT_MAX_DEPTH: u32 = 4;

/// Name of the inter-agent messaging tool.
pub const SEND_MESSAGE_TOOL: &str = "send_message";

// ---------------------------------------------------------------------------
// Definition
// ---------------------------------------------------------------------------

/// One agent's role and capabilities.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentProfile {
    pub name: String,
    /// Short role summary; shown to agents that can message this one.
    pub description: String,
    /// Full instructions appended to the system prompt.
    pub instructions: String,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_prompt_tokens: Option<usize>,
    /// Names of registry tools this agent may call.
    pub tools: Vec<String>,
}

impl AgentProfile {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        instructions: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            instructions: instructions.into(),
            model: None,
            temperature: None,
            max_prompt_tokens: None,
            tools: Vec::new(),
        }
    }

    pub fn with_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools = tools.into_iter().map(Into::into).collect();
        self
    }
}

/// Who the user can talk to, and who can talk to whom.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgencyChart {
    pub entry_points: Vec<String>,
    /// Directed `(sender, recipient)` pairs.
    pub flows: Vec<(String, String)>,
}

impl AgencyChart {
    /// Recipients `sender` may message, in declaration order.
    pub fn recipients_of(&self, sender: &str) -> Vec<&str> {
        self.flows
            .iter()
            .filter(|(s, _)| s == sender)
            .map(|(_, r)| r.as_str())
            .collect()
    }

    pub fn allows(&self, sender: &str, recipient: &str) -> bool {
        if sender == USER {
            return self.entry_points.iter().any(|e| e == recipient);
        }
        self.flows
            .iter()
            .any(|(s, r)| s == sender && r == recipient)
    }

    /// Check the chart against the set of agent names.
    pub fn validate(&self, agent_names: &HashSet<&str>) -> Result<()> {
        if self.entry_points.is_empty() {
            return Err(config_error("the agency needs at least one entry point"));
        }
        for entry in &self.entry_points {
            if !agent_names.contains(entry.as_str()) {
                return Err(config_error(format!(
                    "entry point `{entry}` is not a defined agent"
                )));
            }
        }

        let mut seen = HashSet::new();
        for (sender, recipient) in &self.flows {
            for name in [sender, recipient] {
                if !agent_names.contains(name.as_str()) {
                    return Err(config_error(format!(
                        "flow `{sender}` -> `{recipient}` references unknown agent `{name}`"
                    )));
                }
            }
            if sender == recipient {
                return Err(config_error(format!(
                    "agent `{sender}` cannot have a flow to itself"
                )));
            }
            if !seen.insert((sender.as_str(), recipient.as_str())) {
                return Err(config_error(format!(
                    "duplicate flow `{sender}` -> `{recipient}`"
                )));
            }
        }
        Ok(())
    }
}

/// Everything needed to build an [`Agency`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgencyDefinition {
    /// Shared company context prepended to every agent's system prompt.
    pub manifesto: String,
    pub agents: Vec<AgentProfile>,
    pub chart: AgencyChart,
}

impl AgencyDefinition {
    pub fn validate(&self) -> Result<()> {
        if self.agents.is_empty() {
            return Err(config_error("the agency defines no agents"));
        }
        let mut names = HashSet::new();
        for agent in &self.agents {
            let name = agent.name.trim();
            if name.is_empty() {
                return Err(config_error("agent names must not be empty"));
            }
            if name == USER {
                return Err(config_error(format!("`{USER}` is a reserved name")));
            }
            if !names.insert(agent.name.as_str()) {
                return Err(config_error(format!(
                    "agent `{}` is defined more than once",
                    agent.name
                )));
            }
        }
        self.chart.validate(&names)
    }

    pub fn agent(&self, name: &str) -> Option<&AgentProfile> {
        self.agents.iter().find(|a| a.name == name)
    }

    /// System prompt for one agent: manifesto, role block, instructions.
    pub fn system_prompt(&self, agent: &AgentProfile) -> String {
        let mut prompt = String::new();
        let manifesto = self.manifesto.trim();
        if !manifesto.is_empty() {
            prompt.push_str(manifesto);
            prompt.push_str("\n\n");
        }
        prompt.push_str(&format!(
            "# Agent role\n\nYou are **{}**. {}\n\n",
            agent.name,
            agent.description.trim()
        ));
        prompt.push_str(agent.instructions.trim());
        prompt
    }
}

fn config_error(reason: impl Into<String>) -> AgentError {
    AgentError::ConfigError {
        reason: reason.into(),
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// What happened inside the agency, for transcript rendering.
#[derive(Debug, Clone, PartialEq)]
pub enum AgencyEvent {
    /// A message was delivered (user to agent, agent to agent, or a reply).
    MessageCreated {
        from: String,
        to: String,
        content: String,
    },
    /// Streamed text from an agent's answer.
    TextDelta { agent: String, delta: String },
    /// An agent called a tool (other than `send_message`).
    ToolCall {
        agent: String,
        tool: String,
        arguments: Value,
    },
    /// The tool's output.
    ToolOutput {
        agent: String,
        tool: String,
        output: String,
    },
}

pub type AgencyEventCallback = Arc<dyn Fn(AgencyEvent) + Send + Sync>;

// ---------------------------------------------------------------------------
// Agency
// ---------------------------------------------------------------------------

type Thread = Arc<tokio::sync::Mutex<Vec<Message>>>;

struct AgentRuntime {
    profile: AgentProfile,
    system_prompt: String,
    tools: Vec<Arc<dyn ToolAdapter>>,
}

struct AgencyInner {
    chart: AgencyChart,
    /// Declaration order, for listing.
    order: Vec<String>,
    agents: HashMap<String, AgentRuntime>,
    llm: Arc<LlmClient>,
    threads: Mutex<HashMap<(String, String), Thread>>,
    on_event: Option<AgencyEventCallback>,
    max_depth: u32,
    max_turns: u32,
}

/// Builds an [`Agency`] from a definition and a tool registry.
pub struct AgencyBuilder {
    definition: AgencyDefinition,
    llm: Arc<LlmClient>,
    registry: Vec<Arc<dyn ToolAdapter>>,
    on_event: Option<AgencyEventCallback>,
    max_depth: u32,
    max_turns: u32,
}

impl AgencyBuilder {
    /// Tools agents may be granted by name.
    pub fn with_tools(mut self, registry: Vec<Arc<dyn ToolAdapter>>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_event_callback(mut self, callback: AgencyEventCallback) -> Self {
        self.on_event = Some(callback);
        self
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }

    /// Validate the definition and resolve every agent's tools.
    pub fn build(self) -> Result<Agency> {
        self.definition.validate()?;

        let mut agents = HashMap::with_capacity(self.definition.agents.len());
        for profile in &self.definition.agents {
            let tools = resolve_tools(profile, &self.registry)?;
            tracing::debug!(
                agent = %profile.name,
                tools = ?profile.tools,
                recipients = ?self.definition.chart.recipients_of(&profile.name),
                "agent ready"
            );
            agents.insert(
                profile.name.clone(),
                AgentRuntime {
                    profile: profile.clone(),
                    system_prompt: self.definition.system_prompt(profile),
                    tools,
                },
            );
        }

        tracing::info!(
            agents = agents.len(),
            entry_points = ?self.definition.chart.entry_points,
            flows = self.definition.chart.flows.len(),
            "agency built"
        );

        Ok(Agency {
            inner: Arc::new(AgencyInner {
                order: self.definition.agents.iter().map(|a| a.name.clone()).collect(),
                chart: self.definition.chart,
                agents,
                llm: self.llm,
                threads: Mutex::new(HashMap::new()),
                on_event: self.on_event,
                max_depth: self.max_depth,
                max_turns: self.max_turns,
            }),
        })
    }
}

/// Group the agent's tool names by owning adapter and wrap each adapter so
/// only the granted tools are visible.
fn resolve_tools(
    profile: &AgentProfile,
    registry: &[Arc<dyn ToolAdapter>],
) -> Result<Vec<Arc<dyn ToolAdapter>>> {
    let mut grouped: Vec<(Arc<dyn ToolAdapter>, Vec<String>)> = Vec::new();
    for tool in &profile.tools {
        let owner = registry
            .iter()
            .find(|a| a.tool_definitions().iter().any(|d| &d.name == tool))
            .ok_or_else(|| {
                config_error(format!(
                    "agent `{}` lists unknown tool `{tool}`",
                    profile.name
                ))
            })?;
        match grouped
            .iter_mut()
            .find(|(a, _)| a.adapter_id() == owner.adapter_id())
        {
            Some((_, names)) => names.push(tool.clone()),
            None => grouped.push((owner.clone(), vec![tool.clone()])),
        }
    }

    Ok(grouped
        .into_iter()
        .map(|(inner, allowed)| Arc::new(FilteredTools { inner, allowed }) as Arc<dyn ToolAdapter>)
        .collect())
}

/// A running agency.  Cheap to clone; clones share threads.
#[derive(Clone)]
pub struct Agency {
    inner: Arc<AgencyInner>,
}

impl Agency {
    pub fn builder(definition: AgencyDefinition, llm: Arc<LlmClient>) -> AgencyBuilder {
        AgencyBuilder {
            definition,
            llm,
            registry: Vec::new(),
            on_event: None,
            max_depth: DEFAULT_MAX_DEPTH,
            max_turns: AgentConfig::default().max_turns,
        }
    }

    /// Send a user message to an entry-point agent and return its answer.
    ///
    /// `recipient` defaults to the first entry point.
    pub async fn get_completion(&self, message: &str, recipient: Option<&str>) -> Result<String> {
        let recipient = match recipient {
            Some(r) => r,
            None => self
                .inner
                .chart
                .entry_points
                .first()
                .map(String::as_str)
                .ok_or_else(|| config_error("the agency has no entry points"))?,
        };
        if !self.inner.agents.contains_key(recipient) {
            return Err(AgentError::UnknownAgent {
                name: recipient.to_owned(),
            });
        }
        if !self.inner.chart.allows(USER, recipient) {
            return Err(AgentError::FlowNotAllowed {
                sender: USER.to_owned(),
                recipient: recipient.to_owned(),
            });
        }
        run_agent(self.inner.clone(), USER, recipient, message.to_owned(), 0).await
    }

    /// Agent names in declaration order.
    pub fn agent_names(&self) -> &[String] {
        &self.inner.order
    }

    pub fn entry_points(&self) -> &[String] {
        &self.inner.chart.entry_points
    }

    pub fn profile(&self, name: &str) -> Option<&AgentProfile> {
        self.inner.agents.get(name).map(|a| &a.profile)
    }

    /// Tools the named agent sees, including `send_message` when it has
    /// outgoing flows.
    pub fn tools_for(&self, agent: &str) -> Vec<ToolDefinition> {
        let Some(runtime) = self.inner.agents.get(agent) else {
            return Vec::new();
        };
        let mut defs: Vec<ToolDefinition> = runtime
            .tools
            .iter()
            .flat_map(|t| t.tool_definitions())
            .collect();
        if let Some(tool) = SendMessageTool::for_sender(&self.inner, agent, 0) {
            defs.extend(tool.tool_definitions());
        }
        defs
    }

    /// Snapshot of the thread between two parties, if one exists.
    pub fn thread(&self, sender: &str, recipient: &str) -> Option<Vec<Message>> {
        let thread = self
            .inner
            .threads
            .lock()
            .ok()?
            .get(&(sender.to_owned(), recipient.to_owned()))
            .cloned()?;
        thread.try_lock().ok().map(|m| m.clone())
    }
}

impl std::fmt::Debug for Agency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agency")
            .field("agents", &self.inner.order)
            .field("chart", &self.inner.chart)
            .field("max_depth", &self.inner.max_depth)
            .finish()
    }
}

impl AgencyInner {
    fn emit(&self, event: AgencyEvent) {
        if let Some(cb) = &self.on_event {
            cb(event);
        }
    }

    fn thread(&self, sender: &str, recipient: &str) -> Result<Thread> {
        let mut threads = self
            .threads
            .lock()
            .map_err(|_| AgentError::Internal("thread registry lock poisoned".into()))?;
        Ok(threads
            .entry((sender.to_owned(), recipient.to_owned()))
            .or_default()
            .clone())
    }

    /// Map runtime events to agency events for one agent.
    fn agent_event_callback(&self, agent: &str) -> Option<crate::runtime::EventCallback> {
        let cb = self.on_event.clone()?;
        let agent = agent.to_owned();
        Some(Arc::new(move |event| match event {
            AgentEvent::TextDelta(delta) => cb(AgencyEvent::TextDelta {
                agent: agent.clone(),
                delta,
            }),
            AgentEvent::ToolCallStarted { name, arguments } if name != SEND_MESSAGE_TOOL => {
                cb(AgencyEvent::ToolCall {
                    agent: agent.clone(),
                    tool: name,
                    arguments,
                })
            }
            AgentEvent::ToolOutput { name, output, .. } if name != SEND_MESSAGE_TOOL => {
                cb(AgencyEvent::ToolOutput {
                    agent: agent.clone(),
                    tool: name,
                    output,
                })
            }
            _ => {}
        }))
    }
}

/// Deliver `message` from `sender` to `recipient` and run the recipient on
/// their shared thread.
async fn run_agent(
    inner: Arc<AgencyInner>,
    sender: &str,
    recipient: &str,
    message: String,
    depth: u32,
) -> Result<String> {
    if depth > inner.max_depth {
        return Err(AgentError::DelegationTooDeep {
            depth,
            max_depth: inner.max_depth,
        });
    }
    let runtime = inner
        .agents
        .get(recipient)
        .ok_or_else(|| AgentError::UnknownAgent {
            name: recipient.to_owned(),
        })?;

    let thread = inner.thread(sender, recipient)?;
    let Ok(mut history) = thread.try_lock() else {
        return Err(AgentError::ValidationError {
            reason: format!(
                "`{recipient}` is still answering an earlier message from `{sender}`"
            ),
        });
    };

    inner.emit(AgencyEvent::MessageCreated {
        from: sender.to_owned(),
        to: recipient.to_owned(),
        content: message.clone(),
    });
    tracing::info!(from = sender, to = recipient, depth, "message delivered");

    let mut tools = runtime.tools.clone();
    if let Some(send) = SendMessageTool::for_sender(&inner, recipient, depth + 1) {
        tools.push(Arc::new(send));
    }

    let profile = &runtime.profile;
    let config = AgentConfig {
        max_turns: inner.max_turns,
        model: profile.model.clone().unwrap_or_default(),
        temperature: profile.temperature,
        max_prompt_tokens: profile.max_prompt_tokens,
        ..AgentConfig::default()
    };

    let mut messages = history.clone();
    messages.push(Message::user(message));
    let mut ctx = AgentContext::new(inner.llm.clone(), tools, config)
        .with_messages(messages)
        .with_system_prompt(runtime.system_prompt.clone());
    if let Some(cb) = inner.agent_event_callback(recipient) {
        ctx = ctx.with_event_callback(cb);
    }

    let result = react_loop(&mut ctx).await;

    // Persist without the system prompt, even when the loop failed.
    ctx.messages.remove(0);
    *history = ctx.messages;
    drop(history);

    let response = result?;
    inner.emit(AgencyEvent::MessageCreated {
        from: recipient.to_owned(),
        to: sender.to_owned(),
        content: response.text.clone(),
    });
    Ok(response.text)
}

// ---------------------------------------------------------------------------
// Tools
// ---------------------------------------------------------------------------

/// Exposes a subset of another adapter's tools.
struct FilteredTools {
    inner: Arc<dyn ToolAdapter>,
    allowed: Vec<String>,
}

#[async_trait]
impl ToolAdapter for FilteredTools {
    fn adapter_id(&self) -> &str {
        self.inner.adapter_id()
    }

    fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.inner
            .tool_definitions()
            .into_iter()
            .filter(|d| self.allowed.contains(&d.name))
            .collect()
    }

    async fn execute(&self, tool_name: &str, arguments: Value) -> Result<String> {
        if !self.allowed.iter().any(|t| t == tool_name) {
            return Err(AgentError::UnknownTool {
                tool_name: tool_name.to_owned(),
            });
        }
        self.inner.execute(tool_name, arguments).await
    }
}

/// `send_message` for one sender at one delegation depth.
struct SendMessageTool {
    inner: Arc<AgencyInner>,
    sender: String,
    depth: u32,
}

impl SendMessageTool {
    /// `None` when the sender has no outgoing flows.
    fn for_sender(inner: &Arc<AgencyInner>, sender: &str, depth: u32) -> Option<Self> {
        if inner.chart.recipients_of(sender).is_empty() {
            return None;
        }
        Some(Self {
            inner: inner.clone(),
            sender: sender.to_owned(),
            depth,
        })
    }
}

#[async_trait]
impl ToolAdapter for SendMessageTool {
    fn adapter_id(&self) -> &str {
        "agency"
    }

    fn tool_definitions(&self) -> Vec<ToolDefinition> {
        let recipients = self.inner.chart.recipients_of(&self.sender);
        let mut description = String::from(
            "Send a message to another agent of your agency and wait for its reply. \
             Include all the context the recipient needs; it cannot see your conversation.\n\n\
             Available recipients:",
        );
        for name in &recipients {
            let role = self
                .inner
                .agents
                .get(*name)
                .map(|a| a.profile.description.trim())
                .unwrap_or_default();
            description.push_str(&format!("\n- {name}: {role}"));
        }

        vec![ToolDefinition {
            name: SEND_MESSAGE_TOOL.into(),
            description,
            input_schema: json!({
                "type": "object",
                "properties": {
                    "recipient": {
                        "type": "string",
                        "enum": recipients,
                        "description": "Agent to send the message to"
                    },
                    "message": {
                        "type": "string",
                        "description": "The task or question for the recipient"
                    }
                },
                "required": ["recipient", "message"]
            }),
        }]
    }

    async fn execute(&self, tool_name: &str, arguments: Value) -> Result<String> {
        if tool_name != SEND_MESSAGE_TOOL {
            return Err(AgentError::UnknownTool {
                tool_name: tool_name.to_owned(),
            });
        }
        let field = |key: &str| {
            arguments[key]
                .as_str()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| AgentError::ValidationError {
                    reason: format!("`{key}` is required"),
                })
        };
        let recipient = field("recipient")?;
        let message = field("message")?;

        if !self.inner.chart.allows(&self.sender, recipient) {
            return Err(AgentError::FlowNotAllowed {
                sender: self.sender.clone(),
                recipient: recipient.to_owned(),
            });
        }

        run_agent(
            self.inner.clone(),
            &self.sender,
            recipient,
            message.to_owned(),
            self.depth,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmClientConfig;

    fn definition() -> AgencyDefinition {
        AgencyDefinition {
            manifesto: "# VRSEN AI\n\nWe build AI agents.".into(),
            agents: vec![
                AgentProfile::new("Manager", "Coordinates the project.", "Delegate work."),
                AgentProfile::new("Notion", "Manages tasks in Notion.", "Use the task tools.")
                    .with_tools(["notion_get_tasks"]),
                AgentProfile::new("Research", "Writes reports.", "Be thorough."),
            ],
            chart: AgencyChart {
                entry_points: vec!["Manager".into()],
                flows: vec![
                    ("Manager".into(), "Notion".into()),
                    ("Manager".into(), "Research".into()),
                ],
            },
        }
    }

    struct Registry;

    #[async_trait]
    impl ToolAdapter for Registry {
        fn adapter_id(&self) -> &str {
            "notion"
        }

        fn tool_definitions(&self) -> Vec<ToolDefinition> {
            ["notion_get_tasks", "notion_delete_task"]
                .into_iter()
                .map(|name| ToolDefinition {
                    name: name.into(),
                    description: String::new(),
                    input_schema: json!({ "type": "object" }),
                })
                .collect()
        }

        async fn execute(&self, tool_name: &str, _arguments: Value) -> Result<String> {
            Ok(tool_name.to_owned())
        }
    }

    fn llm() -> Arc<LlmClient> {
        Arc::new(LlmClient::new(LlmClientConfig::openai("k", "gpt-4o")).unwrap())
    }

    #[test]
    fn valid_definition_passes() {
        definition().validate().unwrap();
    }

    #[test]
    fn validation_rejects_bad_charts() {
        let mut def = definition();
        def.chart.flows.push(("Manager".into(), "Notion".into()));
        assert!(def.validate().unwrap_err().to_string().contains("duplicate flow"));

        let mut def = definition();
        def.chart.flows.push(("Notion".into(), "Notion".into()));
        assert!(def.validate().unwrap_err().to_string().contains("itself"));

        let mut def = definition();
        def.chart.flows.push(("Notion".into(), "Ghost".into()));
        assert!(def.validate().unwrap_err().to_string().contains("Ghost"));

        let mut def = definition();
        def.chart.entry_points.clear();
        assert!(def.validate().is_err());

        let mut def = definition();
        def.agents.push(AgentProfile::new("Manager", "", ""));
        assert!(def.validate().unwrap_err().to_string().contains("more than once"));

        let mut def = definition();
        def.agents.push(AgentProfile::new(" ", "", ""));
        assert!(def.validate().is_err());
    }

    #[test]
    fn system_prompt_combines_manifesto_role_and_instructions() {
        let def = definition();
        let prompt = def.system_prompt(def.agent("Notion").unwrap());
        assert_eq!(
            prompt,
            "# VRSEN AI\n\nWe build AI agents.\n\n# Agent role\n\nYou are **Notion**. \
             Manages tasks in Notion.\n\nUse the task tools."
        );
    }

    #[test]
    fn chart_permissions() {
        let chart = definition().chart;
        assert!(chart.allows(USER, "Manager"));
        assert!(!chart.allows(USER, "Notion"));
        assert!(chart.allows("Manager", "Research"));
        assert!(!chart.allows("Research", "Manager"));
        assert_eq!(chart.recipients_of("Manager"), vec!["Notion", "Research"]);
    }

    #[test]
    fn agents_only_see_granted_tools() {
        let agency = Agency::builder(definition(), llm())
            .with_tools(vec![Arc::new(Registry) as Arc<dyn ToolAdapter>])
            .build()
            .unwrap();

        let notion: Vec<String> = agency.tools_for("Notion").into_iter().map(|t| t.name).collect();
        assert_eq!(notion, vec!["notion_get_tasks"]);

        let manager = agency.tools_for("Manager");
        assert_eq!(manager.len(), 1);
        assert_eq!(manager[0].name, SEND_MESSAGE_TOOL);
        assert_eq!(
            manager[0].input_schema["properties"]["recipient"]["enum"],
            json!(["Notion", "Research"])
        );
        assert!(manager[0].description.contains("- Research: Writes reports."));

        assert!(agency.tools_for("Research").is_empty());
    }

    #[test]
    fn unknown_tool_fails_the_build() {
        let mut def = definition();
        def.agents[2].tools = vec!["browse_web".into()];
        let err = Agency::builder(def, llm())
            .with_tools(vec![Arc::new(Registry) as Arc<dyn ToolAdapter>])
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("browse_web"));
    }

    #[tokio::test]
    async fn filtered_tools_reject_hidden_names() {
        let filtered = FilteredTools {
            inner: Arc::new(Registry),
            allowed: vec!["notion_get_tasks".into()],
        };
        assert!(filtered.execute("notion_delete_task", json!({})).await.is_err());
        assert_eq!(
            filtered.execute("notion_get_tasks", json!({})).await.unwrap(),
            "notion_get_tasks"
        );
    }

    #[tokio::test]
    async fn completion_must_target_an_entry_point() {
        let agency = Agency::builder(definition(), llm()).build().unwrap();
        let err = agency.get_completion("hi", Some("Notion")).await.unwrap_err();
        assert!(matches!(err, AgentError::FlowNotAllowed { .. }));
        let err = agency.get_completion("hi", Some("Nobody")).await.unwrap_err();
        assert!(matches!(err, AgentError::UnknownAgent { .. }));
    }

    #[tokio::test]
    async fn send_message_checks_flows_and_depth() {
        let agency = Agency::builder(definition(), llm())
            .with_max_depth(1)
            .build()
            .unwrap();

        let tool = SendMessageTool::for_sender(&agency.inner, "Manager", 1).unwrap();
        let err = tool
            .execute(SEND_MESSAGE_TOOL, json!({ "recipient": "Manager", "message": "x" }))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::FlowNotAllowed { .. }));

        let err = tool
            .execute(SEND_MESSAGE_TOOL, json!({ "recipient": "Notion" }))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("message"));

        let deep = SendMessageTool::for_sender(&agency.inner, "Manager", 2).unwrap();
        let err = deep
            .execute(SEND_MESSAGE_TOOL, json!({ "recipient": "Notion", "message": "x" }))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::DelegationTooDeep { depth: 2, max_depth: 1 }));

        assert!(SendMessageTool::for_sender(&agency.inner, "Research", 0).is_none());
    }
}
