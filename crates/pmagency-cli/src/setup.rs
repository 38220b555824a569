//! Wiring an [`Agency`] from an agency directory and the environment.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use pmagency_agent::{Agency, AgencyDefinition, AgencyEventCallback, LlmClient, load_agency};
use tracing::{info, warn};

use crate::adapters::{InitializedAdapters, init_adapters};
use crate::helpers::{provider_label, resolve_llm_config};

/// A ready-to-use agency plus what the banner needs to report.
pub struct AgencySession {
    pub agency: Agency,
    pub provider: &'static str,
    pub model: String,
    pub adapters: InitializedAdapters,
    /// `(agent, tool)` pairs dropped because no adapter provides the tool.
    pub unavailable_tools: Vec<(String, String)>,
}

/// Load the agency in `dir`, connect adapters and build the agency.
pub async fn open_agency(dir: &Path, on_event: AgencyEventCallback) -> Result<AgencySession> {
    let mut definition = load_agency(dir)
        .with_context(|| format!("failed to load agency from {}", dir.display()))?;

    let resolved = resolve_llm_config()?;
    let provider = provider_label(&resolved.config);
    let model = resolved
        .pinned_model
        .clone()
        .unwrap_or_else(|| resolved.config.default_model.clone());
    let llm = Arc::new(LlmClient::new(resolved.config).context("failed to create LLM client")?);
    info!(model = %model, provider, "LLM client ready");

    if let Some(pinned) = &resolved.pinned_model {
        pin_model(&mut definition, pinned);
    }

    let adapters = init_adapters().await;
    let unavailable_tools = prune_unavailable_tools(&mut definition, &adapters.tool_names());
    for (agent, tool) in &unavailable_tools {
        warn!(agent = %agent, tool = %tool, "tool unavailable, agent will run without it");
    }

    let agency = Agency::builder(definition, llm)
        .with_tools(adapters.tool_adapters.clone())
        .with_event_callback(on_event)
        .build()
        .context("failed to build agency")?;

    Ok(AgencySession {
        agency,
        provider,
        model,
        adapters,
        unavailable_tools,
    })
}

/// Drop tools no connected adapter provides, returning `(agent, tool)` for each.
pub fn prune_unavailable_tools(
    definition: &mut AgencyDefinition,
    available: &BTreeSet<String>,
) -> Vec<(String, String)> {
    let mut missing = Vec::new();
    for agent in &mut definition.agents {
        let name = agent.name.clone();
        agent.tools.retain(|tool| {
            let keep = available.contains(tool);
            if !keep {
                missing.push((name.clone(), tool.clone()));
            }
            keep
        });
    }
    missing
}

/// Make every agent use `model`.
pub fn pin_model(definition: &mut AgencyDefinition, model: &str) {
    for agent in &mut definition.agents {
        agent.model = Some(model.to_owned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pmagency_agent::{AgencyChart, AgentProfile};

    fn definition() -> AgencyDefinition {
        AgencyDefinition {
            manifesto: "m".into(),
            agents: vec![
                AgentProfile::new("Pm", "lead", "i").with_tools(["whatsapp_send_text"]),
                AgentProfile::new("Notion", "board", "i")
                    .with_tools(["notion_get_tasks", "notion_status_report"]),
            ],
            chart: AgencyChart {
                entry_points: vec!["Pm".into()],
                flows: vec![("Pm".into(), "Notion".into())],
            },
        }
    }

    #[test]
    fn prunes_tools_without_an_adapter() {
        let mut def = definition();
        let available: BTreeSet<String> =
            ["notion_get_tasks", "notion_status_report"].map(String::from).into();
        let missing = prune_unavailable_tools(&mut def, &available);
        assert_eq!(missing, vec![("Pm".to_owned(), "whatsapp_send_text".to_owned())]);
        assert!(def.agent("Pm").unwrap().tools.is_empty());
        assert_eq!(def.agent("Notion").unwrap().tools.len(), 2);
    }

    #[test]
    fn pinning_overrides_every_agent() {
        let mut def = definition();
        def.agents[0].model = Some("gpt-4o".into());
        pin_model(&mut def, "pm-deployment");
        assert!(def.agents.iter().all(|a| a.model.as_deref() == Some("pm-deployment")));
    }
}
