//! One-shot subcommands: `ask`, `tools` and `check`.

use std::collections::BTreeSet;
use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use pmagency_adapters::HealthStatus;
use pmagency_agent::load_agency;

use crate::adapters::init_adapters;
use crate::helpers::{init_tracing, provider_label, resolve_llm_config};
use crate::setup::{open_agency, prune_unavailable_tools};
use crate::transcript::Transcript;

/// Send one message to the agency and print the transcript.
pub async fn cmd_ask(agency_dir: PathBuf, agent: Option<String>, message: String) -> Result<()> {
    init_tracing("warn");

    let session = open_agency(&agency_dir, Transcript::new(io::stdout()).into_callback()).await?;
    session
        .agency
        .get_completion(&message, agent.as_deref())
        .await
        .context("agency failed to answer")?;
    println!();
    Ok(())
}

/// List every configured tool grouped by adapter.
pub async fn cmd_tools() -> Result<()> {
    init_tracing("warn");

    let adapters = init_adapters().await;

    println!();
    for adapter in &adapters.raw_adapters {
        println!("  {} ({})", adapter.id(), adapter.adapter_type());
        for tool in adapter.tools() {
            let summary = tool.description.lines().next().unwrap_or_default();
            println!("    {:<24} {summary}", tool.name);
        }
        println!();
    }
    for skipped in &adapters.skipped {
        println!("  {} (not configured: {})", skipped.id, skipped.reason);
    }
    println!();
    Ok(())
}

/// Validate the agency definition and report LLM and adapter configuration.
pub async fn cmd_check(agency_dir: PathBuf) -> Result<()> {
    init_tracing("warn");

    println!();
    println!("  Agency: {}", agency_dir.display());
    let mut definition = match load_agency(&agency_dir) {
        Ok(def) => def,
        Err(e) => {
            println!("    invalid: {e}");
            println!();
            bail!("agency definition in {} is invalid", agency_dir.display());
        }
    };
    println!(
        "    {} agents, entry points: {}",
        definition.agents.len(),
        definition.chart.entry_points.join(", ")
    );
    for (sender, recipient) in &definition.chart.flows {
        println!("    {sender} -> {recipient}");
    }

    println!();
    match resolve_llm_config() {
        Ok(resolved) => println!(
            "  LLM: {} ({})",
            provider_label(&resolved.config),
            resolved
                .pinned_model
                .as_deref()
                .unwrap_or(&resolved.config.default_model)
        ),
        Err(e) => println!("  LLM: not configured ({e})"),
    }

    println!();
    println!("  Adapters:");
    let adapters = init_adapters().await;
    for adapter in &adapters.raw_adapters {
        let status = adapter
            .health_check()
            .await
            .unwrap_or(HealthStatus::Unhealthy);
        println!("    {:<10} {status}", adapter.id());
    }
    for skipped in &adapters.skipped {
        println!("    {:<10} skipped ({})", skipped.id, skipped.reason);
    }

    let available: BTreeSet<String> = adapters.tool_names();
    let missing = prune_unavailable_tools(&mut definition, &available);
    if !missing.is_empty() {
        println!();
        println!("  Unavailable tools:");
        for (agent, tool) in &missing {
            println!("    {agent}: {tool}");
        }
    }
    println!();
    Ok(())
}
