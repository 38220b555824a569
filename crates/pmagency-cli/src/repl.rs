//! Subcommand: `pmagency run` -- interactive REPL.
//!
//! Every line is sent to the current entry-point agent; the transcript of
//! the whole agency (delegations, tool calls, streamed answers) is printed
//! as it happens.

use std::io::{self, Write as _};
use std::path::PathBuf;

use anyhow::{Result, bail};
use tracing::info;

use pmagency_agent::Agency;

use crate::helpers::init_tracing;
use crate::setup::open_agency;
use crate::transcript::Transcript;

/// Run the interactive REPL.
pub async fn cmd_run(agency_dir: PathBuf, agent: Option<String>) -> Result<()> {
    init_tracing("info");

    info!(dir = %agency_dir.display(), "starting pmagency");

    let session = open_agency(&agency_dir, Transcript::new(io::stdout()).into_callback()).await?;
    let agency = &session.agency;

    let mut current = match agent {
        Some(name) if agency.entry_points().contains(&name) => name,
        Some(name) => bail!(
            "`{name}` is not an entry point; choose one of: {}",
            agency.entry_points().join(", ")
        ),
        None => match agency.entry_points().first() {
            Some(first) => first.clone(),
            None => bail!("agency has no entry points"),
        },
    };

    println!();
    println!("  pmagency v{}", env!("CARGO_PKG_VERSION"));
    println!("  Provider: {}", session.provider);
    println!("  Model: {}", session.model);
    println!("  Agents: {}", agency.agent_names().join(", "));
    let connected: Vec<&str> = session
        .adapters
        .raw_adapters
        .iter()
        .map(|a| a.id())
        .collect();
    println!("  Adapters: {}", display_list(&connected));
    for skipped in &session.adapters.skipped {
        println!("    {} skipped ({})", skipped.id, skipped.reason);
    }
    for (agent, tool) in &session.unavailable_tools {
        println!("    {agent} runs without {tool}");
    }
    println!("  Talking to: {current}");
    println!("  Commands: /agents, /agent NAME, /tools. Type 'quit' to exit.");
    println!();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n  Interrupted. Goodbye!");
            std::process::exit(0);
        }
    });

    let stdin = io::stdin();
    let mut line_buf = String::new();

    loop {
        print!("> ");
        io::stdout().flush().ok();

        line_buf.clear();
        match stdin.read_line(&mut line_buf) {
            Ok(0) => {
                println!();
                info!("EOF received, exiting");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                eprintln!("  Error reading input: {e}");
                continue;
            }
        }

        let trimmed = line_buf.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed == "quit" || trimmed == "exit" {
            info!("user requested exit");
            break;
        }

        if let Some(command) = trimmed.strip_prefix('/') {
            handle_command(agency, command, &mut current);
            continue;
        }

        if let Err(e) = agency.get_completion(trimmed, Some(&current)).await {
            eprintln!("\n  Error: {e}");
        }
        println!();
    }

    info!("shutting down");
    Ok(())
}

fn handle_command(agency: &Agency, command: &str, current: &mut String) {
    let (name, arg) = command
        .split_once(char::is_whitespace)
        .map_or((command, ""), |(n, a)| (n, a.trim()));

    match name {
        "agents" => {
            for entry in agency.entry_points() {
                let marker = if entry == current { "*" } else { " " };
                println!("  {marker} {entry}");
            }
        }
        "agent" if arg.is_empty() => println!("  Usage: /agent NAME"),
        "agent" => {
            if agency.entry_points().iter().any(|e| e == arg) {
                *current = arg.to_owned();
                println!("  Talking to: {current}");
            } else {
                println!(
                    "  `{arg}` is not an entry point; choose one of: {}",
                    agency.entry_points().join(", ")
                );
            }
        }
        "tools" => {
            for agent in agency.agent_names() {
                let tools: Vec<String> = agency.tools_for(agent).into_iter().map(|t| t.name).collect();
                let refs: Vec<&str> = tools.iter().map(String::as_str).collect();
                println!("  {agent}: {}", display_list(&refs));
            }
        }
        other => println!("  Unknown command `/{other}`. Try /agents, /agent NAME or /tools."),
    }
}

fn display_list(items: &[&str]) -> String {
    if items.is_empty() {
        "(none)".to_owned()
    } else {
        items.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_list_handles_empty() {
        assert_eq!(display_list(&[]), "(none)");
        assert_eq!(display_list(&["notion", "whatsapp"]), "notion, whatsapp");
    }
}
