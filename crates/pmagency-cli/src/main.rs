//! CLI entry point for the project-management agency.
//!
//! This binary provides the `pmagency` command with subcommands for chatting
//! with the agency, one-shot questions, and inspecting tools and
//! configuration.

mod adapters;
mod bridge;
mod cli;
mod commands;
mod helpers;
mod repl;
mod setup;
mod transcript;

use anyhow::Result;
use clap::Parser;

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; the environment may already be set.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { agency, agent } => repl::cmd_run(agency, agent).await,
        Commands::Ask {
            agency,
            agent,
            message,
        } => commands::cmd_ask(agency, agent, message.join(" ")).await,
        Commands::Tools => commands::cmd_tools().await,
        Commands::Check { agency } => commands::cmd_check(agency).await,
    }
}
