//! CLI entry point for the Plan-and-Act runtime.
//!
//! This binary provides the `planact` command with subcommands for running a
//! planning step, checking the replan heuristic, and listing MCP tools.

mod cli;
mod helpers;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use planact_agent::{Memory, PlanActConfig, planner_node};
use planact_tools::{ToolRegistry, ToolTransport};
use tracing::info;

use cli::{Cli, Commands};
use helpers::{build_model, init_tracing, load_config, read_state, write_state};

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing("info");

    match cli.command {
        Commands::Plan { goal, state } => {
            let config = load_config(&cli.config)?;
            cmd_plan(&config, goal, state).await
        }
        Commands::ReplanCheck { observation } => cmd_replan_check(&observation),
        Commands::Tools {
            transport,
            url,
            headed,
        } => {
            let config = load_config(&cli.config)?;
            cmd_tools(&config, transport, url, headed).await
        }
    }
}

// ---------------------------------------------------------------------------
// Subcommand: plan
// ---------------------------------------------------------------------------

async fn cmd_plan(
    config: &PlanActConfig,
    goal: Option<String>,
    state_path: Option<PathBuf>,
) -> Result<()> {
    let state = match &state_path {
        Some(path) => read_state(path)?,
        None => Default::default(),
    };
    let mut memory = Memory::with_state(state);
    if let Some(goal) = goal {
        memory.set_goal(goal)?;
    }
    if memory.state().goal().is_none() {
        bail!("no goal given and the state file does not carry one");
    }

    let model = build_model(config)?;
    let update = planner_node(memory.state(), Some(model)).await?;
    info!(steps = update.plan.len(), "planning step finished");
    memory.apply(update);

    let state = memory.into_state();
    println!("{}", serde_json::to_string_pretty(&state)?);

    if let Some(path) = state_path {
        write_state(&path, &state)?;
        info!(path = %path.display(), "state written");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: replan-check
// ---------------------------------------------------------------------------

fn cmd_replan_check(observation: &str) -> Result<()> {
    println!("{}", planact_agent::needs_replan(observation));
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: tools
// ---------------------------------------------------------------------------

async fn cmd_tools(
    config: &PlanActConfig,
    transport: Option<String>,
    url: Option<String>,
    headed: bool,
) -> Result<()> {
    let settings = &config.tools;
    let transport: ToolTransport = transport
        .as_deref()
        .unwrap_or(&settings.transport)
        .parse()?;

    let mut registry: ToolRegistry = ToolRegistry::new()
        .with_server_name(settings.server_name.clone())
        .with_timeout(Duration::from_secs(settings.timeout_secs));

    match transport {
        ToolTransport::Http => {
            let url = url.unwrap_or_else(|| settings.url.clone());
            registry
                .init_via_http(&url)
                .await
                .with_context(|| format!("failed to load tools from {url}"))?;
        }
        ToolTransport::Stdio => {
            let headless = settings.headless && !headed;
            registry
                .init_via_stdio(headless)
                .await
                .context("failed to start the Playwright MCP server")?;
        }
    }

    let tools = registry.tools()?;
    println!("{} tool(s) from `{}` over {transport}:", tools.len(), settings.server_name);
    for tool in tools {
        let summary = tool.description().lines().next().unwrap_or_default();
        println!("  {:<28} {summary}", tool.name());
    }
    Ok(())
}
