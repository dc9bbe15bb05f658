//! CLI argument definitions for `planact`.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use planact_agent::config::DEFAULT_CONFIG_PATH;

/// Plan-and-Act -- LLM task planning with MCP browser tools.
#[derive(Parser)]
#[command(
    name = "planact",
    version,
    about = "Plan-and-Act -- LLM task planning with MCP browser tools",
    long_about = "Decomposes a goal into numbered steps with a language model, replans \
                  when execution reports a failure, and loads browser-automation tools \
                  from a Playwright MCP server."
)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one planning step and print the resulting state as JSON.
    Plan {
        /// The goal to plan for.  Optional when `--state` names a file that
        /// already carries one.
        goal: Option<String>,

        /// Load the run state from this JSON file and write the updated
        /// state back to it.
        #[arg(long, short)]
        state: Option<PathBuf>,
    },

    /// Report whether an observation would trigger a replan.
    ReplanCheck {
        /// The observation text reported by execution.
        observation: String,
    },

    /// Connect to the Playwright MCP server and list its tools.
    Tools {
        /// `http` or `stdio`.  Defaults to the configured transport.
        #[arg(long)]
        transport: Option<String>,

        /// Streamable-HTTP endpoint.  Defaults to the configured URL.
        #[arg(long)]
        url: Option<String>,

        /// Start the browser with a visible window (stdio only).
        #[arg(long)]
        headed: bool,
    },
}
