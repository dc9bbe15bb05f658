//! Shared helper functions used across CLI subcommands.
//!
//! Includes tracing initialization, configuration loading, chat-model
//! construction, and run-state file handling.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use planact_agent::{ChatModel, LlmClient, PlanActConfig, State};
use tracing::info;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Initialize the tracing subscriber with the given default log level.
///
/// Logs go to stderr; stdout carries command output only.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Load `path` and apply environment overrides.
pub fn load_config(path: &Path) -> Result<PlanActConfig> {
    let mut config = PlanActConfig::load(path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    config.apply_env();
    Ok(config)
}

/// Build the chat model described by `config`.
pub fn build_model(config: &PlanActConfig) -> Result<Arc<dyn ChatModel>> {
    let client_config = config
        .llm_client_config()
        .context("no usable LLM configuration (is the API key exported?)")?;
    let client = LlmClient::new(client_config)?;
    info!(provider = %client.provider(), model = client.default_model(), "chat model ready");
    Ok(Arc::new(client))
}

// ---------------------------------------------------------------------------
// Run state
// ---------------------------------------------------------------------------

/// Read a run state from `path`.  A missing file yields an empty state.
pub fn read_state(path: &Path) -> Result<State> {
    if !path.exists() {
        return Ok(State::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read state file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("invalid state file {}", path.display()))
}

/// Write `state` to `path` as pretty JSON.
pub fn write_state(path: &Path, state: &State) -> Result<()> {
    let json = serde_json::to_string_pretty(state)?;
    std::fs::write(path, json + "\n")
        .with_context(|| format!("failed to write state file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use planact_agent::{Memory, PlanStep};

    #[test]
    fn state_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");

        let mut memory = Memory::with_state(State::new("Book a flight"));
        memory.state_mut().plan = Some(vec![PlanStep::new(1, "r", "Search flights")]);
        memory.add_history("Search flights", "見つかりません");

        write_state(&path, memory.state()).unwrap();
        let loaded = read_state(&path).unwrap();
        assert_eq!(&loaded, memory.state());
    }

    #[test]
    fn missing_state_file_is_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let state = read_state(&dir.path().join("absent.json")).unwrap();
        assert_eq!(state, State::default());
    }

    #[test]
    fn corrupt_state_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = read_state(&path).unwrap_err();
        assert!(err.to_string().contains("invalid state file"));
    }
}
