//! File and environment configuration.
//!
//! Settings are read from a TOML file (`config/planact.toml` by default) and
//! then overridden from the environment.  API keys only ever come from the
//! environment.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{AgentError, Result};
use crate::llm::client::{DEFAULT_ANTHROPIC_MODEL, LlmClientConfig, LlmProvider};

/// Default location of the configuration file, relative to the working
/// directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/planact.toml";

pub const MODEL_ENV: &str = "PLANACT_MODEL";
pub const PROVIDER_ENV: &str = "PLANACT_LLM_PROVIDER";
pub const BASE_URL_ENV: &str = "PLANACT_BASE_URL";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanActConfig {
    pub llm: LlmSettings,
    pub tools: ToolSettings,
}

/// `[llm]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// `anthropic` or `openai`.
    pub provider: String,
    pub model: String,
    /// Empty means the provider's public endpoint.
    pub base_url: String,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Anthropic.as_str().to_owned(),
            model: DEFAULT_ANTHROPIC_MODEL.to_owned(),
            base_url: String::new(),
            max_tokens: 4096,
            temperature: None,
        }
    }
}

/// `[tools]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    /// `stdio` or `http`.
    pub transport: String,
    pub url: String,
    pub server_name: String,
    pub headless: bool,
    pub timeout_secs: u64,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            transport: "stdio".to_owned(),
            url: "http://localhost:8931/mcp".to_owned(),
            server_name: "playwright".to_owned(),
            headless: true,
            timeout_secs: 30,
        }
    }
}

impl PlanActConfig {
    /// Load `path`.  A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| AgentError::ConfigError {
            reason: format!("failed to read {}: {e}", path.display()),
        })?;
        let config = Self::from_toml(&content)?;
        info!(path = %path.display(), provider = %config.llm.provider, "config loaded");
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| AgentError::ConfigError {
            reason: format!("failed to parse TOML config: {e}"),
        })
    }

    /// Apply `PLANACT_*` overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Apply overrides using `lookup` as the environment.  Empty values are
    /// ignored.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(provider) = get(PROVIDER_ENV) {
            self.llm.provider = provider;
        }
        if let Some(model) = get(MODEL_ENV) {
            self.llm.model = model;
        }
        if let Some(base_url) = get(BASE_URL_ENV) {
            self.llm.base_url = base_url;
        }
    }

    /// Build the HTTP client configuration, reading the API key from the
    /// process environment.
    pub fn llm_client_config(&self) -> Result<LlmClientConfig> {
        self.llm_client_config_with(|key| std::env::var(key).ok())
    }

    pub fn llm_client_config_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<LlmClientConfig> {
        let provider: LlmProvider = self.llm.provider.parse()?;
        let api_key = lookup(provider.api_key_env())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AgentError::MissingApiKey {
                provider: provider.to_string(),
            })?;

        if self.llm.model.trim().is_empty() {
            return Err(AgentError::ConfigError {
                reason: "llm.model must not be empty".into(),
            });
        }

        let mut config = LlmClientConfig::for_provider(provider, api_key, self.llm.model.clone());
        if !self.llm.base_url.is_empty() {
            config.base_url = self.llm.base_url.clone();
        }
        config.max_tokens = self.llm.max_tokens;
        config.temperature = self.llm.temperature;
        Ok(config)
    }
}
