//! Multi-provider LLM client.
//!
//! Supports the **Anthropic Messages API** and the **OpenAI Chat Completions
//! API** (including OpenAI-compatible endpoints such as Ollama, Together, and
//! vLLM) in non-streaming mode.  [`LlmClient`] is the default remote
//! [`ChatModel`] used by the planner.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::{Value, json};

use crate::error::{AgentError, Result};
use crate::llm::model::ChatModel;
use crate::llm::types::{ChatRequest, ChatResponse, LlmResponse, Message, Role, ToolCall};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default Anthropic API base URL.
const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";

/// Default OpenAI API base URL.
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Model used when the planner has to build its own client.
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-sonnet-20241022";

/// Environment variable holding the Anthropic API key.
pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Environment variable holding the OpenAI API key.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Whole-request timeout for provider calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

// ---------------------------------------------------------------------------
// Provider enum
// ---------------------------------------------------------------------------

/// Identifies which LLM provider the client should target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    /// Anthropic Messages API.
    Anthropic,
    /// OpenAI Chat Completions API (also covers OpenAI-compatible endpoints).
    OpenAI,
}

impl LlmProvider {
    /// Lowercase provider name as used in config files and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAI => "openai",
        }
    }

    /// The environment variable the provider's API key is read from.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Self::Anthropic => ANTHROPIC_API_KEY_ENV,
            Self::OpenAI => OPENAI_API_KEY_ENV,
        }
    }

    fn default_base_url(&self) -> &'static str {
        match self {
            Self::Anthropic => ANTHROPIC_BASE_URL,
            Self::OpenAI => OPENAI_BASE_URL,
        }
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Ok(Self::Anthropic),
            "openai" => Ok(Self::OpenAI),
            other => Err(AgentError::ConfigError {
                reason: format!("unknown llm provider `{other}`"),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Client configuration
// ---------------------------------------------------------------------------

/// Configuration for connecting to a single LLM provider endpoint.
#[derive(Debug, Clone)]
pub struct LlmClientConfig {
    /// Which provider this configuration targets.
    pub provider: LlmProvider,
    /// API key for authentication.
    pub api_key: String,
    /// Base URL for the API (e.g. `https://api.anthropic.com`).
    pub base_url: String,
    /// Default model identifier.
    pub default_model: String,
    /// Default maximum tokens per response.
    pub max_tokens: u32,
    /// Sampling temperature applied to every call made through [`ChatModel`].
    pub temperature: Option<f32>,
}

impl LlmClientConfig {
    /// Create a configuration for the Anthropic Claude API.
    pub fn anthropic(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::for_provider(LlmProvider::Anthropic, api_key, model)
    }

    /// Create a configuration for the OpenAI API.
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::for_provider(LlmProvider::OpenAI, api_key, model)
    }

    /// Create a configuration for any OpenAI-compatible API (e.g. Ollama,
    /// Together, vLLM).
    pub fn openai_compatible(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::for_provider(LlmProvider::OpenAI, api_key, model)
        }
    }

    /// Create a configuration for `provider` using its public base URL.
    pub fn for_provider(
        provider: LlmProvider,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            api_key: api_key.into(),
            base_url: provider.default_base_url().to_owned(),
            default_model: model.into(),
            max_tokens: 4096,
            temperature: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// An LLM client that communicates with either the Anthropic Messages API or
/// the OpenAI Chat Completions API.
#[derive(Debug, Clone)]
pub struct LlmClient {
    config: Arc<LlmClientConfig>,
    http: reqwest::Client,
}

impl LlmClient {
    /// Create a new client with the given configuration.
    pub fn new(config: LlmClientConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(AgentError::MissingApiKey {
                provider: config.provider.as_str().into(),
            });
        }

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AgentError::LlmRequestFailed {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            config: Arc::new(config),
            http,
        })
    }

    /// Build the default remote client: Anthropic with
    /// [`DEFAULT_ANTHROPIC_MODEL`] and the key from `ANTHROPIC_API_KEY`.
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// [`LlmClient::from_env`] reading variables through `lookup`.
    pub fn from_env_with(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = lookup(ANTHROPIC_API_KEY_ENV)
            .filter(|k| !k.trim().is_empty())
            .unwrap_or_default();
        Self::new(LlmClientConfig::anthropic(api_key, DEFAULT_ANTHROPIC_MODEL))
    }

    /// The provider this client talks to.
    pub fn provider(&self) -> LlmProvider {
        self.config.provider
    }

    /// The model used when a request leaves `model` empty.
    pub fn default_model(&self) -> &str {
        &self.config.default_model
    }

    // -----------------------------------------------------------------------
    // Public API
    // -----------------------------------------------------------------------

    /// Send a chat request and return the full response.
    pub async fn chat(&self, request: &ChatRequest) -> Result<LlmResponse> {
        let (url, headers, body) = match self.config.provider {
            LlmProvider::Anthropic => (
                format!("{}/v1/messages", self.config.base_url),
                self.anthropic_headers()?,
                self.build_anthropic_request_body(request),
            ),
            LlmProvider::OpenAI => (
                format!("{}/chat/completions", self.config.base_url),
                self.openai_headers()?,
                self.build_openai_request_body(request),
            ),
        };

        tracing::debug!(
            url = %url,
            model = %body["model"],
            provider = %self.config.provider,
            messages = request.messages.len(),
            "sending LLM request"
        );

        let resp = self.http.post(&url).headers(headers).json(&body).send().await?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| AgentError::LlmRequestFailed {
                reason: format!("failed to read response body: {e}"),
            })?;

        if !status.is_success() {
            return Err(AgentError::LlmRequestFailed {
                reason: format!("API returned {status}: {text}"),
            });
        }

        let v: Value = serde_json::from_str(&text).map_err(|e| AgentError::LlmParseFailed {
            reason: format!("invalid JSON response: {e}"),
        })?;

        match self.config.provider {
            LlmProvider::Anthropic => parse_anthropic_response(&v),
            LlmProvider::OpenAI => parse_openai_response(&v),
        }
    }

    // =======================================================================
    // Anthropic
    // =======================================================================

    /// Build the JSON body for the Anthropic Messages API.
    fn build_anthropic_request_body(&self, request: &ChatRequest) -> Value {
        let (system_text, messages) = messages_to_anthropic(&request.messages);

        let mut body = json!({
            "model": self.model_for(request),
            "max_tokens": request.max_tokens.unwrap_or(self.config.max_tokens),
            "messages": messages,
        });

        if let Some(system) = system_text {
            body["system"] = json!(system);
        }

        if let Some(temp) = request.temperature {
            body["temperature"] = json!(temp);
        }

        body
    }

    /// Headers for the Anthropic Messages API.
    fn anthropic_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.config.api_key).map_err(|e| {
                AgentError::LlmRequestFailed {
                    reason: format!("invalid API key header: {e}"),
                }
            })?,
        );
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    // =======================================================================
    // OpenAI
    // =======================================================================

    /// Build the JSON body for the OpenAI Chat Completions API.
    fn build_openai_request_body(&self, request: &ChatRequest) -> Value {
        let mut body = json!({
            "model": self.model_for(request),
            "max_tokens": request.max_tokens.unwrap_or(self.config.max_tokens),
            "messages": messages_to_openai(&request.messages),
        });

        if let Some(temp) = request.temperature {
            body["temperature"] = json!(temp);
        }

        body
    }

    /// Headers for the OpenAI Chat Completions API.
    fn openai_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let auth_value = format!("Bearer {}", self.config.api_key);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_value).map_err(|e| AgentError::LlmRequestFailed {
                reason: format!("invalid authorization header: {e}"),
            })?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    fn model_for<'a>(&'a self, request: &'a ChatRequest) -> &'a str {
        if request.model.is_empty() {
            &self.config.default_model
        } else {
            &request.model
        }
    }
}

#[async_trait]
impl ChatModel for LlmClient {
    async fn invoke(&self, messages: &[Message]) -> Result<ChatResponse> {
        let request = ChatRequest {
            temperature: self.config.temperature,
            ..ChatRequest::new(messages.to_vec())
        };

        match self.chat(&request).await? {
            LlmResponse::Text(text) => Ok(ChatResponse::new(text)),
            LlmResponse::ToolCalls(calls) => Err(AgentError::LlmParseFailed {
                reason: format!(
                    "model returned {} tool call(s) where text was expected",
                    calls.len()
                ),
            }),
        }
    }
}

// ===========================================================================
// Wire format conversion
// ===========================================================================

/// Split messages into the Anthropic `system` string and the message list.
///
/// Multiple system messages are joined with newlines.
fn messages_to_anthropic(messages: &[Message]) -> (Option<String>, Vec<Value>) {
    let mut system: Option<String> = None;
    let mut wire_messages: Vec<Value> = Vec::with_capacity(messages.len());

    for msg in messages {
        match msg.role {
            Role::System => match &mut system {
                Some(existing) => {
                    existing.push('\n');
                    existing.push_str(&msg.content);
                }
                None => {
                    system = Some(msg.content.clone());
                }
            },
            Role::User => wire_messages.push(json!({
                "role": "user",
                "content": msg.content,
            })),
            Role::Assistant => wire_messages.push(json!({
                "role": "assistant",
                "content": msg.content,
            })),
        }
    }

    // The Messages API rejects an empty conversation; a replanning call
    // carries only the system prompt.
    if wire_messages.is_empty() {
        wire_messages.push(json!({
            "role": "user",
            "content": "Please respond following the system instructions.",
        }));
    }

    (system, wire_messages)
}

/// Parse a non-streaming Anthropic response.
fn parse_anthropic_response(v: &Value) -> Result<LlmResponse> {
    let content = v["content"]
        .as_array()
        .ok_or_else(|| AgentError::LlmParseFailed {
            reason: "missing `content` array in response".into(),
        })?;

    let mut text_parts: Vec<String> = Vec::new();
    let mut tool_calls: Vec<ToolCall> = Vec::new();

    for block in content {
        match block["type"].as_str() {
            Some("text") => {
                if let Some(t) = block["text"].as_str() {
                    text_parts.push(t.to_owned());
                }
            }
            Some("tool_use") => {
                tool_calls.push(ToolCall {
                    id: block["id"].as_str().unwrap_or_default().to_owned(),
                    name: block["name"].as_str().unwrap_or_default().to_owned(),
                    arguments: block["input"].clone(),
                });
            }
            _ => {}
        }
    }

    if tool_calls.is_empty() {
        Ok(LlmResponse::Text(text_parts.join("")))
    } else {
        Ok(LlmResponse::ToolCalls(tool_calls))
    }
}

/// Convert messages to the OpenAI chat format.
pub fn messages_to_openai(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|msg| {
            let role = match msg.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            json!({
                "role": role,
                "content": msg.content,
            })
        })
        .collect()
}

/// Parse a non-streaming OpenAI chat completion.
pub fn parse_openai_response(v: &Value) -> Result<LlmResponse> {
    let message = &v["choices"][0]["message"];

    if message.is_null() {
        return Err(AgentError::LlmParseFailed {
            reason: "missing `choices[0].message` in response".into(),
        });
    }

    if let Some(tool_calls_arr) = message["tool_calls"].as_array()
        && !tool_calls_arr.is_empty()
    {
        let calls = tool_calls_arr
            .iter()
            .map(|tc| {
                let func = &tc["function"];
                let name = func["name"].as_str().unwrap_or_default().to_owned();
                let args_str = func["arguments"].as_str().unwrap_or("{}");
                let arguments: Value =
                    serde_json::from_str(args_str).map_err(|e| AgentError::LlmParseFailed {
                        reason: format!("invalid JSON in OpenAI tool call `{name}` arguments: {e}"),
                    })?;

                Ok(ToolCall {
                    id: tc["id"].as_str().unwrap_or_default().to_owned(),
                    name,
                    arguments,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        return Ok(LlmResponse::ToolCalls(calls));
    }

    let content = message["content"].as_str().unwrap_or_default();
    Ok(LlmResponse::Text(content.to_owned()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
