//! Agent error types.
//!
//! All agent subsystems surface errors through [`AgentError`].  Plan parse
//! failures are deliberately absent: the planner recovers from them locally
//! with an empty plan.

/// Unified error type for the planning runtime.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    // -- LLM errors ----------------------------------------------------------
    /// An HTTP request to the LLM provider failed.
    #[error("llm request failed: {reason}")]
    LlmRequestFailed { reason: String },

    /// The LLM response could not be decoded into text.
    #[error("llm response parse error: {reason}")]
    LlmParseFailed { reason: String },

    /// The API key is missing for a provider that requires one.
    #[error("missing api key for provider: {provider}")]
    MissingApiKey { provider: String },

    /// No model was supplied and the default remote client could not be
    /// created.
    #[error("no chat model supplied and the default client is unavailable: {reason}")]
    ModelUnavailable { reason: String },

    // -- State errors --------------------------------------------------------
    /// A planning call needs a goal but the state has none.
    #[error("state has no goal to plan for")]
    MissingGoal,

    /// The goal is immutable once set.
    #[error("goal already set to `{existing}`")]
    GoalAlreadySet { existing: String },

    // -- Configuration errors ------------------------------------------------
    /// Configuration validation or loading failed.
    #[error("config error: {reason}")]
    ConfigError { reason: String },

    // -- Serialization -------------------------------------------------------
    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias used throughout the agent crate.
pub type Result<T> = std::result::Result<T, AgentError>;

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        Self::LlmRequestFailed {
            reason: err.to_string(),
        }
    }
}
