//! Tool-loading error types.
//!
//! All MCP and registry failures surface through [`ToolError`].

use std::time::Duration;

use crate::protocol::JsonRpcError;

/// Unified error type for the tools crate.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// A registry accessor was used before an init method ran.
    #[error("{0}")]
    NotInitialised(&'static str),

    /// The connection to an MCP server failed or was closed.
    #[error("transport error for MCP server `{server}`: {reason}")]
    Transport { server: String, reason: String },

    /// The server answered with a JSON-RPC error object, or with a payload
    /// that is not a valid response.
    #[error("MCP server `{server}` returned an error for `{method}`: {message}")]
    Protocol {
        server: String,
        method: String,
        message: String,
        code: Option<i32>,
    },

    /// No response arrived within the request timeout.
    #[error("MCP server `{server}` timed out after {timeout:?} waiting for `{method}`")]
    Timeout {
        server: String,
        method: String,
        timeout: Duration,
    },

    /// No server with this name is registered on the client.
    #[error("unknown MCP server `{0}`")]
    UnknownServer(String),

    /// A transport name other than `http` or `stdio`.
    #[error("unsupported transport: {0}")]
    UnsupportedTransport(String),

    /// Spawning or talking to a child process failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// An HTTP request failed below the JSON-RPC layer.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ToolError {
    pub(crate) fn protocol(server: &str, method: &str, error: JsonRpcError) -> Self {
        Self::Protocol {
            server: server.to_owned(),
            method: method.to_owned(),
            message: error.message,
            code: Some(error.code),
        }
    }

    pub(crate) fn transport(server: &str, reason: impl Into<String>) -> Self {
        Self::Transport {
            server: server.to_owned(),
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout the tools crate.
pub type Result<T> = std::result::Result<T, ToolError>;
