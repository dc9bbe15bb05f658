//! MCP client for a single server.
//!
//! The connection is initialised lazily: the first request sends
//! `initialize` followed by the `notifications/initialized` notification.
//! A restarted stdio server is initialised again before its next request.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Result, ToolError};
use crate::protocol::{
    JsonRpcRequest, JsonRpcResponse, McpToolDefinition, McpToolResult, ToolListPage,
    initialize_params,
};
use crate::transport::{HttpTransport, StdioTransport, StreamTransport, Transport};

/// Per-request timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A JSON-RPC client bound to one MCP server.
pub struct McpClient {
    name: String,
    transport: Transport,
    timeout: Duration,
    request_id: AtomicU64,
    /// Transport generation the handshake last completed on.
    initialised: Mutex<Option<u64>>,
}

impl std::fmt::Debug for McpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpClient")
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl McpClient {
    fn with_transport(name: impl Into<String>, transport: Transport, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            transport,
            timeout,
            request_id: AtomicU64::new(1),
            initialised: Mutex::new(None),
        }
    }

    /// A client for a streamable-HTTP server at `url`.
    pub fn http(name: impl Into<String>, url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let transport = Transport::Http(HttpTransport::new(url, timeout)?);
        Ok(Self::with_transport(name, transport, timeout))
    }

    /// A client for a server started as `command args...`.  The process is
    /// spawned on the first request.
    pub fn stdio(
        name: impl Into<String>,
        command: impl Into<String>,
        args: Vec<String>,
        timeout: Duration,
    ) -> Self {
        let transport = Transport::Stdio(StdioTransport::new(command, args));
        Self::with_transport(name, transport, timeout)
    }

    /// A client speaking line-delimited JSON over an existing byte stream.
    pub fn from_streams(
        name: impl Into<String>,
        reader: impl AsyncRead + Unpin + Send + 'static,
        writer: impl AsyncWrite + Unpin + Send + 'static,
        timeout: Duration,
    ) -> Self {
        let transport = Transport::Stream(StreamTransport::new(reader, writer));
        Self::with_transport(name, transport, timeout)
    }

    /// The server name this client was registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// All tools the server advertises, following pagination cursors.
    pub async fn list_tools(&self) -> Result<Vec<McpToolDefinition>> {
        self.ensure_initialised().await?;

        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = match &cursor {
                Some(cursor) => json!({ "cursor": cursor }),
                None => json!({}),
            };
            let result = self.request("tools/list", params).await?;
            let page: ToolListPage = serde_json::from_value(result)?;
            tools.extend(page.tools);

            match page.next_cursor {
                Some(next) if !next.is_empty() && cursor.as_deref() != Some(next.as_str()) => {
                    cursor = Some(next);
                }
                _ => break,
            }
        }

        debug!(server = %self.name, count = tools.len(), "MCP tools listed");
        Ok(tools)
    }

    /// Invoke tool `name` with `arguments`.
    ///
    /// A tool that reports its own failure comes back as `Ok` with
    /// `is_error` set; only protocol and transport failures are `Err`.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<McpToolResult> {
        self.ensure_initialised().await?;

        let result = self
            .request("tools/call", json!({ "name": name, "arguments": arguments }))
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    // -----------------------------------------------------------------------
    // Plumbing
    // -----------------------------------------------------------------------

    async fn ensure_initialised(&self) -> Result<()> {
        let mut initialised = self.initialised.lock().await;
        let generation = self.transport.generation();
        if *initialised == Some(generation) {
            return Ok(());
        }
        if initialised.is_some() {
            debug!(server = %self.name, generation, "MCP server restarted; repeating handshake");
        }

        let result = self.request("initialize", initialize_params()).await?;
        self.transport
            .send(
                &self.name,
                &JsonRpcRequest::notification("notifications/initialized"),
                self.timeout,
            )
            .await?;

        info!(
            server = %self.name,
            server_name = result["serverInfo"]["name"].as_str().unwrap_or("unknown"),
            protocol = result["protocolVersion"].as_str().unwrap_or("unknown"),
            "MCP connection initialised"
        );
        *initialised = Some(generation);
        Ok(())
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest::new(id, method, params);

        let payload = self.transport.send(&self.name, &request, self.timeout).await?;
        let response: JsonRpcResponse =
            serde_json::from_value(payload).map_err(|e| ToolError::Protocol {
                server: self.name.clone(),
                method: method.to_owned(),
                message: format!("malformed response: {e}"),
                code: None,
            })?;

        if let Some(error) = response.error {
            return Err(ToolError::protocol(&self.name, method, error));
        }
        Ok(response.result.unwrap_or(Value::Null))
    }
}
