//! Named collection of MCP servers.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{info, warn};

use crate::client::{DEFAULT_TIMEOUT, McpClient};
use crate::error::{Result, ToolError};
use crate::protocol::{McpToolDefinition, McpToolResult};

/// A tool advertised by one of the servers of a [`MultiServerClient`].
#[derive(Clone)]
pub struct RemoteTool {
    server: String,
    definition: McpToolDefinition,
    client: Arc<McpClient>,
}

impl RemoteTool {
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn description(&self) -> &str {
        &self.definition.description
    }

    /// JSON Schema of the tool's arguments.
    pub fn input_schema(&self) -> &Value {
        &self.definition.input_schema
    }

    /// Name of the server the tool lives on.
    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn definition(&self) -> &McpToolDefinition {
        &self.definition
    }

    /// Invoke the tool on its server.
    pub async fn call(&self, arguments: Value) -> Result<McpToolResult> {
        self.client.call_tool(&self.definition.name, arguments).await
    }
}

impl std::fmt::Debug for RemoteTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteTool")
            .field("server", &self.server)
            .field("name", &self.definition.name)
            .finish()
    }
}

/// MCP servers registered by name, in registration order.
#[derive(Debug)]
pub struct MultiServerClient {
    servers: Vec<Arc<McpClient>>,
    timeout: Duration,
}

impl Default for MultiServerClient {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl MultiServerClient {
    /// An empty client whose servers use `timeout` per request.
    pub fn new(timeout: Duration) -> Self {
        Self {
            servers: Vec::new(),
            timeout,
        }
    }

    /// Register a streamable-HTTP server.  Re-using a name replaces the
    /// earlier server.
    pub fn add_http_server(&mut self, name: &str, url: &str) -> Result<()> {
        let client = McpClient::http(name, url, self.timeout)?;
        self.insert(Arc::new(client));
        Ok(())
    }

    /// Register a server started as `command args...`.
    pub fn add_stdio_server(&mut self, name: &str, command: &str, args: &[String]) {
        let client = McpClient::stdio(name, command, args.to_vec(), self.timeout);
        self.insert(Arc::new(client));
    }

    /// Register an already constructed client under its own name.
    pub fn add_client(&mut self, client: McpClient) {
        self.insert(Arc::new(client));
    }

    fn insert(&mut self, client: Arc<McpClient>) {
        if let Some(slot) = self.servers.iter_mut().find(|c| c.name() == client.name()) {
            warn!(server = %client.name(), "replacing registered MCP server");
            *slot = client;
        } else {
            self.servers.push(client);
        }
    }

    pub fn server_names(&self) -> Vec<&str> {
        self.servers.iter().map(|c| c.name()).collect()
    }

    pub fn server(&self, name: &str) -> Result<&Arc<McpClient>> {
        self.servers
            .iter()
            .find(|c| c.name() == name)
            .ok_or_else(|| ToolError::UnknownServer(name.to_owned()))
    }

    /// Tools of every registered server.  The first failing server aborts
    /// the load.
    pub async fn get_tools(&self) -> Result<Vec<RemoteTool>> {
        let mut tools = Vec::new();
        for client in &self.servers {
            tools.extend(Self::load(client).await?);
        }
        Ok(tools)
    }

    /// Tools of the server registered as `name`.
    pub async fn get_server_tools(&self, name: &str) -> Result<Vec<RemoteTool>> {
        Self::load(self.server(name)?).await
    }

    async fn load(client: &Arc<McpClient>) -> Result<Vec<RemoteTool>> {
        let definitions = client.list_tools().await?;
        info!(server = %client.name(), count = definitions.len(), "MCP tools loaded");
        Ok(definitions
            .into_iter()
            .map(|definition| RemoteTool {
                server: client.name().to_owned(),
                definition,
                client: Arc::clone(client),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_server() {
        let client = MultiServerClient::default();
        let err = client.get_server_tools("playwright").await.unwrap_err();
        assert!(matches!(err, ToolError::UnknownServer(ref name) if name == "playwright"));
    }

    #[test]
    fn same_name_replaces_server() {
        let mut client = MultiServerClient::default();
        client.add_stdio_server("browser", "npx", &["a".into()]);
        client.add_http_server("other", "http://localhost:8931/mcp").unwrap();
        client.add_stdio_server("browser", "npx", &["b".into()]);
        assert_eq!(client.server_names(), ["browser", "other"]);
    }

    #[tokio::test]
    async fn empty_client_has_no_tools() {
        assert!(MultiServerClient::default().get_tools().await.unwrap().is_empty());
    }
}
