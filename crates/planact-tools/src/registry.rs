//! Tool registry and Playwright bootstrap helpers.
//!
//! [`ToolRegistry`] keeps one multi-server client and the tools it loaded.
//! It is generic over [`ToolSource`] so the client can be swapped out; the
//! default source is [`MultiServerClient`].

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info};

use crate::client::DEFAULT_TIMEOUT;
use crate::error::{Result, ToolError};
use crate::multi::{MultiServerClient, RemoteTool};

/// Server name used by the Playwright helpers.
pub const PLAYWRIGHT_SERVER_NAME: &str = "playwright";

/// Default streamable-HTTP endpoint of a locally running Playwright MCP
/// server.
pub const PLAYWRIGHT_MCP_URL: &str = "http://localhost:8931/mcp";

const PLAYWRIGHT_COMMAND: &str = "npx";
const PLAYWRIGHT_PACKAGE: &str = "@playwright/mcp@latest";

const NOT_INITIALISED: &str =
    "ToolRegistry is not initialised - call init_via_http or init_via_stdio first.";
const TOOLS_NOT_LOADED: &str = "Tools have not been loaded yet - call an init method first.";

// ---------------------------------------------------------------------------
// ToolSource
// ---------------------------------------------------------------------------

/// A client that can register MCP servers and load their tools.
#[async_trait]
pub trait ToolSource: Send + Sync + Sized {
    type Tool: Clone + Send + Sync;

    /// An empty client whose servers use `timeout` per request.
    fn with_timeout(timeout: Duration) -> Self;

    fn add_http_server(&mut self, name: &str, url: &str) -> Result<()>;

    fn add_stdio_server(&mut self, name: &str, command: &str, args: &[String]) -> Result<()>;

    /// Tools of every registered server.
    async fn get_tools(&self) -> Result<Vec<Self::Tool>>;
}

#[async_trait]
impl ToolSource for MultiServerClient {
    type Tool = RemoteTool;

    fn with_timeout(timeout: Duration) -> Self {
        MultiServerClient::new(timeout)
    }

    fn add_http_server(&mut self, name: &str, url: &str) -> Result<()> {
        MultiServerClient::add_http_server(self, name, url)
    }

    fn add_stdio_server(&mut self, name: &str, command: &str, args: &[String]) -> Result<()> {
        MultiServerClient::add_stdio_server(self, name, command, args);
        Ok(())
    }

    async fn get_tools(&self) -> Result<Vec<RemoteTool>> {
        MultiServerClient::get_tools(self).await
    }
}

// ---------------------------------------------------------------------------
// Playwright helpers
// ---------------------------------------------------------------------------

/// Arguments passed to `npx` to start the Playwright MCP server.
pub fn playwright_stdio_args(headless: bool) -> Vec<String> {
    let mut args = vec![PLAYWRIGHT_PACKAGE.to_owned()];
    if headless {
        args.push("--headless".to_owned());
    }
    args
}

/// A client with a Playwright server registered over streamable HTTP.
pub fn create_playwright_client_http<S: ToolSource>(
    url: &str,
    server_name: &str,
    timeout: Duration,
) -> Result<S> {
    let mut client = S::with_timeout(timeout);
    client.add_http_server(server_name, url)?;
    Ok(client)
}

/// A client that starts the Playwright server as a child process.
pub fn create_playwright_client_stdio<S: ToolSource>(
    server_name: &str,
    headless: bool,
    timeout: Duration,
) -> Result<S> {
    let mut client = S::with_timeout(timeout);
    client.add_stdio_server(server_name, PLAYWRIGHT_COMMAND, &playwright_stdio_args(headless))?;
    Ok(client)
}

// ---------------------------------------------------------------------------
// ToolRegistry
// ---------------------------------------------------------------------------

/// Holds the client and tools loaded by one of the init methods.
pub struct ToolRegistry<S: ToolSource = MultiServerClient> {
    server_name: String,
    timeout: Duration,
    client: Option<S>,
    tools: Option<Vec<S::Tool>>,
}

impl<S: ToolSource> Default for ToolRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ToolSource> std::fmt::Debug for ToolRegistry<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("server_name", &self.server_name)
            .field("initialised", &self.is_initialised())
            .field("tools", &self.tools.as_ref().map(Vec::len))
            .finish()
    }
}

impl<S: ToolSource> ToolRegistry<S> {
    pub fn new() -> Self {
        Self {
            server_name: PLAYWRIGHT_SERVER_NAME.to_owned(),
            timeout: DEFAULT_TIMEOUT,
            client: None,
            tools: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = name.into();
        self
    }

    /// Connect to a Playwright server over streamable HTTP and load its
    /// tools.
    pub async fn init_via_http(&mut self, url: &str) -> Result<()> {
        let client = create_playwright_client_http(url, &self.server_name, self.timeout)?;
        self.load(client).await
    }

    /// Start a Playwright server as a child process and load its tools.
    pub async fn init_via_stdio(&mut self, headless: bool) -> Result<()> {
        let client = create_playwright_client_stdio(&self.server_name, headless, self.timeout)?;
        self.load(client).await
    }

    async fn load(&mut self, client: S) -> Result<()> {
        let tools = client.get_tools().await?;
        info!(server = %self.server_name, count = tools.len(), "tool registry initialised");
        self.client = Some(client);
        self.tools = Some(tools);
        Ok(())
    }

    pub fn client(&self) -> Result<&S> {
        self.client
            .as_ref()
            .ok_or(ToolError::NotInitialised(NOT_INITIALISED))
    }

    pub fn tools(&self) -> Result<&[S::Tool]> {
        self.tools
            .as_deref()
            .ok_or(ToolError::NotInitialised(TOOLS_NOT_LOADED))
    }

    /// Whether both the client and the tools are loaded.
    pub fn is_initialised(&self) -> bool {
        self.client.is_some() && self.tools.is_some()
    }
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// How to reach the Playwright server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolTransport {
    /// Streamable HTTP at [`PLAYWRIGHT_MCP_URL`].
    Http,
    /// `npx @playwright/mcp@latest --headless` as a child process.
    #[default]
    Stdio,
}

impl ToolTransport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Stdio => "stdio",
        }
    }
}

impl std::fmt::Display for ToolTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolTransport {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" | "streamable_http" => Ok(Self::Http),
            "stdio" => Ok(Self::Stdio),
            _ => Err(ToolError::UnsupportedTransport(s.to_owned())),
        }
    }
}

/// Load the Playwright tools over `transport`.
///
/// Never fails: any connection or protocol error is logged and yields an
/// empty list.
pub async fn load_playwright_tools(transport: ToolTransport) -> Vec<RemoteTool> {
    load_tools(transport, PLAYWRIGHT_MCP_URL).await
}

async fn load_tools(transport: ToolTransport, http_url: &str) -> Vec<RemoteTool> {
    let server_name = format!("{PLAYWRIGHT_SERVER_NAME}_{transport}");
    let client: Result<MultiServerClient> = match transport {
        ToolTransport::Http => create_playwright_client_http(http_url, &server_name, DEFAULT_TIMEOUT),
        ToolTransport::Stdio => create_playwright_client_stdio(&server_name, true, DEFAULT_TIMEOUT),
    };

    let tools = match client {
        Ok(client) => client.get_server_tools(&server_name).await,
        Err(e) => Err(e),
    };

    match tools {
        Ok(tools) => tools,
        Err(e) => {
            error!(transport = %transport, error = %e, "failed to load MCP tools");
            Vec::new()
        }
    }
}
