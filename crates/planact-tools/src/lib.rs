//! MCP tool loading for the Plan-and-Act runtime.
//!
//! Connects to Model Context Protocol servers (Playwright by default) over
//! streamable HTTP or a stdio child process and exposes the tools they
//! advertise.  Choosing which tool to run for a plan step is left to the
//! caller.
//!
//! ## Modules
//!
//! - [`protocol`] -- JSON-RPC and MCP wire types.
//! - [`client`] -- single-server client with lazy initialisation.
//! - [`multi`] -- named multi-server client and [`RemoteTool`].
//! - [`registry`] -- [`ToolRegistry`], Playwright helpers, and the loader.
//! - [`error`] -- tool error types.

pub mod client;
pub mod error;
pub mod multi;
pub mod protocol;
pub mod registry;
mod transport;

pub use client::{DEFAULT_TIMEOUT, McpClient};
pub use error::{Result, ToolError};
pub use multi::{MultiServerClient, RemoteTool};
pub use protocol::{MCP_PROTOCOL_VERSION, McpContent, McpToolDefinition, McpToolResult};
pub use registry::{
    PLAYWRIGHT_MCP_URL, PLAYWRIGHT_SERVER_NAME, ToolRegistry, ToolSource, ToolTransport,
    create_playwright_client_http, create_playwright_client_stdio, load_playwright_tools,
    playwright_stdio_args,
};
pub use transport::SESSION_HEADER;
