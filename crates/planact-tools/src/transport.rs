//! Transports carrying JSON-RPC messages to an MCP server.
//!
//! - [`Transport::Http`]: streamable HTTP.  Each message is a `POST`; the
//!   reply is a JSON body or an SSE stream.
//! - [`Transport::Stdio`]: a child process speaking newline-delimited JSON on
//!   stdin/stdout, spawned on first use.
//! - [`Transport::Stream`]: the same line framing over any async byte pair.
//!
//! Every transport serialises its requests through a mutex.

use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::error::{Result, ToolError};
use crate::protocol::{JsonRpcRequest, matches_request, sse_data_events};

/// Header carrying the session id assigned by a streamable-HTTP server.
pub const SESSION_HEADER: &str = "mcp-session-id";

const EVENT_STREAM: &str = "text/event-stream";

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

pub(crate) enum Transport {
    Http(HttpTransport),
    Stdio(StdioTransport),
    Stream(StreamTransport),
}

impl Transport {
    /// Send `request` and wait for the matching response.  For
    /// notifications the result is `Value::Null`.
    pub(crate) async fn send(
        &self,
        server: &str,
        request: &JsonRpcRequest,
        timeout: Duration,
    ) -> Result<Value> {
        match self {
            Self::Http(transport) => transport.send(server, request).await,
            Self::Stdio(transport) => transport.send(server, request, timeout).await,
            Self::Stream(transport) => {
                let mut channel = transport.channel.lock().await;
                channel.exchange(server, request, timeout).await
            }
        }
    }

    /// Counts restarts of the underlying connection.  A change means the
    /// server on the other end has not seen the handshake yet.
    pub(crate) fn generation(&self) -> u64 {
        match self {
            Self::Stdio(transport) => transport.generation.load(Ordering::SeqCst),
            Self::Http(_) | Self::Stream(_) => 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Streamable HTTP
// ---------------------------------------------------------------------------

pub(crate) struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    session_id: Mutex<Option<String>>,
}

impl HttpTransport {
    pub(crate) fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            session_id: Mutex::new(None),
        })
    }

    async fn send(&self, server: &str, request: &JsonRpcRequest) -> Result<Value> {
        let mut session = self.session_id.lock().await;

        let mut builder = self
            .client
            .post(&self.endpoint)
            .header(ACCEPT, "application/json, text/event-stream")
            .json(request);
        if let Some(id) = session.as_deref() {
            builder = builder.header(SESSION_HEADER, id);
        }

        debug!(server, method = %request.method, endpoint = %self.endpoint, "sending MCP request");
        let response = builder.send().await?;
        let status = response.status();

        if let Some(id) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            && session.as_deref() != Some(id)
        {
            debug!(server, session_id = id, "MCP session established");
            *session = Some(id.to_owned());
        }

        let is_event_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with(EVENT_STREAM));
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ToolError::transport(
                server,
                format!("HTTP {status}: {}", body.trim()),
            ));
        }

        let Some(id) = request.id else {
            return Ok(Value::Null);
        };
        if status == StatusCode::ACCEPTED || body.trim().is_empty() {
            return Err(ToolError::transport(
                server,
                format!("empty response to `{}`", request.method),
            ));
        }

        if is_event_stream {
            for event in sse_data_events(&body) {
                let Ok(payload) = serde_json::from_str::<Value>(&event) else {
                    trace!(server, "skipping non-JSON SSE event");
                    continue;
                };
                if matches_request(&payload, id) {
                    return Ok(payload);
                }
            }
            Err(ToolError::transport(
                server,
                format!("event stream ended without a response to `{}`", request.method),
            ))
        } else {
            Ok(serde_json::from_str(&body)?)
        }
    }
}

// ---------------------------------------------------------------------------
// Line-delimited JSON
// ---------------------------------------------------------------------------

/// A reader/writer pair framing JSON-RPC messages one per line.
pub(crate) struct LineChannel<R, W> {
    reader: BufReader<R>,
    writer: W,
}

impl<R, W> LineChannel<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub(crate) fn new(reader: R, writer: W) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    async fn write_message(&mut self, request: &JsonRpcRequest) -> Result<()> {
        let mut line = serde_json::to_vec(request)?;
        line.push(b'\n');
        self.writer.write_all(&line).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn read_message(&mut self, server: &str) -> Result<Value> {
        let mut line = String::new();
        loop {
            line.clear();
            let read = self.reader.read_line(&mut line).await?;
            if read == 0 {
                return Err(ToolError::transport(server, "server closed its output"));
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str(trimmed) {
                Ok(value) => return Ok(value),
                Err(_) => trace!(server, line = trimmed, "skipping non-JSON output line"),
            }
        }
    }

    /// Write `request` and, unless it is a notification, read until the
    /// matching response arrives.  Server notifications and responses to
    /// other ids are skipped.
    pub(crate) async fn exchange(
        &mut self,
        server: &str,
        request: &JsonRpcRequest,
        timeout: Duration,
    ) -> Result<Value> {
        self.write_message(request).await?;
        let Some(id) = request.id else {
            return Ok(Value::Null);
        };

        let wait = async {
            loop {
                let message = self.read_message(server).await?;
                if matches_request(&message, id) {
                    return Ok::<Value, ToolError>(message);
                }
                if let Some(method) = message.get("method").and_then(Value::as_str) {
                    trace!(server, method, "ignoring server message");
                }
            }
        };

        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| ToolError::Timeout {
                server: server.to_owned(),
                method: request.method.clone(),
                timeout,
            })?
    }
}

/// Line framing over an arbitrary byte stream pair.
pub(crate) struct StreamTransport {
    channel: Mutex<LineChannel<BoxedReader, BoxedWriter>>,
}

type BoxedReader = Box<dyn AsyncRead + Unpin + Send>;
type BoxedWriter = Box<dyn AsyncWrite + Unpin + Send>;

impl StreamTransport {
    pub(crate) fn new(
        reader: impl AsyncRead + Unpin + Send + 'static,
        writer: impl AsyncWrite + Unpin + Send + 'static,
    ) -> Self {
        Self {
            channel: Mutex::new(LineChannel::new(Box::new(reader), Box::new(writer))),
        }
    }
}

// ---------------------------------------------------------------------------
// Stdio
// ---------------------------------------------------------------------------

pub(crate) struct StdioTransport {
    program: String,
    args: Vec<String>,
    state: Mutex<Option<StdioProcess>>,
    generation: AtomicU64,
}

struct StdioProcess {
    child: Child,
    channel: LineChannel<ChildStdout, ChildStdin>,
}

impl Drop for StdioProcess {
    fn drop(&mut self) {
        let _ = self.child.start_kill();
    }
}

impl StdioTransport {
    pub(crate) fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            state: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    fn spawn(&self, server: &str) -> Result<StdioProcess> {
        debug!(server, program = %self.program, args = ?self.args, "spawning MCP server");
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ToolError::transport(server, "failed to capture stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ToolError::transport(server, "failed to capture stdout"))?;

        Ok(StdioProcess {
            child,
            channel: LineChannel::new(stdout, stdin),
        })
    }

    async fn send(
        &self,
        server: &str,
        request: &JsonRpcRequest,
        timeout: Duration,
    ) -> Result<Value> {
        let mut guard = self.state.lock().await;
        if guard.is_none() {
            *guard = Some(self.spawn(server)?);
        }
        let Some(process) = guard.as_mut() else {
            return Err(ToolError::transport(server, "MCP server process missing"));
        };

        let result = process.channel.exchange(server, request, timeout).await;
        if let Err(e) = &result {
            // A broken or desynchronised child is restarted on the next call.
            debug!(server, error = %e, "dropping MCP server process");
            guard.take();
            self.generation.fetch_add(1, Ordering::SeqCst);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    #[tokio::test]
    async fn exchange_skips_notifications_and_other_ids() {
        let (client_io, server_io) = tokio::io::duplex(4096);
        let (client_read, client_write) = tokio::io::split(client_io);
        let (server_read, mut server_write) = tokio::io::split(server_io);

        let server = tokio::spawn(async move {
            let mut lines = BufReader::new(server_read).lines();
            let request: Value = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
            assert_eq!(request["method"], "ping");

            let replies = [
                json!({"jsonrpc": "2.0", "method": "notifications/message", "params": {}}).to_string(),
                "not json".to_string(),
                String::new(),
                json!({"jsonrpc": "2.0", "id": 99, "result": {}}).to_string(),
                json!({"jsonrpc": "2.0", "id": request["id"], "result": {"ok": true}}).to_string(),
            ];
            for reply in replies {
                server_write.write_all(format!("{reply}\n").as_bytes()).await.unwrap();
            }
        });

        let mut channel = LineChannel::new(client_read, client_write);
        let response = channel
            .exchange("test", &JsonRpcRequest::new(5, "ping", Value::Null), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(response["result"]["ok"], true);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn exchange_times_out() {
        let (client_io, _server_io) = tokio::io::duplex(4096);
        let (client_read, client_write) = tokio::io::split(client_io);

        let mut channel = LineChannel::new(client_read, client_write);
        let err = channel
            .exchange("slow", &JsonRpcRequest::new(1, "tools/list", json!({})), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Timeout { ref method, .. } if method == "tools/list"));
        assert_eq!(
            err.to_string(),
            "MCP server `slow` timed out after 50ms waiting for `tools/list`"
        );
    }

    #[tokio::test]
    async fn closed_output_is_transport_error() {
        let (client_io, server_io) = tokio::io::duplex(4096);
        let (client_read, client_write) = tokio::io::split(client_io);

        let server = tokio::spawn(async move {
            let mut lines = BufReader::new(server_io).lines();
            lines.next_line().await.unwrap();
        });

        let mut channel = LineChannel::new(client_read, client_write);
        let err = channel
            .exchange("gone", &JsonRpcRequest::new(1, "ping", Value::Null), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Transport { ref server, .. } if server == "gone"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn notification_does_not_wait() {
        let (client_io, server_io) = tokio::io::duplex(4096);
        let (client_read, client_write) = tokio::io::split(client_io);

        let mut channel = LineChannel::new(client_read, client_write);
        let result = channel
            .exchange(
                "test",
                &JsonRpcRequest::notification("notifications/initialized"),
                Duration::from_millis(50),
            )
            .await
            .unwrap();
        assert!(result.is_null());

        let mut lines = BufReader::new(server_io).lines();
        let line = lines.next_line().await.unwrap().unwrap();
        assert_eq!(line, r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#);
    }

    #[tokio::test]
    async fn stdio_missing_program_is_io_error() {
        let transport = StdioTransport::new("planact-no-such-program", Vec::new());
        let err = transport
            .send("missing", &JsonRpcRequest::new(1, "initialize", json!({})), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Io(_)));
        assert_eq!(transport.generation.load(Ordering::SeqCst), 0);
    }
}
