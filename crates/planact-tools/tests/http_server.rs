//! Streamable-HTTP client against a local fake MCP server.
//!
//! The fake answers `initialize` with a session id, acknowledges
//! notifications with `202 Accepted`, streams `tools/list` as SSE and
//! answers `tools/call` with plain JSON.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};

use planact_tools::{McpClient, MultiServerClient, ToolError, ToolRegistry};

const SESSION: &str = "session-42";

#[derive(Clone, Default)]
struct Fake {
    /// `(method, session header)` of every message received.
    seen: Arc<Mutex<Vec<(String, Option<String>)>>>,
}

impl Fake {
    fn seen(&self) -> Vec<(String, Option<String>)> {
        self.seen.lock().unwrap().clone()
    }
}

async fn mcp(State(fake): State<Fake>, headers: HeaderMap, Json(req): Json<Value>) -> Response {
    let method = req["method"].as_str().unwrap_or_default().to_owned();
    let session = headers
        .get("mcp-session-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    fake.seen.lock().unwrap().push((method.clone(), session));

    let accept = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !accept.contains("text/event-stream") {
        return (StatusCode::NOT_ACCEPTABLE, "missing accept").into_response();
    }

    if req.get("id").is_none() {
        return StatusCode::ACCEPTED.into_response();
    }
    let id = req["id"].clone();

    match method.as_str() {
        "initialize" => (
            [("mcp-session-id", SESSION)],
            Json(json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {
                    "protocolVersion": "2024-11-05",
                    "capabilities": {"tools": {}},
                    "serverInfo": {"name": "fake-playwright", "version": "0.0.1"}
                }
            })),
        )
            .into_response(),
        "tools/list" => {
            let progress = json!({"jsonrpc": "2.0", "method": "notifications/progress", "params": {}});
            let result = json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {"tools": [
                    {"name": "browser_navigate", "description": "Navigate to a URL",
                     "inputSchema": {"type": "object", "properties": {"url": {"type": "string"}}}},
                    {"name": "browser_snapshot", "description": "Capture page", "inputSchema": {"type": "object"}}
                ]}
            });
            let body = format!("event: message\ndata: {progress}\n\nevent: message\ndata: {result}\n\n");
            ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
        }
        "tools/call" if req["params"]["name"] == "browser_navigate" => Json(json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": {"content": [{"type": "text", "text": "Navigated"}]}
        }))
        .into_response(),
        "tools/call" => Json(json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": {"content": [{"type": "text", "text": "Tool failed"}], "isError": true}
        }))
        .into_response(),
        _ => Json(json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": {"code": -32601, "message": "Method not found"}
        }))
        .into_response(),
    }
}

async fn spawn(fake: Fake) -> String {
    let app = Router::new().route("/mcp", post(mcp)).with_state(fake);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/mcp")
}

// ═══════════════════════════════════════════════════════════════════════
//  Client
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn session_id_is_echoed_after_initialize() {
    let fake = Fake::default();
    let url = spawn(fake.clone()).await;
    let client = McpClient::http("playwright", url, Duration::from_secs(5)).unwrap();

    let tools = client.list_tools().await.unwrap();
    assert_eq!(tools.len(), 2);
    assert_eq!(tools[0].name, "browser_navigate");
    assert_eq!(tools[0].input_schema["properties"]["url"]["type"], "string");

    let seen = fake.seen();
    assert_eq!(
        seen,
        [
            ("initialize".to_owned(), None),
            ("notifications/initialized".to_owned(), Some(SESSION.to_owned())),
            ("tools/list".to_owned(), Some(SESSION.to_owned())),
        ]
    );
}

#[tokio::test]
async fn call_tool_over_http() {
    let url = spawn(Fake::default()).await;
    let client = McpClient::http("playwright", url, Duration::from_secs(5)).unwrap();

    let ok = client
        .call_tool("browser_navigate", json!({"url": "https://example.com"}))
        .await
        .unwrap();
    assert_eq!(ok.text(), "Navigated");
    assert!(!ok.is_error());

    let failed = client.call_tool("browser_type", json!({})).await.unwrap();
    assert!(failed.is_error());
    assert_eq!(failed.text(), "Tool failed");
}

#[tokio::test]
async fn http_error_status_is_transport_error() {
    let app = Router::new().route(
        "/mcp",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = McpClient::http("broken", format!("http://{addr}/mcp"), Duration::from_secs(5)).unwrap();
    let err = client.list_tools().await.unwrap_err();
    match err {
        ToolError::Transport { server, reason } => {
            assert_eq!(server, "broken");
            assert!(reason.contains("500"));
            assert!(reason.contains("boom"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Multi-server client and registry
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn remote_tools_call_through_their_server() {
    let url = spawn(Fake::default()).await;
    let mut client = MultiServerClient::new(Duration::from_secs(5));
    client.add_http_server("browser", &url).unwrap();

    let tools = client.get_server_tools("browser").await.unwrap();
    let navigate = tools.iter().find(|t| t.name() == "browser_navigate").unwrap();
    assert_eq!(navigate.server(), "browser");
    assert_eq!(navigate.description(), "Navigate to a URL");

    let result = navigate.call(json!({"url": "https://example.com"})).await.unwrap();
    assert_eq!(result.text(), "Navigated");
}

#[tokio::test]
async fn registry_init_via_http() {
    let url = spawn(Fake::default()).await;
    let mut registry: ToolRegistry = ToolRegistry::new().with_timeout(Duration::from_secs(5));

    registry.init_via_http(&url).await.unwrap();

    assert!(registry.is_initialised());
    let names: Vec<_> = registry.tools().unwrap().iter().map(|t| t.name().to_owned()).collect();
    assert_eq!(names, ["browser_navigate", "browser_snapshot"]);
    assert_eq!(registry.client().unwrap().server_names(), ["playwright"]);
}
