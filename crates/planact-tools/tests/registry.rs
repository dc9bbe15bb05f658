//! Registry bootstrapping with a substituted tool source.

use std::time::Duration;

use async_trait::async_trait;

use planact_tools::{Result, ToolError, ToolRegistry, ToolSource};

/// Records which servers were registered and hands back two fixed tools.
#[derive(Default)]
struct DummySource {
    http: Vec<(String, String)>,
    stdio: Vec<(String, String, Vec<String>)>,
    timeout: Option<Duration>,
}

#[async_trait]
impl ToolSource for DummySource {
    type Tool = String;

    fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Self::default()
        }
    }

    fn add_http_server(&mut self, name: &str, url: &str) -> Result<()> {
        self.http.push((name.to_owned(), url.to_owned()));
        Ok(())
    }

    fn add_stdio_server(&mut self, name: &str, command: &str, args: &[String]) -> Result<()> {
        self.stdio
            .push((name.to_owned(), command.to_owned(), args.to_vec()));
        Ok(())
    }

    async fn get_tools(&self) -> Result<Vec<String>> {
        Ok(vec!["t1".to_owned(), "t2".to_owned()])
    }
}

/// A source whose tool listing always fails.
struct BrokenSource;

#[async_trait]
impl ToolSource for BrokenSource {
    type Tool = String;

    fn with_timeout(_timeout: Duration) -> Self {
        BrokenSource
    }

    fn add_http_server(&mut self, _name: &str, _url: &str) -> Result<()> {
        Ok(())
    }

    fn add_stdio_server(&mut self, _name: &str, _command: &str, _args: &[String]) -> Result<()> {
        Ok(())
    }

    async fn get_tools(&self) -> Result<Vec<String>> {
        Err(ToolError::Transport {
            server: "playwright".into(),
            reason: "connection refused".into(),
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Init methods
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn init_via_http_loads_tools() {
    let mut registry: ToolRegistry<DummySource> = ToolRegistry::new();
    registry.init_via_http("http://dummy").await.unwrap();

    assert!(registry.is_initialised());
    assert_eq!(registry.tools().unwrap(), ["t1", "t2"]);

    let client = registry.client().unwrap();
    assert_eq!(client.http, [("playwright".to_owned(), "http://dummy".to_owned())]);
    assert!(client.stdio.is_empty());
    assert_eq!(client.timeout, Some(Duration::from_secs(30)));
}

#[tokio::test]
async fn init_via_stdio_launches_playwright() {
    let mut registry: ToolRegistry<DummySource> = ToolRegistry::new()
        .with_server_name("browser")
        .with_timeout(Duration::from_secs(5));
    registry.init_via_stdio(true).await.unwrap();

    assert!(registry.is_initialised());
    assert_eq!(registry.tools().unwrap(), ["t1", "t2"]);

    let client = registry.client().unwrap();
    let (name, command, args) = &client.stdio[0];
    assert_eq!(name, "browser");
    assert_eq!(command, "npx");
    assert_eq!(args, &["@playwright/mcp@latest", "--headless"]);
    assert_eq!(client.timeout, Some(Duration::from_secs(5)));
}

#[tokio::test]
async fn headed_stdio_omits_flag() {
    let mut registry: ToolRegistry<DummySource> = ToolRegistry::new();
    registry.init_via_stdio(false).await.unwrap();

    let (_, _, args) = &registry.client().unwrap().stdio[0];
    assert_eq!(args, &["@playwright/mcp@latest"]);
}

#[tokio::test]
async fn failed_load_leaves_registry_uninitialised() {
    let mut registry: ToolRegistry<BrokenSource> = ToolRegistry::new();
    let err = registry.init_via_http("http://dummy").await.unwrap_err();

    assert!(matches!(err, ToolError::Transport { .. }));
    assert!(!registry.is_initialised());
    assert!(matches!(registry.tools(), Err(ToolError::NotInitialised(_))));
    assert!(matches!(registry.client(), Err(ToolError::NotInitialised(_))));
}

#[tokio::test]
async fn reinitialising_replaces_tools() {
    let mut registry: ToolRegistry<DummySource> = ToolRegistry::new();

    registry.init_via_http("http://first").await.unwrap();
    registry.init_via_http("http://second").await.unwrap();

    let client = registry.client().unwrap();
    assert_eq!(client.http.len(), 1);
    assert_eq!(client.http[0].1, "http://second");
}
