//! MCP server exposing the `do-xss-xscan` tool.
//!
//! XscanServer { executable, supervisor } -> rmcp ServerHandler (tools only).
//! serve_stdio runs it over stdin/stdout until the client disconnects.
//!
use anyhow::{Context, Result};
use rmcp::{
    ErrorData as McpError, ServerHandler, ServiceExt,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo},
    service::{RequestContext, RoleServer},
    tool, tool_handler, tool_router,
    transport::stdio,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

use crate::locator::ExecutableRef;
use crate::supervisor::{ScanOutcome, ScanRequest, Supervisor};

pub const SERVER_NAME: &str = "xscan-xss";
pub const TOOL_NAME: &str = "do-xss-xscan";

/// First text segment of every successful result.
pub const COMPLETION_MARKER: &str = "✅ xscan scan completed.";
const STDERR_HEADING: &str = "⚠️ error output:\n";

#[derive(Clone)]
pub struct XscanServer {
    executable: Arc<ExecutableRef>,
    supervisor: Arc<Supervisor>,
    tool_router: ToolRouter<XscanServer>,
}

#[tool_router]
impl XscanServer {
    pub fn new(executable: Arc<ExecutableRef>, supervisor: Arc<Supervisor>) -> Self {
        Self {
            executable,
            supervisor,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        name = "do-xss-xscan",
        description = "Run a full XSS scan of the target website with xscan (xscan spider --url <url> [extraArgs...])"
    )]
    async fn do_xss_xscan(
        &self,
        Parameters(request): Parameters<ScanRequest>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.scan(request, context.ct).await
    }
}

impl XscanServer {
    /// Validate, run and render one scan.
    pub async fn scan(
        &self,
        mut request: ScanRequest,
        cancel: CancellationToken,
    ) -> Result<CallToolResult, McpError> {
        let target = validate_url(&request.url)?.to_string();
        request.url = target;
        debug!(url = %request.url, extra = request.extra_args.len(), "tool call: {TOOL_NAME}");
        let outcome = self
            .supervisor
            .run_scan(&self.executable, &request, &cancel)
            .await;
        Ok(render_outcome(outcome))
    }

    pub fn executable(&self) -> &ExecutableRef {
        &self.executable
    }

    fn instructions(&self) -> String {
        format!(
            "Runs xscan XSS scans. Call {TOOL_NAME} with an absolute target `url` and \
             optional `extraArgs` appended verbatim to `xscan spider --url <url>`. \
             Scans can take a long time; output is returned once xscan exits."
        )
    }
}

#[tool_handler]
impl ServerHandler for XscanServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(self.instructions()),
            ..Default::default()
        }
    }
}

/// Reject anything that is not a well-formed absolute URL.
///
/// Returns the trimmed string that was checked; that is what xscan receives.
pub fn validate_url(raw: &str) -> Result<&str, McpError> {
    let target = raw.trim();
    Url::parse(target).map_err(|e| {
        McpError::invalid_params(format!("url must be a valid absolute URL: {e}"), None)
    })?;
    Ok(target)
}

/// Successes become text segments, failures an error result with the message.
pub fn render_outcome(outcome: ScanOutcome) -> CallToolResult {
    match outcome {
        ScanOutcome::Success { stdout, stderr } => {
            let mut content = vec![Content::text(COMPLETION_MARKER), Content::text(stdout)];
            if let Some(stderr) = stderr {
                content.push(Content::text(format!("{STDERR_HEADING}{stderr}")));
            }
            CallToolResult::success(content)
        }
        ScanOutcome::Failure(failure) => {
            CallToolResult::error(vec![Content::text(format!("❌ {}", failure.message()))])
        }
    }
}

/// Serve over stdio until the peer goes away. Transport errors are fatal.
pub async fn serve_stdio(server: XscanServer) -> Result<()> {
    info!(executable = %server.executable(), "MCP server starting on stdio; waiting for {TOOL_NAME} calls");
    let service = server
        .serve(stdio())
        .await
        .context("Failed to start MCP stdio transport")?;
    let reason = service.waiting().await.context("MCP service task failed")?;
    info!(?reason, "MCP server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supervisor::testing::{FakeLauncher, Script};
    use crate::supervisor::{EMPTY_STDOUT_PLACEHOLDER, ScanPolicy};
    use serde_json::Value;
    use std::path::PathBuf;

    fn server(launcher: Arc<FakeLauncher>) -> XscanServer {
        let exe = ExecutableRef {
            path: PathBuf::from("/usr/local/bin/xscan"),
            working_dir: PathBuf::from("/usr/local/bin"),
            resolved: true,
        };
        XscanServer::new(
            Arc::new(exe),
            Arc::new(Supervisor::new(launcher, ScanPolicy::default())),
        )
    }

    fn texts(result: &CallToolResult) -> Vec<String> {
        let v = serde_json::to_value(result).unwrap();
        v.get("content")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|c| c.get("text").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn is_error(result: &CallToolResult) -> bool {
        let v = serde_json::to_value(result).unwrap();
        v.get("isError").and_then(Value::as_bool).unwrap_or(false)
    }

    #[tokio::test]
    async fn success_has_marker_and_stdout_only() {
        let srv = server(Arc::new(FakeLauncher::new(Script::exit(0).stdout("OK"))));
        let result = srv
            .scan(
                ScanRequest::new("https://target.example/", vec![]),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(!is_error(&result));
        assert_eq!(texts(&result), vec![COMPLETION_MARKER, "OK"]);
    }

    #[tokio::test]
    async fn success_with_stderr_adds_third_segment() {
        let script = Script::exit(0).stderr("rate limited");
        let srv = server(Arc::new(FakeLauncher::new(script)));
        let result = srv
            .scan(
                ScanRequest::new("https://target.example/", vec![]),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        let texts = texts(&result);
        assert_eq!(texts.len(), 3);
        assert_eq!(texts[1], EMPTY_STDOUT_PLACEHOLDER);
        assert!(texts[2].ends_with("rate limited"));
    }

    #[tokio::test]
    async fn failure_is_error_result_with_code_and_stderr() {
        let script = Script::exit(1).stderr("bad target");
        let srv = server(Arc::new(FakeLauncher::new(script)));
        let result = srv
            .scan(
                ScanRequest::new("https://target.example/", vec![]),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(is_error(&result));
        let text = texts(&result).join("\n");
        assert!(text.contains("exit code 1"));
        assert!(text.contains("bad target"));
    }

    #[tokio::test]
    async fn invalid_url_is_rejected_before_launch() {
        let launcher = Arc::new(FakeLauncher::new(Script::exit(0)));
        let srv = server(launcher.clone());
        let err = srv
            .scan(
                ScanRequest::new("not a url", vec![]),
                CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(err.message.contains("url"));
        assert!(launcher.launches().is_empty());
    }

    #[tokio::test]
    async fn surrounding_whitespace_is_not_passed_to_xscan() {
        let launcher = Arc::new(FakeLauncher::new(Script::exit(0)));
        let srv = server(launcher.clone());
        srv.scan(
            ScanRequest::new("  https://target.example/a \n", vec![]),
            CancellationToken::new(),
        )
        .await
        .unwrap();
        let launches = launcher.launches();
        assert_eq!(launches[0].args[2], "https://target.example/a");
    }

    #[test]
    fn relative_urls_are_invalid() {
        assert!(validate_url("/relative/path").is_err());
        assert!(validate_url("https://example.com/a?b=c").is_ok());
    }

    #[test]
    fn tool_is_registered_under_wire_name() {
        let srv = server(Arc::new(FakeLauncher::new(Script::exit(0))));
        let tools = srv.tool_router.list_all();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, TOOL_NAME);
        let schema = serde_json::to_value(&*tools[0].input_schema).unwrap();
        let props = schema.get("properties").and_then(Value::as_object).unwrap();
        assert!(props.contains_key("url"));
        assert!(props.contains_key("extraArgs"));
    }

    #[test]
    fn server_info_names_the_server() {
        let srv = server(Arc::new(FakeLauncher::new(Script::exit(0))));
        let info = srv.get_info();
        assert_eq!(info.server_info.name, SERVER_NAME);
        assert!(info.capabilities.tools.is_some());
    }
}
