//! Capability provider backed by an MCP git server over stdio.
//!
//! Speaks newline-delimited JSON-RPC 2.0: `initialize`, then
//! `notifications/initialized`, then `tools/list` to check the mapped tools
//! exist, then one `tools/call` per capability invocation. Requests are
//! strictly sequential, so responses are read inline rather than through a
//! background dispatcher. Requests the server sends meanwhile get an answer
//! right away: `ping` succeeds, anything else is "method not found".
//!
//! `mcp-server-git` has no name-only listing, so unless a listing tool is
//! configured the staged file list is cut from the staged diff's headers.

use super::{CapabilityProvider, GitCapability};
use crate::config::McpServerConfig;
use crate::git::RepositoryRoot;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

const JSONRPC_VERSION: &str = "2.0";
const PROTOCOL_VERSION: &str = "2024-11-05";
/// How long a server gets to exit on its own after stdin closes.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

#[derive(Serialize)]
struct JsonRpcNotification<'a> {
    jsonrpc: &'static str,
    method: &'a str,
}

/// Anything the server writes: responses, notifications, or its own requests.
#[derive(Deserialize)]
struct JsonRpcMessage {
    id: Option<Value>,
    method: Option<String>,
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

/// Our answer to a request the server sent us.
#[derive(Serialize)]
struct JsonRpcResponse {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

const METHOD_NOT_FOUND: i64 = -32601;

impl JsonRpcResponse {
    fn for_server_request(id: Value, method: &str) -> Self {
        if method == "ping" {
            return JsonRpcResponse {
                jsonrpc: JSONRPC_VERSION,
                id,
                result: Some(json!({})),
                error: None,
            };
        }
        JsonRpcResponse {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: None,
            error: Some(JsonRpcError {
                code: METHOD_NOT_FOUND,
                message: format!("Method not found: {method}"),
            }),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct ListToolsResult {
    tools: Vec<ToolInfo>,
}

#[derive(Deserialize)]
struct ToolInfo {
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallToolResult {
    #[serde(default)]
    content: Vec<Content>,
    #[serde(default)]
    is_error: bool,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Content {
    Text { text: String },
    #[serde(other)]
    Other,
}

struct McpConnection {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Lines<BufReader<ChildStdout>>,
}

pub struct McpProvider {
    root: PathBuf,
    server: McpServerConfig,
    conn: Option<McpConnection>,
    next_id: u64,
}

impl McpProvider {
    pub fn new(root: &RepositoryRoot, server: McpServerConfig) -> Self {
        McpProvider {
            root: root.as_path().to_path_buf(),
            server,
            conn: None,
            next_id: 1,
        }
    }

    /// Remote tools the session needs: the diff tool, plus the listing tool if one is set.
    fn required_tools(&self) -> Vec<&str> {
        let mut tools = vec![self.server.diff_staged_tool.as_str()];
        if let Some(list) = &self.server.list_staged_tool {
            tools.push(list.as_str());
        }
        tools
    }

    fn spawn(&self) -> Result<McpConnection> {
        log::debug!(
            "Starting MCP server: {} {:?}",
            self.server.command,
            self.server.args
        );

        let mut child = Command::new(&self.server.command)
            .args(&self.server.args)
            .current_dir(&self.root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn MCP server {:?}", self.server.command))?;

        let stdin = child.stdin.take().context("MCP server stdin not available")?;
        let stdout = child
            .stdout
            .take()
            .context("MCP server stdout not available")?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    log::debug!("mcp stderr: {line}");
                }
            });
        }

        Ok(McpConnection {
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout).lines(),
        })
    }

    async fn write_line(&mut self, payload: &str) -> Result<()> {
        let conn = self.conn.as_mut().ok_or_else(|| anyhow!("MCP server not running"))?;
        conn.write_line(payload).await
    }

    async fn request(&mut self, method: &str, params: Option<Value>) -> Result<Value> {
        let id = self.next_id;
        self.next_id += 1;

        let payload = serde_json::to_string(&JsonRpcRequest {
            jsonrpc: JSONRPC_VERSION,
            id,
            method,
            params,
        })?;
        self.write_line(&payload)
            .await
            .with_context(|| format!("failed to send {method} to MCP server"))?;

        let conn = self.conn.as_mut().ok_or_else(|| anyhow!("MCP server not running"))?;
        loop {
            let line = conn
                .stdout
                .next_line()
                .await
                .with_context(|| format!("failed to read {method} response"))?
                .ok_or_else(|| anyhow!("MCP server closed its output while awaiting {method}"))?;

            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            log::trace!("mcp <- {line}");

            let msg: JsonRpcMessage = match serde_json::from_str(line) {
                Ok(msg) => msg,
                Err(e) => {
                    log::debug!("Skipping non JSON-RPC output from MCP server: {e}");
                    continue;
                }
            };

            if let Some(other) = &msg.method {
                match msg.id {
                    Some(server_id) => {
                        log::debug!("Answering server request {other}");
                        let reply = serde_json::to_string(&JsonRpcResponse::for_server_request(
                            server_id, other,
                        ))?;
                        conn.write_line(&reply)
                            .await
                            .with_context(|| format!("failed to answer server request {other}"))?;
                    }
                    None => log::debug!("Ignoring server notification {other}"),
                }
                continue;
            }
            if msg.id.as_ref().and_then(Value::as_u64) != Some(id) {
                continue;
            }

            if let Some(err) = msg.error {
                return Err(anyhow!(
                    "{method} failed: {} (code {})",
                    err.message,
                    err.code
                ));
            }
            return Ok(msg.result.unwrap_or(Value::Null));
        }
    }

    async fn notify(&mut self, method: &str) -> Result<()> {
        let payload = serde_json::to_string(&JsonRpcNotification {
            jsonrpc: JSONRPC_VERSION,
            method,
        })?;
        self.write_line(&payload).await
    }

    async fn handshake(&mut self) -> Result<()> {
        let init = self
            .request(
                "initialize",
                Some(json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": env!("CARGO_PKG_NAME"),
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                })),
            )
            .await?;
        log::debug!(
            "MCP server ready: {}",
            init.get("serverInfo").unwrap_or(&Value::Null)
        );
        self.notify("notifications/initialized").await?;

        let listed: ListToolsResult = serde_json::from_value(self.request("tools/list", None).await?)
            .context("failed to parse tools/list result")?;
        let available: Vec<&str> = listed.tools.iter().map(|t| t.name.as_str()).collect();

        for wanted in self.required_tools() {
            if !available.contains(&wanted) {
                return Err(anyhow!(
                    "MCP server has no tool {wanted:?} (available: {})",
                    available.join(", ")
                ));
            }
        }
        Ok(())
    }

    async fn call_tool(&mut self, tool: &str) -> Result<String> {
        let params = json!({
            "name": tool,
            "arguments": { "repo_path": self.root.display().to_string() },
        });

        let result: CallToolResult = serde_json::from_value(
            self.request("tools/call", Some(params)).await?,
        )
        .with_context(|| format!("failed to parse {tool} result"))?;

        let text = result
            .content
            .into_iter()
            .filter_map(|c| match c {
                Content::Text { text } => Some(text),
                Content::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        if result.is_error {
            return Err(anyhow!("MCP tool {tool} reported an error: {text}"));
        }
        Ok(text)
    }
}

impl McpConnection {
    async fn write_line(&mut self, payload: &str) -> Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| anyhow!("MCP server stdin already closed"))?;

        log::trace!("mcp -> {payload}");
        stdin.write_all(payload.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }
}

/// Paths named by the `diff --git a/X b/X` headers of a diff, one per line.
/// A diff with no headers (nothing staged) lists nothing.
fn staged_paths_from_diff(diff: &str) -> String {
    let mut paths: Vec<&str> = Vec::new();
    for header in diff.lines().filter_map(|l| l.strip_prefix("diff --git a/")) {
        let path = match same_path(header) {
            Some(path) => path,
            // Renames and copies: the staged side is the new path.
            None => match header.rsplit_once(" b/") {
                Some((_, new)) => new,
                None => continue,
            },
        };
        if !paths.contains(&path) {
            paths.push(path);
        }
    }
    paths.join("\n")
}

/// `X b/X` with both sides equal, even when `X` itself contains " b/".
fn same_path(header: &str) -> Option<&str> {
    let len = header.len().checked_sub(3)?;
    if len % 2 != 0 {
        return None;
    }
    let half = len / 2;
    let (old, rest) = (header.get(..half)?, header.get(half..)?);
    let new = rest.strip_prefix(" b/")?;
    (old == new).then_some(old)
}

#[async_trait]
impl CapabilityProvider for McpProvider {
    fn name(&self) -> &str {
        "mcp"
    }

    async fn start(&mut self) -> Result<()> {
        if self.conn.is_some() {
            return Ok(());
        }
        self.conn = Some(self.spawn()?);
        self.handshake().await
    }

    async fn invoke(&mut self, capability: GitCapability) -> Result<String> {
        let diff_tool = self.server.diff_staged_tool.clone();
        match capability {
            GitCapability::DiffStaged => self.call_tool(&diff_tool).await,
            GitCapability::ListStagedFiles => match self.server.list_staged_tool.clone() {
                Some(list_tool) => self.call_tool(&list_tool).await,
                None => Ok(staged_paths_from_diff(&self.call_tool(&diff_tool).await?)),
            },
        }
    }

    async fn shutdown(&mut self) -> Result<()> {
        let Some(mut conn) = self.conn.take() else {
            return Ok(());
        };

        // Closing stdin is the stdio transport's shutdown signal.
        drop(conn.stdin.take());

        match tokio::time::timeout(SHUTDOWN_GRACE, conn.child.wait()).await {
            Ok(status) => {
                let status = status.context("failed to wait for MCP server")?;
                log::debug!("MCP server exited with {status}");
            }
            Err(_) => {
                log::warn!("MCP server did not exit after stdin closed; killing it");
                conn.child
                    .kill()
                    .await
                    .context("failed to kill MCP server")?;
            }
        }
        Ok(())
    }
}
