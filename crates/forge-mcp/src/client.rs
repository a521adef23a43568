//! A single stack's MCP subprocess: spawn, handshake, request/response
//! (spec.md §4.G).

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use forge_config::CachedTool;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin};
use tracing::{debug, warn};

use crate::error::{McpError, McpResult};
use crate::protocol::{RequestIdCounter, RpcRequest, RpcResponse, PROTOCOL_VERSION};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// A live connection to one stack's MCP server subprocess.
pub struct McpStackClient {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<tokio::process::ChildStdout>,
    ids: RequestIdCounter,
    client_name: String,
    client_version: String,
}

impl McpStackClient {
    /// Spawn `bin args...` in `cwd` with the given environment overlay.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::BinaryNotFound`] if `bin` does not exist, and
    /// [`McpError::Spawn`] if the process cannot be started.
    pub fn spawn(
        bin: &str,
        args: &[String],
        cwd: &Path,
        env: &HashMap<String, String>,
    ) -> McpResult<Self> {
        if !Path::new(bin).is_file() {
            return Err(McpError::BinaryNotFound(bin.to_string()));
        }

        // Inherit the parent environment (tokio::process::Command's default)
        // and overlay resolved secrets plus the bundled-runtime PATH on top.
        let mut command = tokio::process::Command::new(bin);
        command
            .args(args)
            .current_dir(cwd)
            .envs(env)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());

        let mut child = command.spawn().map_err(|source| McpError::Spawn {
            program: bin.to_string(),
            source,
        })?;

        let stdin = child.stdin.take().ok_or(McpError::ServerClosed)?;
        let stdout = child.stdout.take().ok_or(McpError::ServerClosed)?;

        Ok(Self {
            child,
            stdin,
            reader: BufReader::new(stdout),
            ids: RequestIdCounter::new(),
            client_name: "forge".to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    /// Run the `initialize` / `notifications/initialized` handshake.
    ///
    /// # Errors
    ///
    /// Propagates any I/O, timeout, or server-error failure.
    pub async fn initialize(&mut self) -> McpResult<Value> {
        let id = self.ids.next();
        let params = serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": { "name": self.client_name, "version": self.client_version },
        });
        let result = self.call(id, "initialize", params).await?;
        self.notify("notifications/initialized").await?;
        Ok(result)
    }

    /// Call `tools/list` and normalise the response.
    ///
    /// # Errors
    ///
    /// Propagates any I/O, timeout, or server-error failure.
    pub async fn list_tools(&mut self) -> McpResult<Vec<CachedTool>> {
        let id = self.ids.next();
        let result = self.call(id, "tools/list", serde_json::json!({})).await?;
        let raw_tools = result
            .get("tools")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(raw_tools
            .into_iter()
            .map(|tool| {
                let name = tool
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let description = tool
                    .get("description")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| name.clone());
                let input_schema = tool.get("inputSchema").cloned().unwrap_or_else(|| {
                    serde_json::json!({ "type": "object", "properties": {} })
                });
                CachedTool {
                    name,
                    description,
                    input_schema,
                }
            })
            .collect())
    }

    async fn call(&mut self, id: u64, method: &str, params: Value) -> McpResult<Value> {
        self.write(&RpcRequest::call(id, method, params)).await?;

        let line = tokio::time::timeout(DEFAULT_TIMEOUT, self.read_matching(id))
            .await
            .map_err(|_| McpError::Timeout(DEFAULT_TIMEOUT.as_millis() as u64))??;

        if let Some(error) = line.error {
            return Err(McpError::ServerError {
                code: error.code,
                message: error.message,
            });
        }
        Ok(line.result.unwrap_or(Value::Null))
    }

    async fn notify(&mut self, method: &str) -> McpResult<()> {
        self.write(&RpcRequest::notify(method)).await
    }

    async fn write(&mut self, request: &RpcRequest) -> McpResult<()> {
        let line = request.to_line();
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;
        Ok(())
    }

    /// Read lines until one parses as a response carrying `id`, skipping
    /// (and logging) anything else — the small pending-table this client
    /// needs, given only one request is ever in flight per stack.
    async fn read_matching(&mut self, id: u64) -> McpResult<RpcResponse> {
        loop {
            let mut line = String::new();
            let n = self.reader.read_line(&mut line).await?;
            if n == 0 {
                return Err(McpError::ServerClosed);
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let response: RpcResponse = match serde_json::from_str(trimmed) {
                Ok(r) => r,
                Err(_) => {
                    warn!(line = trimmed, "ignoring non-JSON-RPC line on stdout");
                    continue;
                }
            };
            if response.id == Some(id) {
                return Ok(response);
            }
            debug!(expected = id, got = ?response.id, "skipping response for a different request");
        }
    }

    /// Close stdio and kill the subprocess.
    pub async fn shutdown(mut self) {
        drop(self.stdin);
        let _ = self.child.kill().await;
    }
}
