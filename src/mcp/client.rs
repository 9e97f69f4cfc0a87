use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::warn;

use crate::traits::ToolDefinition;

/// Maximum size (in bytes) for a single tool-server JSON-RPC response line.
/// Responses exceeding this are rejected to prevent memory exhaustion.
const MAX_RESPONSE_BYTES: usize = 512 * 1024; // 512 KiB

/// Timeout for a single JSON-RPC round-trip (request + response).
const RPC_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for the initial handshake (initialize + notifications/initialized).
const INIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Environment variables safe to pass to the tool-server subprocess.
/// Everything else is stripped to prevent credential leakage; the server
/// reads its own credential from its config file.
const SAFE_ENV_KEYS: &[&str] = &[
    "PATH",
    "HOME",
    "USER",
    "LANG",
    "LC_ALL",
    "LC_CTYPE",
    "TERM",
    "SHELL",
    "TMPDIR",
    "TMP",
    "TEMP",
    "XDG_RUNTIME_DIR",
    "XDG_DATA_HOME",
    "XDG_CONFIG_HOME",
    "XDG_CACHE_HOME",
    "RESCUEBOT_CONFIG",
    "RESCUEBOT_API_KEY",
];

/// JSON-RPC client over stdio for the tool-server protocol.
///
/// Requests and responses are matched by a monotonically increasing id; the
/// stdio pipes are mutex-guarded so concurrent callers serialize through the
/// one underlying stream.
pub struct McpClient {
    stdin: Mutex<tokio::process::ChildStdin>,
    stdout: Mutex<BufReader<tokio::process::ChildStdout>>,
    child: Mutex<Child>,
    next_id: AtomicU64,
}

impl McpClient {
    /// Spawn the tool-server subprocess and run the initialize handshake.
    ///
    /// The subprocess environment is scrubbed to a safe allowlist.
    pub async fn spawn(command: &str, args: &[String]) -> anyhow::Result<Self> {
        let safe_env: Vec<(String, String)> = std::env::vars()
            .filter(|(k, _)| SAFE_ENV_KEYS.iter().any(|safe| safe == k))
            .collect();

        let mut child = Command::new(command)
            .args(args)
            .env_clear()
            .envs(safe_env)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow::anyhow!("Failed to capture tool server stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow::anyhow!("Failed to capture tool server stdout"))?;

        // Drain stderr in the background so errors from the tool server are
        // visible rather than silently swallowed.
        if let Some(stderr) = child.stderr.take() {
            let cmd_name = command.to_string();
            tokio::spawn(async move {
                let mut reader = BufReader::new(stderr);
                let mut line = String::new();
                loop {
                    line.clear();
                    match reader.read_line(&mut line).await {
                        Ok(0) => break, // EOF
                        Ok(_) => {
                            let trimmed = line.trim_end();
                            if !trimmed.is_empty() {
                                warn!(tool_server = %cmd_name, "{}", trimmed);
                            }
                        }
                        Err(_) => break,
                    }
                }
            });
        }

        let client = Self {
            stdin: Mutex::new(stdin),
            stdout: Mutex::new(BufReader::new(stdout)),
            child: Mutex::new(child),
            next_id: AtomicU64::new(1),
        };

        let _resp = tokio::time::timeout(
            INIT_TIMEOUT,
            client.send_request_inner(
                "initialize",
                json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": {},
                    "clientInfo": {
                        "name": "rescuebot",
                        "version": env!("CARGO_PKG_VERSION"),
                    }
                }),
            ),
        )
        .await
        .map_err(|_| {
            anyhow::anyhow!(
                "Tool server initialization timed out after {:?}",
                INIT_TIMEOUT
            )
        })??;

        client
            .send_notification("notifications/initialized", json!({}))
            .await?;

        Ok(client)
    }

    /// Send a JSON-RPC request with a timeout and read the response.
    pub async fn send_request(&self, method: &str, params: Value) -> anyhow::Result<Value> {
        tokio::time::timeout(RPC_TIMEOUT, self.send_request_inner(method, params))
            .await
            .map_err(|_| {
                anyhow::anyhow!("RPC call '{}' timed out after {:?}", method, RPC_TIMEOUT)
            })?
    }

    /// Inner send without timeout (used by both public send_request and init).
    async fn send_request_inner(&self, method: &str, params: Value) -> anyhow::Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let mut line = serde_json::to_string(&request)?;
        line.push('\n');

        {
            let mut stdin = self.stdin.lock().await;
            stdin.write_all(line.as_bytes()).await?;
            stdin.flush().await?;
        }

        let mut response_line = String::new();
        {
            let mut stdout = self.stdout.lock().await;
            let bytes_read = stdout.read_line(&mut response_line).await?;
            if bytes_read == 0 {
                anyhow::bail!("Tool server closed stdout (empty response)");
            }
        }

        if response_line.len() > MAX_RESPONSE_BYTES {
            anyhow::bail!(
                "Tool server response exceeded size limit ({} > {} bytes)",
                response_line.len(),
                MAX_RESPONSE_BYTES
            );
        }

        let response: Value = serde_json::from_str(&response_line)?;

        if let Some(error) = response.get("error") {
            anyhow::bail!("Tool server error: {}", error);
        }

        Ok(response["result"].clone())
    }

    /// Send a JSON-RPC notification (no response expected).
    async fn send_notification(&self, method: &str, params: Value) -> anyhow::Result<()> {
        let notification = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        });

        let mut line = serde_json::to_string(&notification)?;
        line.push('\n');

        let mut stdin = self.stdin.lock().await;
        stdin.write_all(line.as_bytes()).await?;
        stdin.flush().await?;

        Ok(())
    }

    /// List tools from the tool server's live catalog.
    pub async fn list_tools(&self) -> anyhow::Result<Vec<ToolDefinition>> {
        let result = self.send_request("tools/list", json!({})).await?;
        let tools = result["tools"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .iter()
            .map(|td| ToolDefinition {
                name: td["name"].as_str().unwrap_or("unknown").to_string(),
                description: td["description"].as_str().unwrap_or("").to_string(),
                input_schema: td["inputSchema"].clone(),
            })
            .collect();
        Ok(tools)
    }

    /// Call a tool on the tool server.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> anyhow::Result<String> {
        let result = self
            .send_request(
                "tools/call",
                json!({
                    "name": name,
                    "arguments": arguments,
                }),
            )
            .await?;

        // The server returns content as an array of content blocks
        if let Some(content) = result["content"].as_array() {
            let texts: Vec<&str> = content.iter().filter_map(|c| c["text"].as_str()).collect();
            Ok(texts.join("\n"))
        } else {
            Ok(result.to_string())
        }
    }

    /// Kill the tool-server subprocess. Best-effort; the process is gone
    /// either way once this returns.
    pub async fn shutdown(&self) {
        let mut child = self.child.lock().await;
        if let Err(e) = child.start_kill() {
            warn!("Failed to kill tool server process: {}", e);
        }
        let _ = child.wait().await;
    }
}
