use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::toolserver::protocol::{error_codes, methods, JsonRpcRequest, JsonRpcResponse};
use crate::traits::Tool;

/// JSON-RPC 2.0 server over stdio.
///
/// Reads newline-delimited requests from stdin and writes exactly one
/// response line per request to stdout. All logging goes to stderr — stdout
/// is the protocol channel.
pub struct ToolServer {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolServer {
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Self {
        Self { tools }
    }

    /// Serve until stdin reaches EOF (the chat process hung up).
    pub async fn run(&self) -> anyhow::Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();

        info!(tools = self.tools.len(), "Tool server ready");

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            let Some(response) = self.handle_line(&line).await else {
                // Notification: no response goes on the wire.
                continue;
            };

            let mut out = serde_json::to_string(&response)?;
            out.push('\n');
            stdout.write_all(out.as_bytes()).await?;
            stdout.flush().await?;
        }

        info!("stdin closed, tool server shutting down");
        Ok(())
    }

    /// Handle one request line. Returns `None` for notifications.
    async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let request: JsonRpcRequest = match serde_json::from_str(line) {
            Ok(r) => r,
            Err(e) => {
                warn!("Failed to parse request: {}", e);
                return Some(JsonRpcResponse::error(
                    None,
                    error_codes::PARSE_ERROR,
                    format!("Parse error: {}", e),
                ));
            }
        };

        if request.jsonrpc != "2.0" {
            return Some(JsonRpcResponse::error(
                request.id,
                error_codes::INVALID_REQUEST,
                "Invalid JSON-RPC version",
            ));
        }

        // Requests without an id are notifications; nothing goes back.
        if request.id.is_none() {
            if request.method == methods::INITIALIZED {
                debug!("Client initialization complete");
            } else {
                debug!(method = %request.method, "Notification received");
            }
            return None;
        }

        Some(self.dispatch(request).await)
    }

    async fn dispatch(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.clone();
        match request.method.as_str() {
            methods::INITIALIZE => JsonRpcResponse::success(
                id,
                json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": {"tools": {}},
                    "serverInfo": {
                        "name": "rescuebot-tools",
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                }),
            ),
            methods::TOOLS_LIST => {
                let tools: Vec<Value> = self
                    .tools
                    .iter()
                    .map(|t| {
                        json!({
                            "name": t.name(),
                            "description": t.description(),
                            "inputSchema": t.schema(),
                        })
                    })
                    .collect();
                JsonRpcResponse::success(id, json!({ "tools": tools }))
            }
            methods::TOOLS_CALL => {
                let params = request.params.unwrap_or_else(|| json!({}));
                let Some(name) = params["name"].as_str() else {
                    return JsonRpcResponse::error(
                        id,
                        error_codes::INVALID_PARAMS,
                        "Missing tool name",
                    );
                };
                let arguments = params
                    .get("arguments")
                    .cloned()
                    .unwrap_or_else(|| json!({}));

                let Some(tool) = self.tools.iter().find(|t| t.name() == name) else {
                    return JsonRpcResponse::error(
                        id,
                        error_codes::INVALID_PARAMS,
                        format!("Unknown tool '{}'", name),
                    );
                };

                match tool.call(&arguments).await {
                    Ok(text) => JsonRpcResponse::success(
                        id,
                        json!({
                            "content": [{"type": "text", "text": text}],
                        }),
                    ),
                    Err(e) => {
                        warn!(tool = name, "Tool call failed: {:#}", e);
                        JsonRpcResponse::error(
                            id,
                            error_codes::INTERNAL_ERROR,
                            format!("Tool '{}' failed: {}", name, e),
                        )
                    }
                }
            }
            other => JsonRpcResponse::error(
                id,
                error_codes::METHOD_NOT_FOUND,
                format!("Method not found: {}", other),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes its input back."
        }
        fn schema(&self) -> Value {
            json!({"type": "object", "properties": {"text": {"type": "string"}}})
        }
        async fn call(&self, arguments: &Value) -> anyhow::Result<String> {
            arguments["text"]
                .as_str()
                .map(|s| s.to_string())
                .ok_or_else(|| anyhow::anyhow!("missing text"))
        }
    }

    fn server() -> ToolServer {
        let tools: Vec<Arc<dyn Tool>> = vec![Arc::new(EchoTool)];
        ToolServer::new(tools)
    }

    #[tokio::test]
    async fn initialize_reports_server_info() {
        let resp = server()
            .handle_line(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#)
            .await
            .unwrap();
        let result = resp.result.unwrap();
        assert_eq!(result["protocolVersion"], "2024-11-05");
        assert_eq!(result["serverInfo"]["name"], "rescuebot-tools");
    }

    #[tokio::test]
    async fn initialized_notification_produces_no_response() {
        let resp = server()
            .handle_line(r#"{"jsonrpc":"2.0","method":"notifications/initialized","params":{}}"#)
            .await;
        assert!(resp.is_none());
    }

    #[tokio::test]
    async fn tools_list_advertises_the_catalog() {
        let resp = server()
            .handle_line(r#"{"jsonrpc":"2.0","id":2,"method":"tools/list","params":{}}"#)
            .await
            .unwrap();
        let result = resp.result.unwrap();
        assert_eq!(result["tools"][0]["name"], "echo");
        assert_eq!(result["tools"][0]["inputSchema"]["type"], "object");
    }

    #[tokio::test]
    async fn tools_call_wraps_result_in_content_blocks() {
        let resp = server()
            .handle_line(
                r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"echo","arguments":{"text":"hi"}}}"#,
            )
            .await
            .unwrap();
        let result = resp.result.unwrap();
        assert_eq!(result["content"][0]["type"], "text");
        assert_eq!(result["content"][0]["text"], "hi");
    }

    #[tokio::test]
    async fn unknown_tool_is_invalid_params() {
        let resp = server()
            .handle_line(
                r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"nope","arguments":{}}}"#,
            )
            .await
            .unwrap();
        assert_eq!(resp.error.unwrap().code, error_codes::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn failing_tool_is_internal_error() {
        let resp = server()
            .handle_line(
                r#"{"jsonrpc":"2.0","id":5,"method":"tools/call","params":{"name":"echo","arguments":{}}}"#,
            )
            .await
            .unwrap();
        let error = resp.error.unwrap();
        assert_eq!(error.code, error_codes::INTERNAL_ERROR);
        assert!(error.message.contains("echo"));
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let resp = server()
            .handle_line(r#"{"jsonrpc":"2.0","id":6,"method":"resources/list","params":{}}"#)
            .await
            .unwrap();
        assert_eq!(resp.error.unwrap().code, error_codes::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn garbage_is_parse_error() {
        let resp = server().handle_line("{not json").await.unwrap();
        assert_eq!(resp.error.unwrap().code, error_codes::PARSE_ERROR);
    }

    #[tokio::test]
    async fn wrong_version_is_invalid_request() {
        let resp = server()
            .handle_line(r#"{"jsonrpc":"1.0","id":7,"method":"initialize"}"#)
            .await
            .unwrap();
        assert_eq!(resp.error.unwrap().code, error_codes::INVALID_REQUEST);
    }
}
