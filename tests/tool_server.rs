//! Integration test for the tool-server process: spawn the real binary and
//! drive a JSON-RPC session over its stdio, the same way the chat daemon's
//! bridge does.

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::mpsc;
use std::time::Duration;

use serde_json::{json, Value};

/// How long to wait for a single response line before failing the test.
/// Generous because a tool call may ride out the provider's own timeout.
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(60);

struct ToolServerProcess {
    child: Child,
    stdin: std::process::ChildStdin,
    lines: mpsc::Receiver<String>,
    _dir: tempfile::TempDir,
}

impl ToolServerProcess {
    /// Spawn `rescuebot-tools` against a throwaway config whose provider
    /// points at an unreachable local port — catalog calls never touch the
    /// network, and tool execution fails fast with a connection error.
    fn spawn() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("knowledge.db");
        let config_path = dir.path().join("config.toml");
        std::fs::write(
            &config_path,
            format!(
                "[provider]\n\
                 api_key = \"test-key\"\n\
                 base_url = \"http://127.0.0.1:9\"\n\n\
                 [knowledge]\n\
                 db_path = \"{}\"\n",
                db_path.display()
            ),
        )
        .unwrap();

        let mut child = Command::new(env!("CARGO_BIN_EXE_rescuebot-tools"))
            .args(["--config", config_path.to_str().unwrap()])
            .env_remove("RESCUEBOT_CONFIG")
            .env_remove("RESCUEBOT_API_KEY")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("rescuebot-tools should spawn");

        let stdin = child.stdin.take().unwrap();
        let stdout = child.stdout.take().unwrap();
        let lines = read_lines_in_background(stdout);

        Self {
            child,
            stdin,
            lines,
            _dir: dir,
        }
    }

    fn send(&mut self, request: &Value) {
        let mut line = request.to_string();
        line.push('\n');
        self.stdin.write_all(line.as_bytes()).unwrap();
        self.stdin.flush().unwrap();
    }

    fn recv(&self) -> Value {
        let line = self
            .lines
            .recv_timeout(RESPONSE_TIMEOUT)
            .expect("tool server should respond within the timeout");
        serde_json::from_str(&line).expect("response should be valid JSON")
    }
}

impl Drop for ToolServerProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn read_lines_in_background(stdout: ChildStdout) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let reader = BufReader::new(stdout);
        for line in reader.lines() {
            match line {
                Ok(l) => {
                    if tx.send(l).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });
    rx
}

fn initialize(server: &mut ToolServerProcess) {
    server.send(&json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": {
            "protocolVersion": "2024-11-05",
            "capabilities": {},
            "clientInfo": {"name": "test-harness", "version": "0"},
        },
    }));
    let resp = server.recv();
    assert_eq!(resp["result"]["serverInfo"]["name"], "rescuebot-tools");

    // Notification: no response expected on the wire.
    server.send(&json!({
        "jsonrpc": "2.0",
        "method": "notifications/initialized",
        "params": {},
    }));
}

#[test]
fn handshake_and_catalog_round_trip() {
    let mut server = ToolServerProcess::spawn();
    initialize(&mut server);

    server.send(&json!({
        "jsonrpc": "2.0",
        "id": 2,
        "method": "tools/list",
        "params": {},
    }));
    let resp = server.recv();
    assert_eq!(resp["id"], 2);
    let tools = resp["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0]["name"], "search_faq_knowledge_base");
    assert_eq!(tools[0]["inputSchema"]["required"][0], "query");
}

#[test]
fn unknown_method_gets_method_not_found() {
    let mut server = ToolServerProcess::spawn();
    initialize(&mut server);

    server.send(&json!({
        "jsonrpc": "2.0",
        "id": 3,
        "method": "resources/list",
        "params": {},
    }));
    let resp = server.recv();
    assert_eq!(resp["error"]["code"], -32601);
}

#[test]
fn unknown_tool_call_is_rejected() {
    let mut server = ToolServerProcess::spawn();
    initialize(&mut server);

    server.send(&json!({
        "jsonrpc": "2.0",
        "id": 4,
        "method": "tools/call",
        "params": {"name": "not_a_tool", "arguments": {}},
    }));
    let resp = server.recv();
    assert_eq!(resp["error"]["code"], -32602);
}

#[test]
fn retrieval_with_unreachable_embedder_reports_tool_failure() {
    let mut server = ToolServerProcess::spawn();
    initialize(&mut server);

    // The embedding endpoint points at a closed local port, so the tool
    // fails downstream and the server surfaces a JSON-RPC error instead of
    // hanging or crashing.
    server.send(&json!({
        "jsonrpc": "2.0",
        "id": 5,
        "method": "tools/call",
        "params": {"name": "search_faq_knowledge_base", "arguments": {"query": "refunds"}},
    }));
    let resp = server.recv();
    assert_eq!(resp["error"]["code"], -32603);
    assert!(resp["error"]["message"]
        .as_str()
        .unwrap()
        .contains("search_faq_knowledge_base"));
}
