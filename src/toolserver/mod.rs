//! The tool-execution process: a JSON-RPC 2.0 server over stdio hosting the
//! retrieval tool. Counterpart of the client in [`crate::mcp`].

mod protocol;
mod server;

pub use protocol::{error_codes, JsonRpcError, JsonRpcId, JsonRpcRequest, JsonRpcResponse};
pub use server::ToolServer;
