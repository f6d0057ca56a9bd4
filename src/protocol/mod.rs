//! Model Context Protocol surface: JSON-RPC framing, payload types and dispatch.

pub mod dispatch;
pub mod jsonrpc;
pub mod types;

pub use dispatch::{Dispatcher, PROTOCOL_VERSION_LATEST};
pub use jsonrpc::{
    JsonRpcError, JsonRpcId, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
};
pub use types::{CallToolParams, InitializeResult, ListToolsResult, ServerInfo, Tool};
