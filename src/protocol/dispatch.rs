use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;

use crate::protocol::jsonrpc::{
    JsonRpcError, JsonRpcId, JsonRpcMessage, JsonRpcRequest, JsonRpcResponse, INTERNAL_ERROR,
    INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR,
};
use crate::protocol::types::{
    CallToolParams, InitializeParams, InitializeResult, ListToolsResult, ServerInfo, Tool,
};
use crate::tools::{ToolRegistry, ToolResult};

/// Newest protocol revision this server speaks.
pub const PROTOCOL_VERSION_LATEST: &str = "2025-06-18";

const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-06-18", "2025-03-26", "2024-11-05"];

/// Routes JSON-RPC messages to the tool registry.
///
/// Stateless: every transport shares one dispatcher and each message is handled
/// on its own. The caller is responsible for establishing the request context
/// around [`Dispatcher::handle`].
pub struct Dispatcher {
    server_info: ServerInfo,
    instructions: Option<String>,
    registry: Arc<dyn ToolRegistry>,
}

impl Dispatcher {
    pub fn new(name: &str, version: &str, registry: Arc<dyn ToolRegistry>) -> Self {
        Self {
            server_info: ServerInfo {
                name: name.to_string(),
                version: version.to_string(),
            },
            instructions: None,
            registry,
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn registry(&self) -> &Arc<dyn ToolRegistry> {
        &self.registry
    }

    /// Response for a frame that was not valid JSON.
    pub fn parse_error(detail: impl Into<String>) -> JsonRpcResponse {
        JsonRpcResponse::err(
            JsonRpcId::Null,
            JsonRpcError::new(PARSE_ERROR, "parse error").with_detail(detail),
        )
    }

    /// Handle an already-parsed JSON value. `None` for notifications.
    pub async fn handle_value(&self, value: Value) -> Option<JsonRpcResponse> {
        if value.is_array() {
            return Some(JsonRpcResponse::err(
                JsonRpcId::Null,
                JsonRpcError::new(INVALID_REQUEST, "batching not supported"),
            ));
        }

        // An unusable id must not demote a request to a notification.
        let bad_id = value
            .get("id")
            .is_some_and(|id| !(id.is_number() || id.is_string() || id.is_null()));
        if bad_id && value.get("method").is_some() {
            return Some(JsonRpcResponse::err(
                JsonRpcId::Null,
                JsonRpcError::new(INVALID_REQUEST, "id must be a string, number or null"),
            ));
        }

        match serde_json::from_value::<JsonRpcMessage>(value) {
            Ok(msg) => self.handle(msg).await,
            Err(e) => Some(JsonRpcResponse::err(
                JsonRpcId::Null,
                JsonRpcError::new(INVALID_REQUEST, "invalid request").with_detail(e.to_string()),
            )),
        }
    }

    pub async fn handle(&self, msg: JsonRpcMessage) -> Option<JsonRpcResponse> {
        match msg {
            JsonRpcMessage::Request(req) => Some(self.handle_request(req).await),
            JsonRpcMessage::Notification(n) => {
                tracing::debug!(method = %n.method, "Notification received");
                None
            }
            JsonRpcMessage::Response(_) => None,
        }
    }

    async fn handle_request(&self, req: JsonRpcRequest) -> JsonRpcResponse {
        if req.jsonrpc != "2.0" {
            return JsonRpcResponse::err(
                req.id,
                JsonRpcError::new(INVALID_REQUEST, "invalid jsonrpc version"),
            );
        }

        match req.method.as_str() {
            "initialize" => self.initialize(req),
            "ping" => JsonRpcResponse::ok(req.id, serde_json::json!({})),
            "tools/list" => {
                let result = ListToolsResult {
                    tools: self.registry.list_tools().iter().map(Tool::from).collect(),
                };
                to_response(req.id, &result)
            }
            "tools/call" => self.call_tool(req).await,
            other => {
                tracing::debug!(method = %other, "Unsupported method");
                JsonRpcResponse::err(req.id, JsonRpcError::new(METHOD_NOT_FOUND, "method not found"))
            }
        }
    }

    fn initialize(&self, req: JsonRpcRequest) -> JsonRpcResponse {
        let requested = req
            .params
            .and_then(|p| serde_json::from_value::<InitializeParams>(p).ok())
            .map(|p| p.protocol_version);

        let protocol_version = requested
            .filter(|v| SUPPORTED_PROTOCOL_VERSIONS.contains(&v.as_str()))
            .unwrap_or_else(|| PROTOCOL_VERSION_LATEST.to_string());

        let result = InitializeResult {
            protocol_version,
            capabilities: serde_json::json!({ "tools": { "listChanged": false } }),
            server_info: self.server_info.clone(),
            instructions: self.instructions.clone(),
        };
        to_response(req.id, &result)
    }

    async fn call_tool(&self, req: JsonRpcRequest) -> JsonRpcResponse {
        let Some(params) = req.params else {
            return JsonRpcResponse::err(
                req.id,
                JsonRpcError::new(INVALID_PARAMS, "invalid params").with_detail("missing params"),
            );
        };
        let params: CallToolParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => {
                return JsonRpcResponse::err(
                    req.id,
                    JsonRpcError::new(INVALID_PARAMS, "invalid params").with_detail(e.to_string()),
                )
            }
        };

        let arguments = params.arguments.unwrap_or(Value::Null);
        let invocation = self.registry.invoke(&params.name, arguments);
        let result = match AssertUnwindSafe(invocation).catch_unwind().await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(tool = %params.name, "Tool execution panicked");
                ToolResult::error(format!("Error: Internal error while running {}", params.name))
            }
        };

        to_response(req.id, &result)
    }
}

fn to_response<T: serde::Serialize>(id: JsonRpcId, result: &T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::ok(id, value),
        Err(e) => JsonRpcResponse::err(
            id,
            JsonRpcError::new(INTERNAL_ERROR, "internal error").with_detail(e.to_string()),
        ),
    }
}
