use crate::context::{self, RequestContext, TransportKind};
use crate::protocol::jsonrpc::SERVER_ERROR;
use crate::protocol::{Dispatcher, JsonRpcError, JsonRpcId, JsonRpcResponse};
use crate::state::AppState;
use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use std::sync::Arc;

/// POST /mcp - Stateless streamable-HTTP call.
///
/// # Flow
/// 1. Parse one JSON-RPC message from the body
/// 2. Build the request context from this request's headers
/// 3. Dispatch inside that context
/// 4. Reply with the response (JSON or a single SSE event), or 202 for notifications
pub async fn mcp_post_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let value: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, "Unparseable /mcp body");
            return (StatusCode::BAD_REQUEST, Json(Dispatcher::parse_error(e.to_string())))
                .into_response();
        }
    };

    let ctx = RequestContext::from_headers(&headers, &state.headers, TransportKind::StreamableHttp);
    tracing::debug!(has_credential = ctx.credential().is_some(), "Handling /mcp message");

    let dispatcher = Arc::clone(&state.dispatcher);
    let response = context::establish(ctx, async move { dispatcher.handle_value(value).await }).await;

    match response {
        None => StatusCode::ACCEPTED.into_response(),
        Some(resp) if state.config.json_response => Json(resp).into_response(),
        Some(resp) => single_event(&resp),
    }
}

/// GET/DELETE /mcp - No standalone streams or sessions on this endpoint.
pub async fn mcp_method_not_allowed() -> (StatusCode, Json<JsonRpcResponse>) {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(JsonRpcResponse::err(
            JsonRpcId::Null,
            JsonRpcError::new(SERVER_ERROR, "Method not allowed."),
        )),
    )
}

fn single_event(resp: &JsonRpcResponse) -> Response {
    match serde_json::to_string(resp) {
        Ok(data) => Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, "text/event-stream")
            .header("cache-control", "no-cache")
            .body(Body::from(format!("event: message\ndata: {}\n\n", data)))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
