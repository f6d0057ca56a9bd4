use crate::handlers::{
    health_handler, mcp_method_not_allowed, mcp_post_handler, message_handler, sse_handler,
};
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Largest JSON-RPC message accepted on any endpoint.
const MAX_MESSAGE_BYTES: usize = 4 * 1024 * 1024;

/// Build the HTTP surface for one adapter process.
///
/// `/metrics` is added by the binary since it owns the Prometheus recorder.
pub fn build(state: Arc<AppState>) -> Router {
    Router::new()
        // Streamable HTTP
        .route(
            "/mcp",
            post(mcp_post_handler)
                .get(mcp_method_not_allowed)
                .delete(mcp_method_not_allowed),
        )
        // SSE stream plus its message channel
        .route("/sse", get(sse_handler))
        .route("/messages", post(message_handler))
        .route("/messages/", post(message_handler))
        // Health endpoint
        .route("/health", get(health_handler))
        // Middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(MAX_MESSAGE_BYTES)),
        )
        // State
        .with_state(state)
}
