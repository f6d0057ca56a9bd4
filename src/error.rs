use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Failures raised by the transport front before a message reaches the dispatcher.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum AppError {
    #[error("Transport not found")]
    TransportNotFound,

    #[error("Invalid request body: {0}")]
    BadRequest(String),

    #[error("Session closed: {0}")]
    SessionClosed(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::TransportNotFound => {
                tracing::warn!("Message posted to unknown SSE session");
                StatusCode::NOT_FOUND
            }
            AppError::BadRequest(msg) => {
                tracing::warn!(error = %msg, "Rejected malformed message");
                StatusCode::BAD_REQUEST
            }
            AppError::SessionClosed(id) => {
                tracing::debug!(session_id = %id, "Session closed before delivery");
                StatusCode::GONE
            }
        };

        let body = Json(ErrorResponse {
            error: self.to_string(),
        });

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Everything a tool executor can fail with.
///
/// Every variant ends up as the text of a failure envelope; none of them escape
/// the registry as a Rust error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("Invalid arguments: {0}")]
    Validation(String),

    #[error("Authentication required: no API credential was supplied for this request")]
    AuthMissing,

    #[error("Network error: could not reach {vendor}: {detail}")]
    Network { vendor: &'static str, detail: String },

    #[error("{vendor} API error ({status}): {message}")]
    Vendor {
        vendor: &'static str,
        status: u16,
        message: String,
    },

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("{kind} name is ambiguous: {name} matches {count} entries")]
    Ambiguous {
        kind: &'static str,
        name: String,
        count: usize,
    },

    #[error("Unexpected response from {vendor}: {detail}")]
    UnexpectedResponse { vendor: &'static str, detail: String },
}

impl ToolError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ToolError::Validation(msg.into())
    }

    /// Short label used as a metrics dimension.
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::Validation(_) => "validation",
            ToolError::AuthMissing => "auth_missing",
            ToolError::Network { .. } => "network",
            ToolError::Vendor { .. } => "vendor",
            ToolError::NotFound { .. } => "not_found",
            ToolError::Ambiguous { .. } => "ambiguous",
            ToolError::UnexpectedResponse { .. } => "unexpected_response",
        }
    }
}
