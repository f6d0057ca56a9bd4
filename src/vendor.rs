//! Outbound calls to the vendor REST API.
//!
//! Executors describe a call as a [`VendorRequest`] and hand it to a [`VendorApi`].
//! The production implementation is [`HttpVendor`] (reqwest); tests substitute a
//! scripted implementation.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::ACCEPT;
pub use reqwest::Method;
use serde_json::Value;

use crate::context::ResolvedAuth;
use crate::error::ToolError;

/// One outbound vendor call. Always carries a credential.
#[derive(Debug, Clone, PartialEq)]
pub struct VendorRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    token: String,
}

impl VendorRequest {
    pub fn new(method: Method, path: impl Into<String>, auth: &ResolvedAuth) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            token: auth.token.clone(),
        }
    }

    pub fn get(path: impl Into<String>, auth: &ResolvedAuth) -> Self {
        Self::new(Method::GET, path, auth)
    }

    pub fn post(path: impl Into<String>, auth: &ResolvedAuth, body: Value) -> Self {
        Self::new(Method::POST, path, auth).json(body)
    }

    pub fn delete(path: impl Into<String>, auth: &ResolvedAuth) -> Self {
        Self::new(Method::DELETE, path, auth)
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn query_opt(self, key: &str, value: Option<impl ToString>) -> Self {
        match value {
            Some(v) => self.query(key, v),
            None => self,
        }
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Bearer credential this request is sent with.
    pub fn token(&self) -> &str {
        &self.token
    }
}

#[async_trait]
pub trait VendorApi: Send + Sync {
    /// Vendor name used in error messages.
    fn name(&self) -> &'static str;

    /// Perform the call. Success bodies are parsed as JSON; an empty body yields `Null`.
    async fn send(&self, request: VendorRequest) -> Result<Value, ToolError>;
}

/// reqwest-backed [`VendorApi`].
pub struct HttpVendor {
    name: &'static str,
    base_url: String,
    client: reqwest::Client,
}

impl HttpVendor {
    pub fn new(name: &'static str, base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("saasbridge/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            name,
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl VendorApi for HttpVendor {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn send(&self, request: VendorRequest) -> Result<Value, ToolError> {
        let url = format!("{}{}", self.base_url, request.path);
        let network = |e: reqwest::Error| ToolError::Network {
            vendor: self.name,
            detail: e.to_string(),
        };

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .bearer_auth(&request.token)
            .header(ACCEPT, "application/json");
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let start = Instant::now();
        let response = builder.send().await.map_err(network)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(network)?;

        tracing::debug!(
            method = %request.method,
            path = %request.path,
            status = status.as_u16(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Vendor call completed"
        );
        metrics::counter!("vendor_requests_total", "status" => status.as_u16().to_string())
            .increment(1);

        if !status.is_success() {
            return Err(ToolError::Vendor {
                vendor: self.name,
                status: status.as_u16(),
                message: error_message(status.as_u16(), status.canonical_reason(), &bytes),
            });
        }

        parse_success_body(self.name, &bytes)
    }
}

/// Parse a 2xx body; whitespace-only bodies (e.g. 204) become `Null`.
pub fn parse_success_body(vendor: &'static str, bytes: &[u8]) -> Result<Value, ToolError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(bytes).map_err(|e| ToolError::UnexpectedResponse {
        vendor,
        detail: format!("response body is not JSON ({})", e),
    })
}

/// Human-readable message for a failed vendor call.
///
/// Understands the common JSON error shapes; anything else degrades to the
/// HTTP status line.
pub fn error_message(status: u16, reason: Option<&str>, body: &[u8]) -> String {
    let status_line = format!("{} {}", status, reason.unwrap_or("Unknown Status"));

    let Ok(json) = serde_json::from_slice::<Value>(body) else {
        return status_line;
    };

    let message = match json.get("error") {
        Some(Value::Object(err)) => err
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
        Some(Value::String(s)) => Some(s.clone()),
        _ => None,
    }
    .or_else(|| json.get("message").and_then(Value::as_str).map(str::to_string))
    .or_else(|| match json.get("detail") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Array(items)) => {
            let parts: Vec<&str> = items
                .iter()
                .filter_map(|d| d.get("msg").and_then(Value::as_str))
                .collect();
            (!parts.is_empty()).then(|| parts.join("; "))
        }
        _ => None,
    });

    message
        .filter(|m| !m.trim().is_empty())
        .unwrap_or(status_line)
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn auth() -> ResolvedAuth {
        ResolvedAuth {
            token: "tok".into(),
            scope: Some("team_1".into()),
        }
    }

    #[test]
    fn request_builder_collects_query_and_body() {
        let req = VendorRequest::post("/v10/projects", &auth(), json!({"name": "web"}))
            .query_opt("teamId", auth().scope)
            .query_opt("limit", None::<u32>);

        assert_eq!(req.method, Method::POST);
        assert_eq!(req.query, vec![("teamId".to_string(), "team_1".to_string())]);
        assert_eq!(req.body, Some(json!({"name": "web"})));
        assert_eq!(req.token(), "tok");
    }

    #[test]
    fn error_message_nested_object() {
        let body = br#"{"error":{"code":"forbidden","message":"Not authorized"}}"#;
        assert_eq!(error_message(403, Some("Forbidden"), body), "Not authorized");
    }

    #[test]
    fn error_message_flat_shapes() {
        assert_eq!(error_message(400, None, br#"{"error":"bad model"}"#), "bad model");
        assert_eq!(error_message(400, None, br#"{"message":"nope"}"#), "nope");
        assert_eq!(error_message(422, None, br#"{"detail":"too long"}"#), "too long");
        assert_eq!(
            error_message(422, None, br#"{"detail":[{"msg":"a"},{"msg":"b"}]}"#),
            "a; b"
        );
    }

    #[test]
    fn error_message_falls_back_to_status_line() {
        assert_eq!(
            error_message(502, Some("Bad Gateway"), b"<html>oops</html>"),
            "502 Bad Gateway"
        );
        assert_eq!(
            error_message(401, Some("Unauthorized"), br#"{"unrelated":true}"#),
            "401 Unauthorized"
        );
    }

    #[test]
    fn empty_success_body_is_null() {
        assert_eq!(parse_success_body("X", b"").unwrap(), Value::Null);
        assert!(matches!(
            parse_success_body("X", b"not json"),
            Err(ToolError::UnexpectedResponse { .. })
        ));
    }
}
