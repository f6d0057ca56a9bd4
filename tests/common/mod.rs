//! Shared helpers for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header::AUTHORIZATION, Request, StatusCode},
    Json, Router,
};
use saasbridge::{router, AdapterKind, AppState, Config, ToolError, VendorApi, VendorRequest};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tower::ServiceExt;

/// Vendor double that replays queued responses and records every request.
pub struct MockVendor {
    responses: Mutex<VecDeque<Result<Value, ToolError>>>,
    calls: Mutex<Vec<VendorRequest>>,
}

impl MockVendor {
    pub fn new(responses: Vec<Result<Value, ToolError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<VendorRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl VendorApi for MockVendor {
    fn name(&self) -> &'static str {
        "Mock"
    }

    async fn send(&self, request: VendorRequest) -> Result<Value, ToolError> {
        self.calls.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(json!({})))
    }
}

/// Router plus state for `adapter`, backed by `vendor`.
pub fn create_test_app(config: Config, vendor: Arc<dyn VendorApi>) -> (Router, Arc<AppState>) {
    let state = Arc::new(AppState::with_vendor(config, vendor).unwrap());
    (router::build(Arc::clone(&state)), state)
}

pub fn config(adapter: AdapterKind) -> Config {
    Config::for_adapter(adapter)
}

/// Helper to make a request to the router and decode the JSON reply.
///
/// Non-JSON bodies decode to `{}`.
pub async fn json_request(
    app: Router,
    method: &str,
    uri: &str,
    headers: &[(&str, &str)],
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let req = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(req).await.unwrap();
    let status = response.status();

    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&body_bytes).unwrap_or(json!({}));

    (status, body)
}

pub fn tools_call(id: i64, name: &str, arguments: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": { "name": name, "arguments": arguments }
    })
}

/// POST a `tools/call` to `/mcp` and return the `result` object.
pub async fn call_tool(
    app: Router,
    headers: &[(&str, &str)],
    name: &str,
    arguments: Value,
) -> Value {
    let (status, body) = json_request(app, "POST", "/mcp", headers, Some(tools_call(1, name, arguments))).await;
    assert_eq!(status, StatusCode::OK, "unexpected status, body: {}", body);
    body["result"].clone()
}

/// One request as seen by [`FakeVendorServer`].
#[derive(Debug, Clone)]
pub struct Hit {
    pub method: String,
    pub uri: String,
    pub authorization: Option<String>,
}

/// A real HTTP listener answering every request with one canned reply.
pub struct FakeVendorServer {
    pub base_url: String,
    hits: Arc<Mutex<Vec<Hit>>>,
}

impl FakeVendorServer {
    pub async fn start(status: StatusCode, reply: Value) -> Self {
        let hits = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&hits);

        let app = Router::new().fallback(move |req: Request<Body>| {
            let recorded = Arc::clone(&recorded);
            let reply = reply.clone();
            async move {
                recorded.lock().unwrap().push(Hit {
                    method: req.method().to_string(),
                    uri: req.uri().to_string(),
                    authorization: req
                        .headers()
                        .get(AUTHORIZATION)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string),
                });
                (status, Json(reply))
            }
        });

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            hits,
        }
    }

    pub fn hits(&self) -> Vec<Hit> {
        self.hits.lock().unwrap().clone()
    }
}
