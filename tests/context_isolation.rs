//! Concurrent requests must each see only their own credential, however their
//! vendor calls interleave.

mod common;

use async_trait::async_trait;
use common::{call_tool, config, create_test_app};
use futures::future::join_all;
use rand::Rng;
use saasbridge::adapters;
use saasbridge::context::{self, RequestContext, TransportKind};
use saasbridge::{AdapterKind, ToolError, VendorApi, VendorRequest};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// Sleeps a random few milliseconds, then answers with the token it was called with.
struct EchoVendor;

#[async_trait]
impl VendorApi for EchoVendor {
    fn name(&self) -> &'static str {
        "Echo"
    }

    async fn send(&self, request: VendorRequest) -> Result<Value, ToolError> {
        let delay = rand::thread_rng().gen_range(0..15);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        Ok(json!({ "choices": [{ "message": { "content": request.token() } }] }))
    }
}

fn ask(prompt: &str) -> Value {
    json!({ "messages": [{ "role": "user", "content": prompt }] })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_registry_calls_see_only_their_own_credential() {
    let registry = adapters::registry_for(&config(AdapterKind::Answer), Arc::new(EchoVendor)).unwrap();

    for _round in 0..10 {
        let tasks = (0..32).map(|i| {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                let credential = format!("cred-{}", i);
                let ctx = RequestContext::new(TransportKind::StreamableHttp).with_credential(credential.clone());
                let result = context::establish(ctx, registry.invoke("answer_ask", ask("who am i"))).await;
                (credential, result)
            })
        });

        for joined in join_all(tasks).await {
            let (credential, result) = joined.unwrap();
            assert!(!result.is_error, "{}", result.first_text());
            assert_eq!(result.first_text(), credential);
        }
    }
}

#[tokio::test]
async fn test_interleaved_futures_on_one_task_stay_isolated() {
    let registry = adapters::registry_for(&config(AdapterKind::Answer), Arc::new(EchoVendor)).unwrap();

    let a = context::establish(
        RequestContext::new(TransportKind::Sse).with_credential("A"),
        registry.invoke("answer_ask", ask("a")),
    );
    let b = context::establish(
        RequestContext::new(TransportKind::Sse).with_credential("B"),
        registry.invoke("answer_ask", ask("b")),
    );
    let (a, b) = tokio::join!(a, b);

    assert_eq!(a.first_text(), "A");
    assert_eq!(b.first_text(), "B");
    assert!(context::current().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_http_requests_see_only_their_own_header() {
    let (app, _) = create_test_app(config(AdapterKind::Answer), Arc::new(EchoVendor));

    let requests = (0..24).map(|i| {
        let app = app.clone();
        async move {
            let token = format!("header-{}", i);
            let result = call_tool(app, &[("x-auth-token", token.as_str())], "answer_ask", ask("echo")).await;
            (token, result)
        }
    });

    for (token, result) in join_all(requests).await {
        assert_eq!(result["isError"], false);
        assert_eq!(result["content"][0]["text"], token.as_str());
    }
}
