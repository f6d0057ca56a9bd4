//! Answer/search/reasoning adapter.
//!
//! Three chat tools share one `messages` parameter and differ only in model and
//! framing instruction; `answer_search` hits the raw search endpoint.

pub mod conversation;
pub mod format;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::context::CredentialResolver;
use crate::error::ToolError;
use crate::tools::{Arguments, ParamKind, ParamSpec, ToolDescriptor, ToolKind, Toolbox};
use crate::vendor::{VendorApi, VendorRequest};

use conversation::{normalize, parse_messages, Role};

const RECENCY: &[&str] = &["hour", "day", "week", "month", "year"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerTool {
    Ask,
    Research,
    Reason,
    Search,
}

impl AnswerTool {
    /// Model the chat tools are routed to; `None` for the raw search tool.
    fn model(self) -> Option<&'static str> {
        match self {
            AnswerTool::Ask => Some("sonar-pro"),
            AnswerTool::Research => Some("sonar-deep-research"),
            AnswerTool::Reason => Some("sonar-reasoning-pro"),
            AnswerTool::Search => None,
        }
    }

    fn instruction(self) -> &'static str {
        match self {
            AnswerTool::Ask => {
                "You are a concise research assistant. Answer the user's question directly \
                 and factually in a few sentences, grounding claims in current sources."
            }
            AnswerTool::Research => {
                "You are a thorough research analyst. Investigate the question across many \
                 independent sources, compare what they say, and produce a well-organized, \
                 comprehensive report that notes disagreements and open questions."
            }
            AnswerTool::Reason => {
                "You are a careful reasoning assistant. Work through the problem step by \
                 step, state your assumptions explicitly, and end with a clearly marked \
                 conclusion."
            }
            AnswerTool::Search => "",
        }
    }
}

/// The `messages` field shared by every chat tool.
fn messages_param() -> ParamSpec {
    ParamSpec::array(
        "messages",
        "Conversation so far, oldest first. Each entry has a role and its text content.",
        ParamKind::Object(vec![
            ParamSpec::string("role", "Speaker of this message")
                .required()
                .one_of(Role::NAMES),
            ParamSpec::string("content", "Message text").required(),
        ]),
    )
    .required()
}

fn max_citations_param() -> ParamSpec {
    ParamSpec::integer(
        "max_citations",
        "Maximum number of citations to list after the answer",
    )
    .range(Some(0), None)
}

fn chat_descriptor(name: &'static str, description: &'static str) -> ToolDescriptor {
    ToolDescriptor::new(name, description, vec![messages_param(), max_citations_param()])
}

impl ToolKind for AnswerTool {
    const ALL: &'static [Self] = &[
        AnswerTool::Ask,
        AnswerTool::Research,
        AnswerTool::Reason,
        AnswerTool::Search,
    ];

    fn name(self) -> &'static str {
        match self {
            AnswerTool::Ask => "answer_ask",
            AnswerTool::Research => "answer_research",
            AnswerTool::Reason => "answer_reason",
            AnswerTool::Search => "answer_search",
        }
    }

    fn descriptor(self) -> ToolDescriptor {
        match self {
            AnswerTool::Ask => chat_descriptor(
                "answer_ask",
                "Ask a question and get a short, sourced answer grounded in live web search.",
            ),
            AnswerTool::Research => chat_descriptor(
                "answer_research",
                "Run in-depth multi-source research on a topic and return a detailed report with citations.",
            ),
            AnswerTool::Reason => chat_descriptor(
                "answer_reason",
                "Solve a problem with explicit step-by-step reasoning and return the conclusion.",
            ),
            AnswerTool::Search => ToolDescriptor::new(
                "answer_search",
                "Search the web and return ranked results with titles, URLs and snippets.",
                vec![
                    ParamSpec::string("query", "Search query").required(),
                    ParamSpec::integer("max_results", "Number of results to return")
                        .range(Some(1), Some(20))
                        .default_value(json!(10)),
                    ParamSpec::string("recency", "Only return results newer than this window")
                        .one_of(RECENCY),
                ],
            ),
        }
    }
}

/// Executes [`AnswerTool`] calls against the vendor.
pub struct AnswerToolbox {
    vendor: Arc<dyn VendorApi>,
    credentials: CredentialResolver,
}

impl AnswerToolbox {
    pub fn new(vendor: Arc<dyn VendorApi>, credentials: CredentialResolver) -> Self {
        Self {
            vendor,
            credentials,
        }
    }

    async fn chat(&self, tool: AnswerTool, model: &str, args: &Arguments) -> Result<String, ToolError> {
        let raw = args
            .raw("messages")
            .ok_or_else(|| ToolError::validation("missing required field `messages`"))?;
        let messages = normalize(tool.instruction(), &parse_messages(raw)?);
        let max_citations = args.integer("max_citations").map(|n| n.max(0) as usize);

        let auth = self.credentials.resolve()?;
        let request = VendorRequest::post(
            "/chat/completions",
            &auth,
            json!({ "model": model, "messages": messages }),
        );
        let body = self.vendor.send(request).await?;

        let mut text = format::completion_text(self.vendor.name(), &body)?;
        if tool == AnswerTool::Reason {
            text = format::strip_reasoning(&text);
        }
        Ok(format::with_citations(
            text,
            &format::citations(&body),
            max_citations,
        ))
    }

    async fn search(&self, args: &Arguments) -> Result<String, ToolError> {
        let query = args.require_str("query")?;
        let max_results = args.integer("max_results").unwrap_or(10);

        let mut payload = json!({ "query": query, "max_results": max_results });
        if let Some(recency) = args.str("recency") {
            payload["search_recency_filter"] = json!(recency);
        }

        let auth = self.credentials.resolve()?;
        let body = self
            .vendor
            .send(VendorRequest::post("/search", &auth, payload))
            .await?;

        Ok(format::search_results(query, &body))
    }
}

#[async_trait]
impl Toolbox for AnswerToolbox {
    type Tool = AnswerTool;

    async fn execute(&self, tool: AnswerTool, args: Arguments) -> Result<String, ToolError> {
        match tool.model() {
            Some(model) => self.chat(tool, model, &args).await,
            None => self.search(&args).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{self, CredentialPolicy, Precedence, RequestContext, TransportKind};
    use crate::tools::{Registry, ToolRegistry};
    use crate::vendor::testing::ScriptedVendor;
    use serde_json::Value;

    fn registry(vendor: Arc<ScriptedVendor>, fallback: Option<&str>) -> Registry<AnswerToolbox> {
        let policy = CredentialPolicy {
            precedence: Precedence::ProcessWide,
            network_fallback: true,
        };
        let resolver = CredentialResolver::new(policy, fallback.map(str::to_string), None);
        Registry::new(AnswerToolbox::new(vendor, resolver)).unwrap()
    }

    fn ctx(token: &str) -> RequestContext {
        RequestContext::new(TransportKind::StreamableHttp).with_credential(token)
    }

    fn completion(content: &str, citations: Value) -> Value {
        json!({ "choices": [{ "message": { "content": content } }], "citations": citations })
    }

    #[test]
    fn test_catalog_shares_messages_schema() {
        let schemas: Vec<Value> = [AnswerTool::Ask, AnswerTool::Research, AnswerTool::Reason]
            .iter()
            .map(|t| t.descriptor().input_schema()["properties"]["messages"].clone())
            .collect();
        assert_eq!(schemas[0], schemas[1]);
        assert_eq!(schemas[1], schemas[2]);
        assert_eq!(
            schemas[0]["items"]["properties"]["role"]["enum"],
            json!(["system", "user", "assistant", "tool"])
        );
    }

    #[test]
    fn test_names_round_trip() {
        for tool in AnswerTool::ALL {
            assert_eq!(AnswerTool::from_name(tool.name()), Some(*tool));
            assert_eq!(tool.descriptor().name, tool.name());
        }
    }

    #[tokio::test]
    async fn test_ask_sends_normalized_conversation() {
        let vendor = Arc::new(ScriptedVendor::new(vec![Ok(completion(
            "Paris",
            json!(["a", "b", "c"]),
        ))]));
        let registry = registry(vendor.clone(), None);

        let result = context::establish(
            ctx("key-1"),
            registry.invoke(
                "answer_ask",
                json!({
                    "messages": [
                        { "role": "user", "content": "Capital of France?" },
                        { "role": "tool", "content": "context" }
                    ],
                    "max_citations": 2
                }),
            ),
        )
        .await;

        assert!(!result.is_error);
        assert_eq!(result.first_text(), "Paris\n\nCitations:\n[1] a\n[2] b");

        let calls = vendor.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].path, "/chat/completions");
        assert_eq!(calls[0].token(), "key-1");
        let body = calls[0].body.as_ref().unwrap();
        assert_eq!(body["model"], "sonar-pro");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Capital of France?\n\ncontext");
        assert_eq!(body["messages"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_reason_strips_think_block() {
        let vendor = Arc::new(ScriptedVendor::new(vec![Ok(completion(
            "<think>scratch</think>42",
            json!([]),
        ))]));
        let registry = registry(vendor.clone(), Some("env-key"));

        let result = registry
            .invoke(
                "answer_reason",
                json!({ "messages": [{ "role": "user", "content": "6*7?" }] }),
            )
            .await;

        assert_eq!(result.first_text(), "42");
        assert_eq!(vendor.calls()[0].token(), "env-key");
        assert_eq!(vendor.calls()[0].body.as_ref().unwrap()["model"], "sonar-reasoning-pro");
    }

    #[tokio::test]
    async fn test_missing_messages_makes_no_vendor_call() {
        let vendor = Arc::new(ScriptedVendor::new(vec![]));
        let registry = registry(vendor.clone(), Some("env-key"));

        let result = registry.invoke("answer_research", json!({})).await;

        assert!(result.is_error);
        assert!(result.first_text().contains("`messages`"));
        assert!(vendor.calls().is_empty());
    }

    #[tokio::test]
    async fn test_no_credential_anywhere_is_auth_error() {
        let vendor = Arc::new(ScriptedVendor::new(vec![]));
        let registry = registry(vendor.clone(), None);

        let result = context::establish(
            RequestContext::new(TransportKind::Sse),
            registry.invoke("answer_search", json!({ "query": "rust" })),
        )
        .await;

        assert!(result.is_error);
        assert!(result.first_text().starts_with("Error: Authentication required"));
        assert!(vendor.calls().is_empty());
    }

    #[tokio::test]
    async fn test_search_payload_and_format() {
        let vendor = Arc::new(ScriptedVendor::new(vec![Ok(json!({
            "results": [{ "title": "Tokio", "url": "https://tokio.rs" }]
        }))]));
        let registry = registry(vendor.clone(), None);

        let result = context::establish(
            ctx("k"),
            registry.invoke(
                "answer_search",
                json!({ "query": "async rust", "max_results": 3, "recency": "week" }),
            ),
        )
        .await;

        assert!(!result.is_error);
        assert!(result.first_text().contains("1. Tokio\n   https://tokio.rs"));
        let body = vendor.calls()[0].body.clone().unwrap();
        assert_eq!(
            body,
            json!({ "query": "async rust", "max_results": 3, "search_recency_filter": "week" })
        );
    }

    #[tokio::test]
    async fn test_vendor_error_is_wrapped() {
        let vendor = Arc::new(ScriptedVendor::new(vec![Err(ToolError::Vendor {
            vendor: "Scripted",
            status: 429,
            message: "rate limited".into(),
        })]));
        let registry = registry(vendor, Some("k"));

        let result = registry
            .invoke(
                "answer_ask",
                json!({ "messages": [{ "role": "user", "content": "hi" }] }),
            )
            .await;

        assert!(result.is_error);
        assert_eq!(
            result.first_text(),
            "Error: Scripted API error (429): rate limited"
        );
    }

    #[tokio::test]
    async fn test_every_tool_succeeds_with_valid_arguments() {
        let conversation = json!({ "messages": [{ "role": "user", "content": "What is Rust?" }] });

        for &tool in AnswerTool::ALL {
            let (args, reply, path) = match tool {
                AnswerTool::Ask | AnswerTool::Research | AnswerTool::Reason => (
                    conversation.clone(),
                    completion("A systems language.", json!(["https://rust-lang.org"])),
                    "/chat/completions",
                ),
                AnswerTool::Search => (
                    json!({ "query": "rust" }),
                    json!({ "results": [{ "title": "Rust", "url": "https://rust-lang.org" }] }),
                    "/search",
                ),
            };
            let vendor = Arc::new(ScriptedVendor::new(vec![Ok(reply)]));
            let registry = registry(vendor.clone(), None);

            let result = context::establish(ctx("k"), registry.invoke(tool.name(), args)).await;

            assert!(!result.is_error, "{}: {}", tool.name(), result.first_text());
            assert!(!result.first_text().trim().is_empty(), "{} returned no text", tool.name());

            let calls = vendor.calls();
            assert_eq!(calls.len(), 1, "{}", tool.name());
            assert_eq!(calls[0].method, crate::vendor::Method::POST);
            assert_eq!(calls[0].path, path);
            let body = calls[0].body.as_ref().unwrap();
            match tool.model() {
                Some(model) => assert_eq!(body["model"], model),
                None => assert_eq!(body["query"], "rust"),
            }
        }
    }
}
