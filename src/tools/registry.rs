use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ToolError;
use crate::tools::schema::{ArgumentValidator, Arguments, ToolDescriptor};

/// A closed set of tools, one enum variant per tool.
///
/// Adapters implement this with exhaustive matches so that adding a variant
/// without a descriptor or an executor arm fails to compile.
pub trait ToolKind: Copy + Send + Sync + 'static {
    /// Every tool, in catalog order.
    const ALL: &'static [Self];

    fn name(self) -> &'static str;

    fn descriptor(self) -> ToolDescriptor;

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|tool| tool.name() == name)
    }
}

/// Executes validated calls for one adapter's tools.
#[async_trait]
pub trait Toolbox: Send + Sync + 'static {
    type Tool: ToolKind;

    /// Run `tool`. Returns the formatted text of a success envelope.
    async fn execute(&self, tool: Self::Tool, args: Arguments) -> Result<String, ToolError>;
}

/// What the transport front needs from an adapter.
#[async_trait]
pub trait ToolRegistry: Send + Sync {
    fn list_tools(&self) -> &[ToolDescriptor];

    /// Never fails: every outcome is an envelope.
    async fn invoke(&self, name: &str, arguments: Value) -> ToolResult;
}

/// Static catalog plus executor for one adapter.
pub struct Registry<B: Toolbox> {
    toolbox: B,
    descriptors: Vec<ToolDescriptor>,
    // Parallel to `descriptors`.
    validators: Vec<ArgumentValidator>,
}

impl<B: Toolbox> Registry<B> {
    /// Build the catalog and compile every tool's input schema.
    pub fn new(toolbox: B) -> anyhow::Result<Self> {
        let descriptors: Vec<ToolDescriptor> = B::Tool::ALL
            .iter()
            .map(|tool| tool.descriptor())
            .collect();

        for (i, d) in descriptors.iter().enumerate() {
            if descriptors[..i].iter().any(|o| o.name == d.name) {
                anyhow::bail!("duplicate tool name `{}`", d.name);
            }
        }

        let validators = descriptors
            .iter()
            .map(ArgumentValidator::compile)
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Self {
            toolbox,
            descriptors,
            validators,
        })
    }

    pub fn toolbox(&self) -> &B {
        &self.toolbox
    }
}

#[async_trait]
impl<B: Toolbox> ToolRegistry for Registry<B> {
    fn list_tools(&self) -> &[ToolDescriptor] {
        &self.descriptors
    }

    async fn invoke(&self, name: &str, arguments: Value) -> ToolResult {
        let Some(tool) = B::Tool::from_name(name) else {
            tracing::warn!(tool = %name, "Unknown tool requested");
            metrics::counter!("tool_calls_total", "tool" => "unknown", "outcome" => "error")
                .increment(1);
            return ToolResult::error(format!("Unknown tool: {}", name));
        };

        let start = Instant::now();
        let tool_name = tool.name();
        let outcome = match self.descriptors.iter().position(|d| d.name == tool_name) {
            Some(i) => match self.validators[i].validate(&arguments) {
                Ok(args) => self.toolbox.execute(tool, args).await,
                Err(e) => Err(e),
            },
            None => Err(ToolError::validation(format!(
                "no descriptor registered for `{}`",
                tool_name
            ))),
        };
        let elapsed_ms = start.elapsed().as_millis() as u64;

        metrics::histogram!("tool_call_latency_ms", "tool" => tool_name).record(elapsed_ms as f64);

        match outcome {
            Ok(text) => {
                tracing::info!(tool = tool_name, elapsed_ms, "Tool call succeeded");
                metrics::counter!("tool_calls_total", "tool" => tool_name, "outcome" => "ok")
                    .increment(1);
                ToolResult::text(text)
            }
            Err(e) => {
                tracing::warn!(
                    tool = tool_name,
                    elapsed_ms,
                    kind = e.kind(),
                    error = %e,
                    "Tool call failed"
                );
                metrics::counter!("tool_calls_total", "tool" => tool_name, "outcome" => "error")
                    .increment(1);
                ToolResult::failure(&e)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
}

/// Envelope returned for every tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub content: Vec<ContentBlock>,
    pub is_error: bool,
}

impl ToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::Text { text: text.into() }],
            is_error: false,
        }
    }

    /// Failure envelope carrying `text` verbatim.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::Text { text: text.into() }],
            is_error: true,
        }
    }

    /// Failure envelope for an executor error, marked with an `Error:` prefix.
    pub fn failure(err: &ToolError) -> Self {
        Self::error(format!("Error: {}", err))
    }

    /// Text of the first content block.
    pub fn first_text(&self) -> &str {
        match self.content.first() {
            Some(ContentBlock::Text { text }) => text,
            None => "",
        }
    }
}
