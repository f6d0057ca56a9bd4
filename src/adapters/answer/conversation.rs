//! Conversation normalization for the chat endpoint.
//!
//! The vendor accepts one leading system message followed by strictly alternating
//! user/assistant turns. Callers may send anything, so the sequence is rebuilt:
//! the tool's own instruction goes first, caller system messages are dropped, tool
//! output counts as user input, and runs of the same role are merged.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ToolError;

/// Separator used when merging consecutive turns of one role.
const TURN_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub const NAMES: &'static [&'static str] = &["system", "user", "assistant", "tool"];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Decode the validated `messages` argument.
pub fn parse_messages(raw: &Value) -> Result<Vec<Message>, ToolError> {
    serde_json::from_value(raw.clone())
        .map_err(|e| ToolError::validation(format!("field `messages` is malformed: {}", e)))
}

/// Rebuild `messages` behind `instruction` so roles strictly alternate.
///
/// Assistant turns that arrive before any user turn are dropped since the vendor
/// requires the first non-system turn to come from the user.
pub fn normalize(instruction: &str, messages: &[Message]) -> Vec<Message> {
    let mut out = Vec::with_capacity(messages.len() + 1);
    out.push(Message::new(Role::System, instruction));

    for message in messages {
        let role = match message.role {
            Role::System => continue,
            Role::User | Role::Tool => Role::User,
            Role::Assistant => Role::Assistant,
        };

        let last_role = out.last().map(|m| m.role);
        if last_role == Some(role) {
            if let Some(last) = out.last_mut() {
                last.content.push_str(TURN_SEPARATOR);
                last.content.push_str(&message.content);
            }
        } else if role == Role::Assistant && out.len() == 1 {
            tracing::debug!("Dropping assistant turn that precedes any user turn");
        } else {
            out.push(Message::new(role, message.content.clone()));
        }
    }

    out
}
