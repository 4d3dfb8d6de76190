//! Conversation history shared between the agent loop and the engine

use serde::{Deserialize, Serialize};

use crate::tools::{ToolInvocation, ToolResult};

/// Who produced a conversation entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
    Tool,
}

/// One piece of an entry, in the order it was produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    Text { text: String },
    ToolCall { invocation: ToolInvocation },
    ToolResponse { name: String, result: ToolResult },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn tool_call(invocation: ToolInvocation) -> Self {
        Part::ToolCall { invocation }
    }

    pub fn as_tool_call(&self) -> Option<&ToolInvocation> {
        match self {
            Part::ToolCall { invocation } => Some(invocation),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationEntry {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl ConversationEntry {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::text(text)],
        }
    }

    pub fn agent(parts: Vec<Part>) -> Self {
        Self {
            role: Role::Agent,
            parts,
        }
    }

    pub fn tool_response(name: impl Into<String>, result: ToolResult) -> Self {
        Self {
            role: Role::Tool,
            parts: vec![Part::ToolResponse {
                name: name.into(),
                result,
            }],
        }
    }

    /// Tool invocations in this entry, in emission order
    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolInvocation> {
        self.parts.iter().filter_map(Part::as_tool_call)
    }

    /// All text parts joined
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Append-only history for one session.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Conversation {
    entries: Vec<ConversationEntry>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: ConversationEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[ConversationEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&ConversationEntry> {
        self.entries.last()
    }
}
