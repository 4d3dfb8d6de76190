//! Reasoning engine boundary
//!
//! The agent loop only needs "given this history, what next?". Concrete
//! engines (see [`crate::ollama::OllamaEngine`]) translate that into wire
//! calls; tests drive the loop with scripted engines.

use async_trait::async_trait;

use super::conversation::{ConversationEntry, Part};
use crate::ollama::ChatError;
use crate::tools::{ToolDeclaration, ToolInvocation};

/// Everything the engine is given for one round
#[derive(Debug, Clone, Copy)]
pub struct EngineRequest<'a> {
    pub history: &'a [ConversationEntry],
    pub tools: &'a [ToolDeclaration],
    pub system_prompt: &'a str,
}

/// Token counters reported by the engine, for diagnostics only
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub response_tokens: u64,
}

impl std::ops::AddAssign for TokenUsage {
    fn add_assign(&mut self, other: Self) {
        self.prompt_tokens += other.prompt_tokens;
        self.response_tokens += other.response_tokens;
    }
}

/// One candidate output: text and tool calls, in the order the model produced them
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Candidate {
    pub parts: Vec<Part>,
}

impl Candidate {
    pub fn new(parts: Vec<Part>) -> Self {
        Self { parts }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(vec![Part::text(text)])
    }

    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolInvocation> {
        self.parts.iter().filter_map(Part::as_tool_call)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineResponse {
    pub candidates: Vec<Candidate>,
    pub usage: Option<TokenUsage>,
}

impl EngineResponse {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self {
            candidates,
            usage: None,
        }
    }

    /// Text of the first candidate, the answer shown to the user
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .map(|candidate| ConversationEntry::agent(candidate.parts.clone()).text())
            .unwrap_or_default()
    }
}

/// Produces the next model response for a conversation.
#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    async fn respond(&self, request: EngineRequest<'_>) -> Result<EngineResponse, ChatError>;

    /// Model name, for logs and metrics
    fn model(&self) -> &str {
        "unknown"
    }
}
