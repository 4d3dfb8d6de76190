//! Ollama-backed reasoning engine
//!
//! Translates the agent's conversation into `/api/chat` messages and the
//! reply back into candidate parts.

use async_trait::async_trait;
use tracing::debug;

use super::tool_use::{
    parse_tool_calls_from_text, ChatClient, ChatError, ChatMessage, FunctionCall, Tool, ToolCall,
};
use crate::agent::{
    Candidate, ConversationEntry, EngineRequest, EngineResponse, Part, ReasoningEngine, Role,
    TokenUsage,
};
use crate::tools::ToolInvocation;

/// A [`ReasoningEngine`] talking to a local or remote Ollama server
#[derive(Debug, Clone)]
pub struct OllamaEngine {
    client: ChatClient,
    model: String,
}

impl OllamaEngine {
    pub fn new(client: ChatClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl ReasoningEngine for OllamaEngine {
    async fn respond(&self, request: EngineRequest<'_>) -> Result<EngineResponse, ChatError> {
        let messages = to_chat_messages(request.system_prompt, request.history);
        let tools: Vec<Tool> = request.tools.iter().map(Tool::from).collect();

        let response = self
            .client
            .chat(&messages, &self.model, Some(tools.as_slice()))
            .await?;
        debug!(
            model = %self.model,
            done = response.done,
            eval_duration_ns = response.eval_duration,
            "Chat response received"
        );

        Ok(EngineResponse {
            candidates: vec![to_candidate(&response.message)],
            usage: Some(TokenUsage {
                prompt_tokens: response.prompt_eval_count,
                response_tokens: response.eval_count,
            }),
        })
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Build the `/api/chat` message list: system prompt first, then history.
pub fn to_chat_messages(system_prompt: &str, history: &[ConversationEntry]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(ChatMessage::system(system_prompt));

    for entry in history {
        match entry.role {
            Role::User => messages.push(ChatMessage::user(entry.text())),
            Role::Agent => {
                let mut message = ChatMessage::assistant(entry.text());
                let calls: Vec<ToolCall> = entry
                    .tool_calls()
                    .map(|invocation| ToolCall {
                        function: FunctionCall {
                            name: invocation.name.clone(),
                            arguments: invocation.arguments.clone(),
                        },
                    })
                    .collect();
                if !calls.is_empty() {
                    message.tool_calls = Some(calls);
                }
                messages.push(message);
            }
            Role::Tool => {
                for part in &entry.parts {
                    if let Part::ToolResponse { name, result } = part {
                        messages.push(ChatMessage::tool(
                            name.clone(),
                            result.to_response_json().to_string(),
                        ));
                    }
                }
            }
        }
    }
    messages
}

/// Convert an assistant message into candidate parts.
///
/// Native `tool_calls` are preferred; otherwise tool calls written as JSON
/// in the text are recovered, and the text is dropped since it was the call.
pub fn to_candidate(message: &ChatMessage) -> Candidate {
    let native = message
        .tool_calls
        .clone()
        .filter(|calls| !calls.is_empty());

    let mut parts = Vec::new();
    let calls = match native {
        Some(calls) => {
            if !message.content.trim().is_empty() {
                parts.push(Part::text(message.content.clone()));
            }
            calls
        }
        None => {
            let parsed = parse_tool_calls_from_text(&message.content);
            if parsed.is_empty() && !message.content.is_empty() {
                parts.push(Part::text(message.content.clone()));
            }
            parsed
        }
    };

    parts.extend(calls.into_iter().map(|call| {
        Part::tool_call(ToolInvocation::new(call.function.name, call.function.arguments))
    }));
    Candidate::new(parts)
}
