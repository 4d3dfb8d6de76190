//! Ollama LLM integration module
//!
//! This module provides a client for Ollama's `/api/chat` endpoint with
//! tool calling, and a [`ReasoningEngine`](crate::agent::ReasoningEngine)
//! built on it.

pub mod engine;
pub mod tool_use;

pub use engine::OllamaEngine;
pub use tool_use::{ChatClient, ChatError, ChatMessage, DEFAULT_AGENT_SYSTEM_PROMPT};
