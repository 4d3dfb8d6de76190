//! Agent module for LLM-driven work inside a sandboxed directory
//!
//! This module provides the agent loop that orchestrates:
//! - A reasoning engine with tool calling (e.g. Ollama /api/chat)
//! - The tool dispatcher and its sandbox root
//! - The append-only conversation history
//!
//! # Architecture
//!
//! ```text
//! User prompt → AgentLoop → ReasoningEngine (history + tool declarations)
//!                  ↓
//!           Candidate parts: text | tool call
//!                  ↓
//!           Dispatcher → fs tools / ScriptRunner
//!                  ↓
//!           SandboxRoot::resolve (every path, before any I/O)
//!                  ↓
//!           ToolResult appended to conversation
//!                  ↓
//!           Next round → or Done (no tool calls / round limit)
//! ```

pub mod controller;
pub mod conversation;
pub mod engine;

pub use controller::{
    AgentConfig, AgentError, AgentLoop, LoopState, TurnOutcome, MAX_ROUNDS, MAX_ROUNDS_MESSAGE,
};
pub use conversation::{Conversation, ConversationEntry, Part, Role};
pub use engine::{Candidate, EngineRequest, EngineResponse, ReasoningEngine, TokenUsage};
