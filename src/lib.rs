//! sandagent - a bounded LLM agent confined to one working directory
//!
//! A reasoning engine may list, read and write files and run scripts, but
//! only inside a single sandbox root. Every path it supplies is resolved and
//! checked before any I/O, every failure comes back to it as a tool result,
//! and every user turn is capped at a fixed number of rounds.
//!
//! # Modules
//!
//! - `sandbox` - Sandbox root and path confinement
//! - `tools` - The four sandboxed operations and the dispatcher
//! - `agent` - The agent loop, conversation model and engine trait
//! - `ollama` - Ollama `/api/chat` client and engine adapter
//! - `metrics` - Prometheus metrics for observability
//! - `tracing` - Logging and optional OpenTelemetry export
//!
//! # Quick Start
//!
//! ```ignore
//! use sandagent::{AgentConfig, AgentLoop, Dispatcher, SandboxRoot};
//! use sandagent::ollama::{ChatClient, OllamaEngine};
//!
//! let root = SandboxRoot::new("./calculator")?;
//! let engine = OllamaEngine::new(ChatClient::new("http://localhost:11434"), "qwen3");
//! let mut agent = AgentLoop::new(engine, Dispatcher::new(root), AgentConfig::default());
//! let outcome = agent.run_turn("What files are in the root?").await?;
//! println!("{}", outcome.answer);
//! ```

pub mod agent;
pub mod metrics;
pub mod ollama;
pub mod sandbox;
pub mod tools;
pub mod tracing;

// Re-export commonly used types at crate root for convenience
pub use agent::{AgentConfig, AgentError, AgentLoop, ReasoningEngine, TurnOutcome};
pub use sandbox::{EscapeError, ResolveError, SandboxRoot};
pub use tools::{Dispatcher, ScriptRunner, ToolInvocation, ToolResult};
