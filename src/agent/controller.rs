//! Agent loop - bounded rounds of engine responses and sandboxed tool calls
//!
//! Each user turn runs a small state machine:
//!
//! ```text
//!            ┌──────────────────────────┐  ≥1 tool call   ┌────────────────┐
//! user ────► │  AwaitingEngineResponse  │ ──────────────► │ ExecutingTools │
//!            └──────────────────────────┘ ◄────────────── └────────────────┘
//!               │ 0 tool calls     │ round limit
//!               ▼                  ▼
//!             Done(answer)       Done(MAX_ROUNDS_MESSAGE)
//! ```

use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::conversation::{Conversation, ConversationEntry};
use super::engine::{Candidate, EngineRequest, EngineResponse, ReasoningEngine, TokenUsage};
use crate::metrics::{AGENT_ROUNDS, AGENT_TURNS, ENGINE_CALL_TIME};
use crate::ollama::{ChatError, DEFAULT_AGENT_SYSTEM_PROMPT};
use crate::tools::{sandbox_tool_declarations, Dispatcher, ToolDeclaration};

/// Upper bound on engine rounds per user turn
pub const MAX_ROUNDS: usize = 20;

/// Answer returned when a turn hits the round limit
pub const MAX_ROUNDS_MESSAGE: &str = "Reached maximum internal steps without a final answer.";

/// Configuration for the agent loop
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Maximum number of engine rounds per user turn
    pub max_rounds: usize,
    /// Custom system prompt (uses default if None)
    pub system_prompt: Option<String>,
    /// Print the user prompt and token usage per round
    pub verbose: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_rounds: MAX_ROUNDS,
            system_prompt: None,
            verbose: false,
        }
    }
}

/// Result of one user turn
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Final text for the user, or [`MAX_ROUNDS_MESSAGE`]
    pub answer: String,
    /// Engine rounds used
    pub rounds: usize,
    /// Tool invocations dispatched
    pub tool_calls_made: usize,
    /// True when the turn ended on the round limit
    pub exhausted: bool,
    /// Unique trace ID for this turn
    pub trace_id: String,
    /// Token usage summed over all rounds
    pub usage: TokenUsage,
}

/// States of a single user turn
#[derive(Debug, Clone, PartialEq)]
pub enum LoopState {
    AwaitingEngineResponse,
    ExecutingTools(Vec<Candidate>),
    Done { answer: String, exhausted: bool },
}

/// Error type for agent operations
#[derive(Debug)]
pub enum AgentError {
    /// The reasoning engine could not produce a response
    Engine(ChatError),
}

impl std::fmt::Display for AgentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentError::Engine(e) => write!(f, "Reasoning engine error: {}", e),
        }
    }
}

impl std::error::Error for AgentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AgentError::Engine(e) => Some(e),
        }
    }
}

impl From<ChatError> for AgentError {
    fn from(e: ChatError) -> Self {
        AgentError::Engine(e)
    }
}

/// Drives the conversation between the engine and the sandboxed tools.
///
/// Owns the conversation for the whole session; interactive use keeps one
/// `AgentLoop` alive across turns.
pub struct AgentLoop<E> {
    engine: E,
    dispatcher: Dispatcher,
    config: AgentConfig,
    tools: Vec<ToolDeclaration>,
    conversation: Conversation,
}

impl<E: ReasoningEngine> AgentLoop<E> {
    /// Create a new agent loop
    ///
    /// # Arguments
    /// * `engine` - Source of model responses
    /// * `dispatcher` - Executes tool calls inside the sandbox
    /// * `config` - Agent configuration
    pub fn new(engine: E, dispatcher: Dispatcher, config: AgentConfig) -> Self {
        Self {
            engine,
            dispatcher,
            config,
            tools: sandbox_tool_declarations(),
            conversation: Conversation::new(),
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Handle one user turn
    ///
    /// Tool failures never end the turn; they are appended to the
    /// conversation for the engine to read. Only an engine failure is
    /// returned as an error.
    pub async fn run_turn(&mut self, prompt: &str) -> Result<TurnOutcome, AgentError> {
        let trace_id = Uuid::now_v7().to_string();
        let span = info_span!(
            "agent_turn",
            trace_id = %trace_id,
            model = %self.engine.model(),
            otel.name = "agent_turn"
        );

        let result = self.drive(prompt, &trace_id).instrument(span).await;
        match &result {
            Ok(outcome) => {
                let label = if outcome.exhausted { "max_rounds" } else { "answered" };
                AGENT_TURNS.with_label_values(&[label]).inc();
                AGENT_ROUNDS.observe(outcome.rounds as f64);
            }
            Err(_) => AGENT_TURNS.with_label_values(&["engine_error"]).inc(),
        }
        result
    }

    async fn drive(&mut self, prompt: &str, trace_id: &str) -> Result<TurnOutcome, AgentError> {
        info!(trace_id = %trace_id, "Starting agent turn");
        if self.config.verbose {
            println!("User prompt: {}", prompt);
        }
        self.conversation.push(ConversationEntry::user(prompt));

        let mut state = LoopState::AwaitingEngineResponse;
        let mut rounds = 0;
        let mut tool_calls_made = 0;
        let mut usage = TokenUsage::default();

        loop {
            state = match state {
                LoopState::AwaitingEngineResponse if rounds >= self.config.max_rounds => {
                    warn!(trace_id = %trace_id, rounds, "Round limit reached");
                    LoopState::Done {
                        answer: MAX_ROUNDS_MESSAGE.to_string(),
                        exhausted: true,
                    }
                }
                LoopState::AwaitingEngineResponse => {
                    rounds += 1;
                    let response = self.call_engine(rounds, trace_id).await?;
                    if let Some(round_usage) = response.usage {
                        usage += round_usage;
                    }

                    let has_tool_calls = response
                        .candidates
                        .iter()
                        .any(|candidate| candidate.tool_calls().next().is_some());
                    if has_tool_calls {
                        LoopState::ExecutingTools(response.candidates)
                    } else {
                        let answer = response.text();
                        for candidate in response.candidates {
                            self.conversation
                                .push(ConversationEntry::agent(candidate.parts));
                        }
                        LoopState::Done {
                            answer,
                            exhausted: false,
                        }
                    }
                }
                LoopState::ExecutingTools(candidates) => {
                    for candidate in candidates {
                        let calls: Vec<_> = candidate.tool_calls().cloned().collect();
                        self.conversation
                            .push(ConversationEntry::agent(candidate.parts));
                        for call in calls {
                            let result = self.dispatcher.dispatch(&call).await;
                            debug!(trace_id = %trace_id, tool = %call.name, is_error = result.is_error(), "Tool result appended");
                            self.conversation
                                .push(ConversationEntry::tool_response(call.name, result));
                            tool_calls_made += 1;
                        }
                    }
                    LoopState::AwaitingEngineResponse
                }
                LoopState::Done { answer, exhausted } => {
                    info!(trace_id = %trace_id, rounds, tool_calls = tool_calls_made, exhausted, "Agent turn completed");
                    return Ok(TurnOutcome {
                        answer,
                        rounds,
                        tool_calls_made,
                        exhausted,
                        trace_id: trace_id.to_string(),
                        usage,
                    });
                }
            };
        }
    }

    async fn call_engine(&self, round: usize, trace_id: &str) -> Result<EngineResponse, AgentError> {
        let system_prompt = self
            .config
            .system_prompt
            .as_deref()
            .unwrap_or(DEFAULT_AGENT_SYSTEM_PROMPT);
        let request = EngineRequest {
            history: self.conversation.entries(),
            tools: &self.tools,
            system_prompt,
        };

        let span = info_span!("engine_call", trace_id = %trace_id, round, otel.name = "engine_call");
        let start = std::time::Instant::now();
        let response = self.engine.respond(request).instrument(span).await;
        let duration_secs = start.elapsed().as_secs_f64();
        ENGINE_CALL_TIME
            .with_label_values(&[self.engine.model()])
            .observe(duration_secs);

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                warn!(trace_id = %trace_id, round, error = %e, "Engine call failed");
                return Err(e.into());
            }
        };
        debug!(trace_id = %trace_id, round, candidates = response.candidates.len(), duration_secs, "Engine responded");

        if self.config.verbose {
            if let Some(usage) = response.usage {
                println!("Prompt tokens: {}", usage.prompt_tokens);
                println!("Response tokens: {}", usage.response_tokens);
            }
        }
        Ok(response)
    }
}
