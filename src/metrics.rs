//! Prometheus metrics for agent turns and sandboxed tool calls
//!
//! All metrics live in the default registry; [`render`] returns them in the
//! text exposition format.

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram, register_histogram_vec, CounterVec, Encoder,
    Histogram, HistogramVec, TextEncoder,
};

lazy_static! {
    // ─────────────────────────────────────────────────────────────────────────────
    // Agent Loop Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// User turns handled, by outcome.
    ///
    /// Labels:
    /// - outcome: "answered", "max_rounds" or "engine_error"
    pub static ref AGENT_TURNS: CounterVec = register_counter_vec!(
        "sandagent_agent_turns_total",
        "User turns handled by the agent loop",
        &["outcome"]
    ).expect("failed to register AGENT_TURNS metric");

    /// Rounds (engine calls) needed per user turn.
    pub static ref AGENT_ROUNDS: Histogram = register_histogram!(
        "sandagent_agent_rounds",
        "Engine rounds per user turn",
        vec![1.0, 2.0, 3.0, 5.0, 8.0, 13.0, 20.0]
    ).expect("failed to register AGENT_ROUNDS metric");

    /// Latency of a single engine call.
    ///
    /// Labels:
    /// - model: model name the engine was asked for
    pub static ref ENGINE_CALL_TIME: HistogramVec = register_histogram_vec!(
        "sandagent_engine_call_seconds",
        "Reasoning engine call latency",
        &["model"],
        vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
    ).expect("failed to register ENGINE_CALL_TIME metric");

    // ─────────────────────────────────────────────────────────────────────────────
    // Tool Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Tool invocations, by operation and status.
    ///
    /// Labels:
    /// - tool: operation name, or "unknown" for names outside the table
    /// - status: "ok" or "error"
    pub static ref TOOL_CALLS: CounterVec = register_counter_vec!(
        "sandagent_tool_calls_total",
        "Tool invocations dispatched",
        &["tool", "status"]
    ).expect("failed to register TOOL_CALLS metric");

    /// Paths rejected by the sandbox guard, by operation.
    pub static ref SANDBOX_VIOLATIONS: CounterVec = register_counter_vec!(
        "sandagent_sandbox_violations_total",
        "Tool paths rejected for escaping the sandbox root",
        &["tool"]
    ).expect("failed to register SANDBOX_VIOLATIONS metric");

    /// Wall-clock time of script executions, including timeouts.
    ///
    /// Labels:
    /// - status: "success", "error" or "timeout"
    pub static ref SCRIPT_DURATION: HistogramVec = register_histogram_vec!(
        "sandagent_script_duration_seconds",
        "Script execution duration",
        &["status"],
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0]
    ).expect("failed to register SCRIPT_DURATION metric");
}

/// Encode every registered metric in the Prometheus text format.
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::warn!(error = %e, "failed to encode metrics");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
