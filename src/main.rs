use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use sandagent::agent::{AgentConfig, AgentLoop, MAX_ROUNDS};
use sandagent::ollama::{ChatClient, OllamaEngine};
use sandagent::tools::{Dispatcher, ScriptRunner};
use sandagent::SandboxRoot;

/// Ask an LLM to work on files inside one sandboxed directory.
#[derive(Debug, Parser)]
#[command(name = "sandagent", version)]
struct Cli {
    /// Prompt for the agent (optional with --interactive)
    prompt: Option<String>,

    /// Print tool arguments, the user prompt and token usage
    #[arg(long)]
    verbose: bool,

    /// Read prompts line by line until `quit` or `exit`
    #[arg(long)]
    interactive: bool,

    /// Sandbox root; no tool may act outside it
    #[arg(long, env = "SANDAGENT_WORKDIR", default_value = ".")]
    workdir: PathBuf,

    /// Ollama model name
    #[arg(long, env = "SANDAGENT_MODEL", default_value = "qwen3")]
    model: String,

    /// Ollama server URL
    #[arg(long, env = "OLLAMA_HOST", default_value = "http://localhost:11434")]
    ollama_url: String,

    /// Maximum engine rounds per prompt
    #[arg(long, default_value_t = MAX_ROUNDS)]
    max_rounds: usize,

    /// Interpreter used by run_python_file
    #[arg(long, default_value = "python3")]
    interpreter: String,

    /// Script timeout in seconds
    #[arg(long, default_value_t = 30)]
    script_timeout: u64,

    /// Export traces to this OTLP endpoint
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    otlp_endpoint: Option<String>,

    /// Print Prometheus metrics before exiting
    #[arg(long)]
    metrics: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.prompt.is_none() && !cli.interactive {
        eprintln!("error: not enough arguments");
        return ExitCode::from(1);
    }

    if let Err(e) = sandagent::tracing::init_tracing(
        "sandagent",
        cli.otlp_endpoint.as_deref(),
        cli.verbose,
    ) {
        eprintln!("warning: tracing disabled: {}", e);
    }

    let result = run(&cli).await;

    if cli.metrics {
        print!("{}", sandagent::metrics::render());
    }
    if cli.otlp_endpoint.is_some() {
        sandagent::tracing::shutdown_tracing();
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let root = SandboxRoot::new(&cli.workdir)
        .with_context(|| format!("invalid working directory {}", cli.workdir.display()))?;
    tracing::info!(root = %root.path().display(), model = %cli.model, "Sandbox ready");

    let runner = ScriptRunner {
        interpreter: cli.interpreter.clone(),
        ..ScriptRunner::default()
    }
    .with_timeout(Duration::from_secs(cli.script_timeout));
    let dispatcher = Dispatcher::new(root)
        .with_script_runner(runner)
        .verbose(cli.verbose);

    let engine = OllamaEngine::new(ChatClient::new(cli.ollama_url.clone()), cli.model.clone());
    let config = AgentConfig {
        max_rounds: cli.max_rounds,
        verbose: cli.verbose,
        ..AgentConfig::default()
    };
    let mut agent = AgentLoop::new(engine, dispatcher, config);

    if let Some(prompt) = &cli.prompt {
        answer(&mut agent, prompt).await?;
    }
    if cli.interactive {
        repl(&mut agent).await?;
    }
    Ok(())
}

async fn answer(agent: &mut AgentLoop<OllamaEngine>, prompt: &str) -> Result<()> {
    let outcome = agent.run_turn(prompt).await?;
    println!("{}", outcome.answer);
    tracing::debug!(
        trace_id = %outcome.trace_id,
        rounds = outcome.rounds,
        tool_calls = outcome.tool_calls_made,
        history = agent.conversation().len(),
        "Turn finished"
    );
    Ok(())
}

/// Interactive session: one conversation, one line per user turn.
///
/// Engine failures are reported and the session continues.
async fn repl(agent: &mut AgentLoop<OllamaEngine>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await.context("failed to read stdin")? else {
            break;
        };
        let prompt = line.trim();
        if prompt.is_empty() {
            continue;
        }
        if matches!(prompt, "quit" | "exit") {
            break;
        }

        if let Err(e) = answer(agent, prompt).await {
            eprintln!("error: {:#}", e);
        }
    }
    Ok(())
}
