//! Dispatch of untrusted tool invocations onto the sandboxed tool set.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, info_span, warn, Instrument};

use super::script::ScriptRunner;
use super::{fs, ToolError, ToolResult};
use crate::metrics::{SANDBOX_VIOLATIONS, TOOL_CALLS};
use crate::sandbox::SandboxRoot;

/// Argument key under which callers historically passed the sandbox root.
///
/// The dispatcher always supplies its own root; a value under this key in
/// an incoming invocation is discarded.
pub const RESERVED_ROOT_KEY: &str = "working_directory";

/// The fixed set of operations the model may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetFilesInfo,
    GetFileContent,
    WriteFile,
    RunPythonFile,
}

impl Operation {
    pub const ALL: [Operation; 4] = [
        Operation::GetFilesInfo,
        Operation::GetFileContent,
        Operation::WriteFile,
        Operation::RunPythonFile,
    ];

    /// Wire name used in declarations and invocations
    pub fn name(self) -> &'static str {
        match self {
            Operation::GetFilesInfo => "get_files_info",
            Operation::GetFileContent => "get_file_content",
            Operation::WriteFile => "write_file",
            Operation::RunPythonFile => "run_python_file",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.name() == name)
    }
}

/// A tool invocation as requested by the reasoning engine. Untrusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl ToolInvocation {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

#[derive(Deserialize)]
struct GetFilesInfoArgs {
    #[serde(default)]
    directory: Option<String>,
}

#[derive(Deserialize)]
struct GetFileContentArgs {
    file_path: String,
}

#[derive(Deserialize)]
struct WriteFileArgs {
    file_path: String,
    content: String,
}

#[derive(Deserialize)]
struct RunPythonFileArgs {
    file_path: String,
    #[serde(default)]
    args: Option<Vec<String>>,
}

/// A structurally validated invocation, one variant per operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    GetFilesInfo { directory: Option<String> },
    GetFileContent { file_path: String },
    WriteFile { file_path: String, content: String },
    RunPythonFile { file_path: String, args: Vec<String> },
}

impl ToolCall {
    /// Validate an untrusted invocation into a typed call.
    ///
    /// Arguments may arrive as an object, as `null`, or as a string holding
    /// a JSON object (some models encode them that way).
    pub fn parse(invocation: &ToolInvocation) -> Result<Self, ToolError> {
        let operation = Operation::from_name(&invocation.name)
            .ok_or_else(|| ToolError::UnknownOperation(invocation.name.clone()))?;
        let invalid = |reason: String| ToolError::InvalidArguments {
            operation: operation.name().to_string(),
            reason,
        };

        let mut arguments = match &invocation.arguments {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            Value::String(raw) => serde_json::from_str::<Map<String, Value>>(raw)
                .map_err(|e| invalid(format!("arguments string is not a JSON object: {}", e)))?,
            other => return Err(invalid(format!("expected an object, got {}", other))),
        };

        if arguments.remove(RESERVED_ROOT_KEY).is_some() {
            warn!(
                tool = operation.name(),
                "Discarding caller-supplied {} argument", RESERVED_ROOT_KEY
            );
        }
        let arguments = Value::Object(arguments);
        let parse_err = |e: serde_json::Error| invalid(e.to_string());

        Ok(match operation {
            Operation::GetFilesInfo => {
                let args: GetFilesInfoArgs = serde_json::from_value(arguments).map_err(parse_err)?;
                ToolCall::GetFilesInfo {
                    directory: args.directory,
                }
            }
            Operation::GetFileContent => {
                let args: GetFileContentArgs =
                    serde_json::from_value(arguments).map_err(parse_err)?;
                ToolCall::GetFileContent {
                    file_path: args.file_path,
                }
            }
            Operation::WriteFile => {
                let args: WriteFileArgs = serde_json::from_value(arguments).map_err(parse_err)?;
                ToolCall::WriteFile {
                    file_path: args.file_path,
                    content: args.content,
                }
            }
            Operation::RunPythonFile => {
                let args: RunPythonFileArgs =
                    serde_json::from_value(arguments).map_err(parse_err)?;
                ToolCall::RunPythonFile {
                    file_path: args.file_path,
                    args: args.args.unwrap_or_default(),
                }
            }
        })
    }

    pub fn operation(&self) -> Operation {
        match self {
            ToolCall::GetFilesInfo { .. } => Operation::GetFilesInfo,
            ToolCall::GetFileContent { .. } => Operation::GetFileContent,
            ToolCall::WriteFile { .. } => Operation::WriteFile,
            ToolCall::RunPythonFile { .. } => Operation::RunPythonFile,
        }
    }
}

/// Routes invocations to the tool set, always against its own sandbox root.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    root: SandboxRoot,
    runner: ScriptRunner,
    verbose: bool,
}

impl Dispatcher {
    pub fn new(root: SandboxRoot) -> Self {
        Self {
            root,
            runner: ScriptRunner::default(),
            verbose: false,
        }
    }

    pub fn with_script_runner(mut self, runner: ScriptRunner) -> Self {
        self.runner = runner;
        self
    }

    /// Print full argument mappings in the trace line
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn root(&self) -> &SandboxRoot {
        &self.root
    }

    /// Execute one invocation. Never fails: every problem becomes a [`ToolResult::Error`].
    pub async fn dispatch(&self, invocation: &ToolInvocation) -> ToolResult {
        if self.verbose {
            println!(
                " - Calling function: {}({})",
                invocation.name, invocation.arguments
            );
        } else {
            println!(" - Calling function: {}", invocation.name);
        }

        // Untrusted names stay out of metric labels.
        let label = Operation::from_name(&invocation.name)
            .map(Operation::name)
            .unwrap_or("unknown");
        let span = info_span!("tool_call", tool = label, otel.name = "tool_call");
        let start = Instant::now();

        let result = guard_panics(&invocation.name, self.execute(invocation))
            .instrument(span)
            .await;

        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
        match &result {
            Ok(_) => {
                TOOL_CALLS.with_label_values(&[label, "ok"]).inc();
                info!(tool = label, duration_ms, "Tool call succeeded");
            }
            Err(e) => {
                TOOL_CALLS.with_label_values(&[label, "error"]).inc();
                if e.is_sandbox_escape() {
                    SANDBOX_VIOLATIONS.with_label_values(&[label]).inc();
                    warn!(tool = label, error = %e, "Sandbox escape attempt rejected");
                } else {
                    info!(tool = label, duration_ms, error = %e, "Tool call failed");
                }
            }
        }

        ToolResult::from(result)
    }

    async fn execute(&self, invocation: &ToolInvocation) -> Result<String, ToolError> {
        match ToolCall::parse(invocation)? {
            ToolCall::GetFilesInfo { directory } => {
                fs::list_directory(&self.root, directory.as_deref()).await
            }
            ToolCall::GetFileContent { file_path } => fs::read_file(&self.root, &file_path).await,
            ToolCall::WriteFile { file_path, content } => {
                fs::write_file(&self.root, &file_path, &content).await
            }
            ToolCall::RunPythonFile { file_path, args } => self
                .runner
                .run(&self.root, &file_path, &args)
                .await
                .map(|output| output.render()),
        }
    }
}

/// Run a tool future, turning a panic inside it into [`ToolError::Panicked`].
async fn guard_panics<F>(operation: &str, tool: F) -> Result<String, ToolError>
where
    F: Future<Output = Result<String, ToolError>>,
{
    match AssertUnwindSafe(tool).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(ToolError::Panicked {
            operation: operation.to_string(),
            message: panic_message(panic.as_ref()),
        }),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic".to_string()
    }
}
