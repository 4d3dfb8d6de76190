//! Sandboxed tools the reasoning engine can invoke
//!
//! Every tool resolves its paths through [`SandboxRoot::resolve`] before
//! touching the filesystem. Failures never propagate as Rust errors past the
//! [`Dispatcher`]: they become a [`ToolResult::Error`] that is fed back to the
//! model as ordinary conversation data.
//!
//! # Operations
//!
//! | Name               | Implementation              |
//! |--------------------|-----------------------------|
//! | `get_files_info`   | [`fs::list_directory`]      |
//! | `get_file_content` | [`fs::read_file`]           |
//! | `write_file`       | [`fs::write_file`]          |
//! | `run_python_file`  | [`script::ScriptRunner::run`] |
//!
//! [`SandboxRoot::resolve`]: crate::sandbox::SandboxRoot::resolve

pub mod declarations;
pub mod dispatch;
pub mod fs;
pub mod script;

use std::fmt;

use serde::Serialize;

use crate::sandbox::ResolveError;

pub use declarations::{sandbox_tool_declarations, ToolDeclaration};
pub use dispatch::{Dispatcher, Operation, ToolCall, ToolInvocation, RESERVED_ROOT_KEY};
pub use fs::MAX_FILE_CHARS;
pub use script::{ScriptOutput, ScriptRunner, NO_OUTPUT, SCRIPT_TIMEOUT};

/// What a tool was trying to do with a path, for error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    List,
    Read,
    Write,
    Execute,
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Access::List => "list",
            Access::Read => "read",
            Access::Write => "write to",
            Access::Execute => "execute",
        })
    }
}

/// Errors a tool invocation can end in.
///
/// Paths in messages are the ones the model supplied, never the resolved
/// absolute path.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Cannot {access} \"{path}\" as it is outside the permitted working directory")]
    SandboxEscape { access: Access, path: String },

    #[error("File \"{0}\" not found.")]
    NotFound(String),

    #[error("\"{0}\" is not a regular file")]
    NotAFile(String),

    #[error("\"{0}\" is not a directory")]
    NotADirectory(String),

    #[error("\"{path}\" is not a supported script (expected extension: {expected})")]
    UnsupportedFileType { path: String, expected: String },

    #[error("Execution of \"{path}\" timed out after {timeout:?}")]
    Timeout {
        path: String,
        timeout: std::time::Duration,
    },

    #[error("Unknown function: {0}")]
    UnknownOperation(String),

    #[error("Invalid arguments for {operation}: {reason}")]
    InvalidArguments { operation: String, reason: String },

    #[error("Cannot {access} \"{path}\": {source}")]
    Io {
        access: Access,
        path: String,
        source: std::io::Error,
    },

    #[error("{operation} failed unexpectedly: {message}")]
    Panicked { operation: String, message: String },
}

impl ToolError {
    pub(crate) fn escape(access: Access, path: &str) -> Self {
        ToolError::SandboxEscape {
            access,
            path: path.to_string(),
        }
    }

    /// Map a failed path resolution. Escapes stay escapes; a path that
    /// cannot be walked is an I/O failure on `path`.
    pub(crate) fn unresolved(access: Access, path: &str) -> impl FnOnce(ResolveError) -> Self + '_ {
        move |err| match err {
            ResolveError::Escape(_) => ToolError::escape(access, path),
            ResolveError::Io { source, .. } => ToolError::Io {
                access,
                path: path.to_string(),
                source,
            },
        }
    }

    /// Like [`ToolError::unresolved`], but a path through a non-directory
    /// is reported as [`ToolError::NotFound`].
    pub(crate) fn unresolved_file(access: Access, path: &str) -> impl FnOnce(ResolveError) -> Self + '_ {
        move |err| match err {
            ResolveError::Io { source, .. }
                if source.kind() == std::io::ErrorKind::NotADirectory =>
            {
                ToolError::NotFound(path.to_string())
            }
            err => ToolError::unresolved(access, path)(err),
        }
    }

    /// Adapter for `map_err` on I/O calls made on behalf of `path`.
    pub(crate) fn io(access: Access, path: &str) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| ToolError::Io {
            access,
            path: path.to_string(),
            source,
        }
    }

    pub fn is_sandbox_escape(&self) -> bool {
        matches!(self, ToolError::SandboxEscape { .. })
    }
}

/// Outcome of one tool invocation, as seen by the reasoning engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ToolResult {
    /// The tool ran; the text is its output
    Ok(String),
    /// The tool refused or failed; the text says why
    Error(String),
}

impl ToolResult {
    pub fn is_error(&self) -> bool {
        matches!(self, ToolResult::Error(_))
    }

    /// Plain-text rendering, with an `Error: ` prefix on failures.
    pub fn text(&self) -> String {
        match self {
            ToolResult::Ok(text) => text.clone(),
            ToolResult::Error(message) => format!("Error: {}", message),
        }
    }

    /// Function-response payload: `{"result": ...}` or `{"error": ...}`.
    pub fn to_response_json(&self) -> serde_json::Value {
        match self {
            ToolResult::Ok(text) => serde_json::json!({ "result": text }),
            ToolResult::Error(message) => serde_json::json!({ "error": message }),
        }
    }
}

impl From<Result<String, ToolError>> for ToolResult {
    fn from(result: Result<String, ToolError>) -> Self {
        match result {
            Ok(text) => ToolResult::Ok(text),
            Err(e) => ToolResult::Error(e.to_string()),
        }
    }
}
