//! Sandboxed script execution.
//!
//! Scripts run under a fixed interpreter with the sandbox root as working
//! directory and a hard timeout. Output is captured, not streamed, and a
//! non-zero exit is reported as ordinary output so the model can react to it.

use std::io;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::{Access, ToolError};
use crate::metrics::SCRIPT_DURATION;
use crate::sandbox::SandboxRoot;

/// Hard limit on a single script execution.
pub const SCRIPT_TIMEOUT: Duration = Duration::from_secs(30);

/// Returned when a script exits cleanly without printing anything.
pub const NO_OUTPUT: &str = "No output produced.";

/// Runs scripts found inside the sandbox.
#[derive(Debug, Clone)]
pub struct ScriptRunner {
    /// Interpreter binary (looked up on `PATH`)
    pub interpreter: String,
    /// Accepted file extensions, without the leading dot
    pub extensions: Vec<String>,
    /// Execution timeout; the child is killed when it expires
    pub timeout: Duration,
}

impl Default for ScriptRunner {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            extensions: vec!["py".to_string()],
            timeout: SCRIPT_TIMEOUT,
        }
    }
}

/// Captured result of a finished script.
#[derive(Debug, Clone)]
pub struct ScriptOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub duration_ms: f64,
}

impl ScriptOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Text handed back to the model.
    ///
    /// Blank output with a clean exit yields [`NO_OUTPUT`]; a non-zero exit
    /// always ends with `Process exited with code N`, even when both streams
    /// are empty.
    pub fn render(&self) -> String {
        let mut text = String::new();
        if !self.stdout.trim().is_empty() || !self.stderr.trim().is_empty() {
            text = format!("STDOUT:{}\nSTDERR:{}", self.stdout, self.stderr);
        }

        let status_line = match self.exit_code {
            Some(0) => None,
            Some(code) => Some(format!("Process exited with code {}", code)),
            None => Some("Process terminated by signal".to_string()),
        };
        if let Some(line) = status_line {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(&line);
        }

        if text.is_empty() {
            NO_OUTPUT.to_string()
        } else {
            text
        }
    }
}

impl ScriptRunner {
    /// Runner for `interpreter`, accepting the given extensions, with the default timeout.
    pub fn new(interpreter: impl Into<String>, extensions: &[&str]) -> Self {
        Self {
            interpreter: interpreter.into(),
            extensions: extensions.iter().map(|e| e.to_string()).collect(),
            timeout: SCRIPT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether `path` has one of the accepted extensions
    pub fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.iter().any(|accepted| accepted == ext))
            .unwrap_or(false)
    }

    /// Run `file_path` with `args`.
    ///
    /// The extension is checked on `file_path` as given, not on a symlink
    /// target.
    ///
    /// The interpreter receives the script path relative to the root, and
    /// runs with the root as its working directory and stdin closed.
    pub async fn run(
        &self,
        root: &SandboxRoot,
        file_path: &str,
        args: &[String],
    ) -> Result<ScriptOutput, ToolError> {
        let path = root
            .resolve(file_path)
            .map_err(ToolError::unresolved_file(Access::Execute, file_path))?;

        match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => {}
            Ok(_) => return Err(ToolError::NotAFile(file_path.to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ToolError::NotFound(file_path.to_string()))
            }
            Err(e) => return Err(ToolError::io(Access::Execute, file_path)(e)),
        }

        if !self.accepts(Path::new(file_path)) {
            return Err(ToolError::UnsupportedFileType {
                path: file_path.to_string(),
                expected: self
                    .extensions
                    .iter()
                    .map(|e| format!(".{}", e))
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        }

        let script = root.relative_to_root(&path).unwrap_or(&path);

        let mut cmd = Command::new(&self.interpreter);
        cmd.arg(script)
            .args(args)
            .current_dir(root.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(interpreter = %self.interpreter, script = %script.display(), ?args, "Spawning script");
        let start = Instant::now();
        let child = cmd
            .spawn()
            .map_err(ToolError::io(Access::Execute, file_path))?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let result = timeout(self.timeout, child.wait_with_output()).await;
        let elapsed = start.elapsed();

        match result {
            Ok(Ok(output)) => {
                let record = ScriptOutput {
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    exit_code: output.status.code(),
                    duration_ms: elapsed.as_secs_f64() * 1000.0,
                };
                let status = if record.success() { "success" } else { "error" };
                SCRIPT_DURATION
                    .with_label_values(&[status])
                    .observe(elapsed.as_secs_f64());
                debug!(
                    exit_code = ?record.exit_code,
                    duration_ms = record.duration_ms,
                    "Script finished"
                );
                Ok(record)
            }
            Ok(Err(e)) => {
                SCRIPT_DURATION
                    .with_label_values(&["error"])
                    .observe(elapsed.as_secs_f64());
                Err(ToolError::io(Access::Execute, file_path)(e))
            }
            Err(_) => {
                SCRIPT_DURATION
                    .with_label_values(&["timeout"])
                    .observe(elapsed.as_secs_f64());
                warn!(script = %file_path, timeout_secs = self.timeout.as_secs(), "Script timed out and was killed");
                Err(ToolError::Timeout {
                    path: file_path.to_string(),
                    timeout: self.timeout,
                })
            }
        }
    }
}
