//! Sandboxed tool tests: filesystem and processes only, no inference needed.

use std::fs;
use std::time::{Duration, Instant};

use serde_json::json;

use sandagent::sandbox::SandboxRoot;
use sandagent::tools::fs::{list_directory, read_file, write_file};
use sandagent::tools::{
    Dispatcher, ScriptRunner, ToolError, ToolInvocation, ToolResult, MAX_FILE_CHARS, NO_OUTPUT,
    SCRIPT_TIMEOUT,
};

fn sandbox() -> (tempfile::TempDir, SandboxRoot) {
    let dir = tempfile::tempdir().unwrap();
    let root = SandboxRoot::new(dir.path()).unwrap();
    (dir, root)
}

/// Shell runner so script tests don't depend on a Python install.
fn sh_runner() -> ScriptRunner {
    ScriptRunner::new("sh", &["sh"])
}

// ---------------------------------------------------------------------------
// ListDirectory
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_list_directory_root_default() {
    let (_dir, root) = sandbox();
    fs::write(root.path().join("main.py"), "print('hi')\n").unwrap();
    fs::create_dir(root.path().join("pkg")).unwrap();

    let listing = list_directory(&root, None).await.unwrap();
    let lines: Vec<&str> = listing.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], "- main.py: file_size=12 bytes, is_dir=false");
    assert!(lines[1].starts_with("- pkg: file_size="));
    assert!(lines[1].ends_with("is_dir=true"));
}

#[tokio::test]
async fn test_list_directory_sorted() {
    let (_dir, root) = sandbox();
    for name in ["zeta.txt", "alpha.txt", "mid.txt"] {
        fs::write(root.path().join(name), "").unwrap();
    }
    let listing = list_directory(&root, Some(".")).await.unwrap();
    let names: Vec<&str> = listing
        .lines()
        .map(|l| l.trim_start_matches("- ").split(':').next().unwrap())
        .collect();
    assert_eq!(names, vec!["alpha.txt", "mid.txt", "zeta.txt"]);
}

#[tokio::test]
async fn test_list_directory_escape_blocked() {
    let (_dir, root) = sandbox();
    let err = list_directory(&root, Some("../")).await.unwrap_err();
    assert!(err.is_sandbox_escape());
    assert_eq!(
        err.to_string(),
        "Cannot list \"../\" as it is outside the permitted working directory"
    );
    assert!(list_directory(&root, Some("/bin")).await.is_err());
}

#[tokio::test]
async fn test_list_directory_on_file() {
    let (_dir, root) = sandbox();
    fs::write(root.path().join("main.py"), "").unwrap();
    let err = list_directory(&root, Some("main.py")).await.unwrap_err();
    assert!(matches!(err, ToolError::NotADirectory(_)));
    assert!(matches!(
        list_directory(&root, Some("missing")).await.unwrap_err(),
        ToolError::NotADirectory(_)
    ));
}

// ---------------------------------------------------------------------------
// ReadFile
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_read_file_existing() {
    let (_dir, root) = sandbox();
    fs::write(root.path().join("hello.txt"), "hello world").unwrap();
    assert_eq!(read_file(&root, "hello.txt").await.unwrap(), "hello world");
}

#[tokio::test]
async fn test_read_file_truncates_silently() {
    let (_dir, root) = sandbox();
    fs::write(root.path().join("big.txt"), "a".repeat(10_050)).unwrap();

    let content = read_file(&root, "big.txt").await.unwrap();
    assert_eq!(content.len(), MAX_FILE_CHARS);
    assert_eq!(content.chars().count(), 10_000);
    assert!(content.chars().all(|c| c == 'a'), "no truncation marker expected");
}

#[tokio::test]
async fn test_read_file_nonexistent() {
    let (_dir, root) = sandbox();
    let err = read_file(&root, "nope.txt").await.unwrap_err();
    assert!(matches!(err, ToolError::NotFound(_)));
}

#[tokio::test]
async fn test_read_file_directory_is_not_a_file() {
    let (_dir, root) = sandbox();
    fs::create_dir(root.path().join("pkg")).unwrap();
    let err = read_file(&root, "pkg").await.unwrap_err();
    assert!(matches!(err, ToolError::NotAFile(_)));
}

#[tokio::test]
async fn test_read_file_sandbox_escape_blocked() {
    let (_dir, root) = sandbox();
    let err = read_file(&root, "../../../etc/passwd").await.unwrap_err();
    assert!(err.is_sandbox_escape());
    assert!(err.to_string().contains("\"../../../etc/passwd\""));
    assert!(read_file(&root, "/etc/passwd").await.unwrap_err().is_sandbox_escape());
}

#[tokio::test]
async fn test_read_file_under_regular_file_is_not_found() {
    let (_dir, root) = sandbox();
    fs::write(root.path().join("a.txt"), "plain file").unwrap();

    let err = read_file(&root, "a.txt/b").await.unwrap_err();
    assert!(!err.is_sandbox_escape(), "{err}");
    assert!(matches!(err, ToolError::NotFound(_)));
    assert_eq!(err.to_string(), "File \"a.txt/b\" not found.");
}

#[cfg(unix)]
#[tokio::test]
async fn test_read_file_through_symlink_blocked() {
    let outside = tempfile::tempdir().unwrap();
    fs::write(outside.path().join("secret.txt"), "secret").unwrap();
    let (_dir, root) = sandbox();
    std::os::unix::fs::symlink(
        outside.path().join("secret.txt"),
        root.path().join("innocent.txt"),
    )
    .unwrap();

    let err = read_file(&root, "innocent.txt").await.unwrap_err();
    assert!(err.is_sandbox_escape());
}

// ---------------------------------------------------------------------------
// WriteFile
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_write_file_creates_parents() {
    let (_dir, root) = sandbox();
    let content = "x = 1\ny = 2\n";
    let message = write_file(&root, "pkg/sub/module.py", content).await.unwrap();

    assert_eq!(
        message,
        format!("Successfully wrote to \"pkg/sub/module.py\" ({} bytes written)", content.len())
    );
    assert_eq!(
        fs::read_to_string(root.path().join("pkg/sub/module.py")).unwrap(),
        content
    );
}

#[tokio::test]
async fn test_write_file_overwrites_and_round_trips() {
    let (_dir, root) = sandbox();
    write_file(&root, "notes.txt", "first version, rather long").await.unwrap();
    write_file(&root, "notes.txt", "second").await.unwrap();
    assert_eq!(read_file(&root, "notes.txt").await.unwrap(), "second");
}

#[tokio::test]
async fn test_write_file_reports_bytes_not_chars() {
    let (_dir, root) = sandbox();
    let message = write_file(&root, "u.txt", "héllo").await.unwrap();
    assert!(message.ends_with("(6 bytes written)"), "{message}");
}

#[tokio::test]
async fn test_write_file_escape_blocked() {
    let (dir, root) = sandbox();
    let err = write_file(&root, "../evil.txt", "pwned").await.unwrap_err();
    assert!(err.is_sandbox_escape());
    assert!(!dir.path().parent().unwrap().join("evil.txt").exists());
}

#[tokio::test]
async fn test_write_file_under_regular_file_is_io_failure() {
    let (_dir, root) = sandbox();
    fs::write(root.path().join("a.txt"), "plain file").unwrap();

    let err = write_file(&root, "a.txt/b/c.txt", "data").await.unwrap_err();
    assert!(!err.is_sandbox_escape(), "{err}");
    assert!(matches!(err, ToolError::Io { .. }));
    assert!(err.to_string().starts_with("Cannot write to \"a.txt/b/c.txt\": "));
    assert_eq!(fs::read_to_string(root.path().join("a.txt")).unwrap(), "plain file");
}

#[tokio::test]
async fn test_list_directory_under_regular_file() {
    let (_dir, root) = sandbox();
    fs::write(root.path().join("a.txt"), "").unwrap();
    let err = list_directory(&root, Some("a.txt/sub")).await.unwrap_err();
    assert!(matches!(err, ToolError::NotADirectory(_)));
}

#[tokio::test]
async fn test_write_file_onto_directory_fails() {
    let (_dir, root) = sandbox();
    fs::create_dir(root.path().join("pkg")).unwrap();
    let err = write_file(&root, "pkg", "data").await.unwrap_err();
    assert!(matches!(err, ToolError::Io { .. }));
}

// ---------------------------------------------------------------------------
// RunScript
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_run_script_captures_output() {
    let (_dir, root) = sandbox();
    fs::write(root.path().join("hello.sh"), "echo \"hello $1\"\necho oops >&2\n").unwrap();

    let output = sh_runner()
        .run(&root, "hello.sh", &["world".to_string()])
        .await
        .unwrap();
    assert!(output.success());
    assert_eq!(output.stdout, "hello world\n");
    assert_eq!(output.render(), "STDOUT:hello world\n\nSTDERR:oops\n");
}

#[tokio::test]
async fn test_run_script_uses_root_as_cwd() {
    let (_dir, root) = sandbox();
    fs::create_dir(root.path().join("scripts")).unwrap();
    fs::write(root.path().join("scripts/where.sh"), "pwd\n").unwrap();

    let output = sh_runner().run(&root, "scripts/where.sh", &[]).await.unwrap();
    assert_eq!(
        std::path::Path::new(output.stdout.trim()).canonicalize().unwrap(),
        root.path()
    );
}

#[tokio::test]
async fn test_run_script_silent_success_sentinel() {
    let (_dir, root) = sandbox();
    fs::write(root.path().join("quiet.sh"), "exit 0\n").unwrap();
    let output = sh_runner().run(&root, "quiet.sh", &[]).await.unwrap();
    assert_eq!(output.render(), NO_OUTPUT);
}

#[tokio::test]
async fn test_run_script_silent_failure_reports_exit_code() {
    let (_dir, root) = sandbox();
    fs::write(root.path().join("fail.sh"), "exit 2\n").unwrap();
    let output = sh_runner().run(&root, "fail.sh", &[]).await.unwrap();
    assert_eq!(output.exit_code, Some(2));
    let text = output.render();
    assert!(text.contains("exited with code 2"), "{text}");
    assert_ne!(text, NO_OUTPUT);
}

#[tokio::test]
async fn test_run_script_timeout_kills() {
    let (_dir, root) = sandbox();
    fs::write(root.path().join("slow.sh"), "sleep 35\n").unwrap();
    let runner = sh_runner().with_timeout(Duration::from_secs(1));

    let start = Instant::now();
    let err = runner.run(&root, "slow.sh", &[]).await.unwrap_err();
    assert!(start.elapsed() < Duration::from_secs(10), "should not hang");
    assert!(matches!(err, ToolError::Timeout { timeout, .. } if timeout == Duration::from_secs(1)));
    assert!(err.to_string().contains("timed out after 1s"));
}

#[tokio::test]
async fn test_run_script_subsecond_timeout_message() {
    let (_dir, root) = sandbox();
    fs::write(root.path().join("slow.sh"), "sleep 35\n").unwrap();
    let runner = sh_runner().with_timeout(Duration::from_millis(300));

    let err = runner.run(&root, "slow.sh", &[]).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Execution of \"slow.sh\" timed out after 300ms"
    );
}

#[tokio::test]
async fn test_run_script_missing_file() {
    let (_dir, root) = sandbox();
    let err = sh_runner().run(&root, "nope.sh", &[]).await.unwrap_err();
    assert!(matches!(err, ToolError::NotFound(_)));
}

#[tokio::test]
async fn test_run_script_wrong_extension() {
    let (_dir, root) = sandbox();
    fs::write(root.path().join("data.txt"), "echo hi\n").unwrap();
    let err = sh_runner().run(&root, "data.txt", &[]).await.unwrap_err();
    assert!(matches!(err, ToolError::UnsupportedFileType { .. }));
}

#[cfg(unix)]
#[tokio::test]
async fn test_run_script_extension_checked_on_given_path() {
    let (_dir, root) = sandbox();
    fs::write(root.path().join("notes.txt"), "echo from notes\n").unwrap();
    fs::write(root.path().join("real.sh"), "echo real\n").unwrap();
    std::os::unix::fs::symlink(root.path().join("notes.txt"), root.path().join("run.sh")).unwrap();
    std::os::unix::fs::symlink(root.path().join("real.sh"), root.path().join("runme")).unwrap();

    let output = sh_runner().run(&root, "run.sh", &[]).await.unwrap();
    assert_eq!(output.stdout, "from notes\n");

    let err = sh_runner().run(&root, "runme", &[]).await.unwrap_err();
    assert!(matches!(err, ToolError::UnsupportedFileType { .. }));
}

#[tokio::test]
async fn test_run_script_under_regular_file_not_found() {
    let (_dir, root) = sandbox();
    fs::write(root.path().join("a.sh"), "echo hi\n").unwrap();
    let err = sh_runner().run(&root, "a.sh/b.sh", &[]).await.unwrap_err();
    assert!(matches!(err, ToolError::NotFound(_)), "{err}");
}

#[tokio::test]
async fn test_run_script_escape_blocked() {
    let (_dir, root) = sandbox();
    let err = sh_runner().run(&root, "../other.sh", &[]).await.unwrap_err();
    assert!(err.is_sandbox_escape());
    assert!(err.to_string().starts_with("Cannot execute"));
}

#[tokio::test]
#[ignore = "Requires python3 and takes 30+ seconds"]
async fn test_run_python_default_timeout() {
    let (_dir, root) = sandbox();
    fs::write(root.path().join("sleepy.py"), "import time\ntime.sleep(35)\n").unwrap();

    let start = Instant::now();
    let err = ScriptRunner::default().run(&root, "sleepy.py", &[]).await.unwrap_err();
    assert!(matches!(err, ToolError::Timeout { timeout, .. } if timeout == SCRIPT_TIMEOUT));
    assert!(start.elapsed() < Duration::from_secs(34));
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_dispatch_unknown_function() {
    let (_dir, root) = sandbox();
    let dispatcher = Dispatcher::new(root.clone());

    let result = dispatcher
        .dispatch(&ToolInvocation::new("delete_everything", json!({})))
        .await;
    assert_eq!(
        result,
        ToolResult::Error("Unknown function: delete_everything".to_string())
    );
    assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0, "no state mutation");
}

#[tokio::test]
async fn test_dispatch_write_then_read() {
    let (_dir, root) = sandbox();
    let dispatcher = Dispatcher::new(root);

    let written = dispatcher
        .dispatch(&ToolInvocation::new(
            "write_file",
            json!({"file_path": "out/result.txt", "content": "42"}),
        ))
        .await;
    assert!(!written.is_error(), "{:?}", written);

    let read = dispatcher
        .dispatch(&ToolInvocation::new(
            "get_file_content",
            json!({"file_path": "out/result.txt"}),
        ))
        .await;
    assert_eq!(read, ToolResult::Ok("42".to_string()));
}

#[tokio::test]
async fn test_dispatch_ignores_spoofed_root() {
    let (_dir, root) = sandbox();
    let outside = tempfile::tempdir().unwrap();
    fs::write(outside.path().join("secret.txt"), "secret").unwrap();
    let dispatcher = Dispatcher::new(root);

    let result = dispatcher
        .dispatch(&ToolInvocation::new(
            "get_file_content",
            json!({
                "file_path": "secret.txt",
                "working_directory": outside.path().to_str().unwrap()
            }),
        ))
        .await;
    assert_eq!(
        result,
        ToolResult::Error("File \"secret.txt\" not found.".to_string())
    );
}

#[tokio::test]
async fn test_dispatch_escape_is_error_result() {
    let (_dir, root) = sandbox();
    let dispatcher = Dispatcher::new(root);
    let result = dispatcher
        .dispatch(&ToolInvocation::new(
            "get_files_info",
            json!({"directory": "../.."}),
        ))
        .await;
    assert!(result.is_error());
    assert!(result.text().starts_with("Error: Cannot list"));
}

#[tokio::test]
async fn test_dispatch_malformed_arguments() {
    let (_dir, root) = sandbox();
    let dispatcher = Dispatcher::new(root);
    let result = dispatcher
        .dispatch(&ToolInvocation::new("write_file", json!({"file_path": 7})))
        .await;
    assert!(result.is_error());
    assert!(result.text().contains("Invalid arguments for write_file"));
}

#[tokio::test]
async fn test_dispatch_run_script_with_args() {
    let (_dir, root) = sandbox();
    fs::write(root.path().join("calc.sh"), "echo $(($1 + $2))\n").unwrap();
    let dispatcher = Dispatcher::new(root).with_script_runner(sh_runner());

    let result = dispatcher
        .dispatch(&ToolInvocation::new(
            "run_python_file",
            json!({"file_path": "calc.sh", "args": ["3", "5"]}),
        ))
        .await;
    assert_eq!(result, ToolResult::Ok("STDOUT:8\n\nSTDERR:".to_string()));
}

#[tokio::test]
async fn test_dispatch_nonzero_exit_is_reported_not_raised() {
    let (_dir, root) = sandbox();
    fs::write(root.path().join("boom.sh"), "echo failing >&2\nexit 3\n").unwrap();
    let dispatcher = Dispatcher::new(root).with_script_runner(sh_runner());

    let result = dispatcher
        .dispatch(&ToolInvocation::new("run_python_file", json!({"file_path": "boom.sh"})))
        .await;
    match result {
        ToolResult::Ok(text) => {
            assert!(text.contains("STDERR:failing"));
            assert!(text.ends_with("Process exited with code 3"));
        }
        ToolResult::Error(e) => panic!("expected output, got error {e}"),
    }
}
