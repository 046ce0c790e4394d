//! Child process execution with timeouts.
//!
//! Processes are spawned with `kill_on_drop`, so a timed-out or cancelled run
//! never leaves a tool running in the background.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::traits::RawOutput;
use crate::error::{Result, TidyError};

/// Run `argv` in `cwd`, returning captured output.
///
/// A timeout is not an error: it yields `RawOutput` with `timed_out` set.
/// Failing to spawn the process is a `ToolExecution` error.
pub async fn run_command(argv: &[String], cwd: &Path, timeout: Duration) -> Result<RawOutput> {
    run(argv, cwd, None, timeout).await
}

/// Like [`run_command`], feeding `input` to the process on stdin.
pub async fn run_with_stdin(argv: &[String], cwd: &Path, input: &str, timeout: Duration) -> Result<RawOutput> {
    run(argv, cwd, Some(input), timeout).await
}

async fn run(argv: &[String], cwd: &Path, input: Option<&str>, timeout: Duration) -> Result<RawOutput> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| TidyError::ToolExecution("Empty command".to_string()))?;

    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(cwd)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd.stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() });

    let start = Instant::now();
    let mut child = cmd
        .spawn()
        .map_err(|e| TidyError::ToolExecution(format!("Failed to spawn {}: {}", program, e)))?;

    // Feed stdin from a separate task so a chatty child cannot deadlock on a full pipe.
    let writer = match (input, child.stdin.take()) {
        (Some(data), Some(mut stdin)) => {
            let data = data.as_bytes().to_vec();
            Some(tokio::spawn(async move {
                let _ = stdin.write_all(&data).await;
                let _ = stdin.shutdown().await;
            }))
        }
        _ => None,
    };

    let result = tokio::time::timeout(timeout, child.wait_with_output()).await;
    if let Some(writer) = writer {
        writer.abort();
    }

    match result {
        Ok(Ok(output)) => Ok(RawOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration: start.elapsed(),
            timed_out: false,
        }),
        Ok(Err(e)) => Err(TidyError::ToolExecution(format!("{} failed: {}", program, e))),
        Err(_) => {
            log::warn!("{} timed out after {:?}", program, timeout);
            Ok(RawOutput::timed_out(start.elapsed()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::traits::argv;

    fn tmp() -> std::path::PathBuf {
        std::env::temp_dir()
    }

    #[tokio::test]
    async fn test_run_captures_stdout() {
        let raw = run_command(&argv(&["sh", "-c", "echo hello"]), &tmp(), Duration::from_secs(10))
            .await
            .unwrap();
        assert!(raw.success());
        assert_eq!(raw.stdout.trim(), "hello");
        assert!(!raw.timed_out);
    }

    #[tokio::test]
    async fn test_run_captures_exit_code_and_stderr() {
        let raw = run_command(&argv(&["sh", "-c", "echo oops >&2; exit 3"]), &tmp(), Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(raw.exit_code, Some(3));
        assert_eq!(raw.stderr.trim(), "oops");
    }

    #[tokio::test]
    async fn test_run_timeout() {
        let raw = run_command(&argv(&["sleep", "10"]), &tmp(), Duration::from_millis(100))
            .await
            .unwrap();
        assert!(raw.timed_out);
        assert_eq!(raw.exit_code, None);
        assert!(raw.duration < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_run_missing_program_is_error() {
        let err = run_command(&argv(&["nonexistent_tool_xyz123"]), &tmp(), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, TidyError::ToolExecution(_)));
    }

    #[tokio::test]
    async fn test_run_empty_command_is_error() {
        let err = run_command(&[], &tmp(), Duration::from_secs(1)).await.unwrap_err();
        assert!(err.to_string().contains("Empty command"));
    }

    #[tokio::test]
    async fn test_run_with_stdin() {
        let raw = run_with_stdin(&argv(&["tr", "a-z", "A-Z"]), &tmp(), "shout\n", Duration::from_secs(10))
            .await
            .unwrap();
        assert!(raw.success());
        assert_eq!(raw.stdout, "SHOUT\n");
    }
}
