//! Tool adapter contract.
//!
//! Every external analysis tool is wrapped by one [`ToolAdapter`]. The engine
//! only ever sees this interface: build an argv, run it, parse what came back.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use super::process;
use crate::domain::Issue;
use crate::error::Result;

/// Raw output captured from one tool process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawOutput {
    /// Exit code; `None` when the process was killed or timed out.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
    pub timed_out: bool,
}

impl RawOutput {
    /// Create raw output from captured streams (mostly useful in tests).
    pub fn new(exit_code: Option<i32>, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
            duration: Duration::ZERO,
            timed_out: false,
        }
    }

    /// Output of a process that was killed at its deadline.
    pub fn timed_out(duration: Duration) -> Self {
        Self {
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            duration,
            timed_out: true,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// stdout followed by stderr, separated by a newline when both are present.
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (true, _) => self.stderr.clone(),
            (false, true) => self.stdout.clone(),
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr),
        }
    }

    /// Iterate lines of stdout then stderr.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.stdout.lines().chain(self.stderr.lines())
    }
}

/// Wraps one external analysis tool.
#[async_trait]
pub trait ToolAdapter: Send + Sync {
    /// Tool name, used as the originating tool of every issue it reports.
    fn name(&self) -> &str;

    /// Build the argv for the given target files.
    ///
    /// An empty slice means a project-wide run.
    fn build_command(&self, files: &[PathBuf]) -> Vec<String>;

    /// Run the argv in `cwd`, killing the process at `timeout`.
    async fn execute(&self, argv: &[String], cwd: &Path, timeout: Duration) -> Result<RawOutput> {
        process::run_command(argv, cwd, timeout).await
    }

    /// Parse raw output into issues.
    ///
    /// Implementations skip blank lines, continuation/context lines and
    /// summary lines, and report each underlying defect exactly once.
    fn parse_output(&self, raw: &RawOutput) -> Vec<Issue>;
}

/// Append target files to a base argv, or `default_target` for a project-wide run.
pub fn command_with_files(base: &[String], files: &[PathBuf], default_target: Option<&str>) -> Vec<String> {
    let mut argv = base.to_vec();
    if files.is_empty() {
        if let Some(target) = default_target {
            argv.push(target.to_string());
        }
    } else {
        argv.extend(files.iter().map(|f| f.to_string_lossy().to_string()));
    }
    argv
}

/// Convert a static argv into owned strings.
pub fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combined_output() {
        assert_eq!(RawOutput::new(Some(0), "out\n", "").combined(), "out\n");
        assert_eq!(RawOutput::new(Some(0), "", "err").combined(), "err");
        assert_eq!(RawOutput::new(Some(1), "out\n", "err").combined(), "out\nerr");
    }

    #[test]
    fn test_lines_chains_streams() {
        let raw = RawOutput::new(Some(1), "a\nb", "c");
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_timed_out() {
        let raw = RawOutput::timed_out(Duration::from_secs(3));
        assert!(raw.timed_out);
        assert!(!raw.success());
        assert_eq!(raw.exit_code, None);
    }

    #[test]
    fn test_command_with_files() {
        let base = argv(&["ruff", "check"]);
        let files = vec![PathBuf::from("a.py"), PathBuf::from("b.py")];
        assert_eq!(command_with_files(&base, &files, Some(".")), argv(&["ruff", "check", "a.py", "b.py"]));
        assert_eq!(command_with_files(&base, &[], Some(".")), argv(&["ruff", "check", "."]));
        assert_eq!(command_with_files(&base, &[], None), argv(&["ruff", "check"]));
    }
}
