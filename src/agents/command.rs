//! Agents that pipe a file through a fixer command on stdin.
//!
//! The command reads the current source on stdin and prints the fixed source
//! on stdout. `{file}` in the argv is replaced with the root-relative path so
//! tools can pick up per-file configuration.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use super::traits::{FixAgent, has_extension};
use crate::adapters::process::run_with_stdin;
use crate::domain::{FixResult, Issue, IssueType, content_hash};
use crate::error::{Result, TidyError};
use crate::safety::{EditSession, WriteOutcome};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

pub struct CommandFixAgent {
    name: String,
    argv: Vec<String>,
    types: Vec<IssueType>,
    extensions: Vec<String>,
    /// Confidence for issues reported by one of `native_tools`.
    native_confidence: f64,
    /// Confidence for other issues of a supported type and extension.
    foreign_confidence: f64,
    native_tools: Vec<String>,
    timeout: Duration,
}

impl CommandFixAgent {
    pub fn new(name: impl Into<String>, argv: Vec<String>, types: &[IssueType]) -> Self {
        Self {
            name: name.into(),
            argv,
            types: types.to_vec(),
            extensions: Vec::new(),
            native_confidence: 0.9,
            foreign_confidence: 0.5,
            native_tools: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// `ruff format` as a stdin filter.
    pub fn ruff_format() -> Self {
        Self::new(
            "ruff-format-fixer",
            crate::adapters::argv(&["ruff", "format", "--stdin-filename", "{file}", "-"]),
            &[IssueType::Formatting],
        )
        .with_extensions(&["py", "pyi"])
        .with_native_tools(&["ruff-format"])
        .with_confidence(0.95, 0.75)
    }

    /// `ruff check --fix` as a stdin filter.
    pub fn ruff_fix() -> Self {
        Self::new(
            "ruff-fix",
            crate::adapters::argv(&[
                "ruff",
                "check",
                "--fix",
                "--exit-zero",
                "--quiet",
                "--stdin-filename",
                "{file}",
                "-",
            ]),
            &[IssueType::Formatting, IssueType::ImportError, IssueType::DeadCode],
        )
        .with_extensions(&["py", "pyi"])
        .with_native_tools(&["ruff-check"])
        .with_confidence(0.85, 0.7)
    }

    pub fn with_extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions = extensions.iter().map(|e| e.to_string()).collect();
        self
    }

    pub fn with_native_tools(mut self, tools: &[&str]) -> Self {
        self.native_tools = tools.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_confidence(mut self, native: f64, foreign: f64) -> Self {
        self.native_confidence = native.clamp(0.0, 1.0);
        self.foreign_confidence = foreign.clamp(0.0, 1.0);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn command_for(&self, file: &Path) -> Vec<String> {
        let file = file.to_string_lossy();
        self.argv.iter().map(|arg| arg.replace("{file}", &file)).collect()
    }
}

#[async_trait]
impl FixAgent for CommandFixAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn supported_types(&self) -> &[IssueType] {
        &self.types
    }

    fn can_handle(&self, issue: &Issue) -> f64 {
        if !self.types.contains(&issue.issue_type) {
            return 0.0;
        }
        let extensions: Vec<&str> = self.extensions.iter().map(String::as_str).collect();
        if !extensions.is_empty() && !has_extension(&issue.file_path, &extensions) {
            return 0.0;
        }
        if self.native_tools.iter().any(|t| *t == issue.tool) {
            self.native_confidence
        } else {
            self.foreign_confidence
        }
    }

    async fn analyze_and_fix(&self, issue: &Issue, session: &EditSession) -> Result<FixResult> {
        let path = &issue.file_path;
        let original = session.read(path).await?;
        let argv = self.command_for(path);

        let output = run_with_stdin(&argv, session.root(), &original, self.timeout).await?;
        if output.timed_out {
            return Ok(FixResult::failure(format!("{} timed out", self.name)));
        }
        if !output.success() {
            return Err(TidyError::AgentFix(format!(
                "{} exited with {:?}: {}",
                self.name,
                output.exit_code,
                crate::adapters::parse::first_line(&output.stderr)
            )));
        }
        if output.stdout.trim().is_empty() && !original.trim().is_empty() {
            return Err(TidyError::AgentFix(format!("{} produced no output", self.name)));
        }
        if output.stdout == original {
            return Ok(FixResult::failure(format!("{} made no changes to {}", self.name, path.display())));
        }

        match session
            .write_if_unchanged(path, &content_hash(&original), &output.stdout)
            .await?
        {
            WriteOutcome::Written => Ok(FixResult::success(self.can_handle(issue))
                .with_fix(format!("{} rewrote {}", self.name, path.display()))
                .with_file(path.clone())),
            WriteOutcome::Unchanged => Ok(FixResult::failure(format!(
                "{} made no changes to {}",
                self.name,
                path.display()
            ))),
            WriteOutcome::Conflict => Ok(FixResult::failure(format!(
                "{} changed on disk while {} was running",
                path.display(),
                self.name
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Severity;
    use crate::safety::{FileEditor, RoundSnapshot};
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn session(dir: &TempDir) -> EditSession {
        let root = dir.path().join("p");
        let snapshot = Arc::new(RoundSnapshot::new(&root, &dir.path().join("b"), 1));
        EditSession::new(Arc::new(FileEditor::new(snapshot)))
    }

    fn project(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("p");
        fs::create_dir_all(&root).unwrap();
        for (name, content) in files {
            fs::write(root.join(name), content).unwrap();
        }
        dir
    }

    fn formatting_issue(tool: &str) -> Issue {
        Issue::new(tool, IssueType::Formatting, Severity::Low, "Would reformat", "a.py")
    }

    #[test]
    fn test_can_handle_prefers_native_tool() {
        let agent = CommandFixAgent::ruff_format();
        assert_eq!(agent.can_handle(&formatting_issue("ruff-format")), 0.95);
        assert_eq!(agent.can_handle(&formatting_issue("codespell")), 0.75);

        let rust = Issue::new("clippy", IssueType::Formatting, Severity::Low, "x", "lib.rs");
        assert_eq!(agent.can_handle(&rust), 0.0);
        let typed = Issue::new("mypy", IssueType::TypeError, Severity::High, "x", "a.py");
        assert_eq!(agent.can_handle(&typed), 0.0);
    }

    #[test]
    fn test_command_substitutes_file() {
        let agent = CommandFixAgent::ruff_fix();
        let argv = agent.command_for(Path::new("pkg/a.py"));
        assert!(argv.contains(&"pkg/a.py".to_string()));
        assert!(!argv.iter().any(|a| a.contains("{file}")));
    }

    #[tokio::test]
    async fn test_filter_rewrites_file() {
        let dir = project(&[("a.py", "X = 1\n")]);
        let agent = CommandFixAgent::new("lower", crate::adapters::argv(&["tr", "A-Z", "a-z"]), &[IssueType::Formatting])
            .with_confidence(0.9, 0.9);

        let session = session(&dir);
        let result = agent.analyze_and_fix(&formatting_issue("x"), &session).await.unwrap();
        assert!(result.success);
        assert_eq!(fs::read_to_string(dir.path().join("p/a.py")).unwrap(), "x = 1\n");
        assert_eq!(session.edits().await.len(), 1);
    }

    #[tokio::test]
    async fn test_filter_without_changes_fails() {
        let dir = project(&[("a.py", "x = 1\n")]);
        let agent = CommandFixAgent::new("cat", crate::adapters::argv(&["cat"]), &[IssueType::Formatting]);
        let result = agent
            .analyze_and_fix(&formatting_issue("x"), &session(&dir))
            .await
            .unwrap();
        assert!(!result.success);
    }

    #[tokio::test]
    async fn test_filter_failure_is_error() {
        let dir = project(&[("a.py", "x = 1\n")]);
        let agent = CommandFixAgent::new(
            "broken",
            crate::adapters::argv(&["sh", "-c", "echo boom >&2; exit 3"]),
            &[IssueType::Formatting],
        );
        let err = agent
            .analyze_and_fix(&formatting_issue("x"), &session(&dir))
            .await
            .unwrap_err();
        assert!(matches!(err, TidyError::AgentFix(_)));
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn test_slow_filter_is_cut_off_by_timeout() {
        let dir = project(&[("a.py", "x = 1\n")]);
        let agent = CommandFixAgent::new(
            "slow",
            crate::adapters::argv(&["sh", "-c", "sleep 5"]),
            &[IssueType::Formatting],
        )
        .with_timeout(Duration::from_millis(100));

        let started = std::time::Instant::now();
        let result = agent
            .analyze_and_fix(&formatting_issue("x"), &session(&dir))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.failure_reason().unwrap_or_default().contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(4));
        assert_eq!(fs::read_to_string(dir.path().join("p/a.py")).unwrap(), "x = 1\n");
    }
}
