//! Model-backed fixing through an external backend.
//!
//! The agent sends the issue and the file's current source to a
//! [`FixBackend`] and writes back the proposed content. [`CommandBackend`]
//! talks to any executable that reads a JSON request on stdin and prints a
//! JSON proposal on stdout.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::traits::FixAgent;
use crate::adapters::parse::{extract_json, first_line};
use crate::adapters::process::run_with_stdin;
use crate::domain::{FixResult, Issue, IssueType, content_hash};
use crate::error::{Result, TidyError};
use crate::safety::{EditSession, WriteOutcome};

/// A backend's answer for one issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    /// Full replacement content for the file; `None` when the backend declines.
    #[serde(default)]
    pub content: Option<String>,
    pub confidence: f64,
    #[serde(default)]
    pub explanation: String,
}

#[async_trait]
pub trait FixBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn propose(&self, issue: &Issue, source: &str) -> Result<Proposal>;
}

#[derive(Debug, Serialize)]
struct BackendRequest<'a> {
    issue: &'a Issue,
    file: &'a Path,
    source: &'a str,
}

pub struct CommandBackend {
    argv: Vec<String>,
    cwd: PathBuf,
    timeout: Duration,
}

impl CommandBackend {
    pub fn new(argv: Vec<String>, cwd: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            argv,
            cwd: cwd.into(),
            timeout,
        }
    }
}

#[async_trait]
impl FixBackend for CommandBackend {
    fn name(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or("command")
    }

    async fn propose(&self, issue: &Issue, source: &str) -> Result<Proposal> {
        let request = serde_json::to_string(&BackendRequest {
            issue,
            file: &issue.file_path,
            source,
        })?;

        let output = run_with_stdin(&self.argv, &self.cwd, &request, self.timeout).await?;
        if output.timed_out {
            return Err(TidyError::AgentFix(format!("{} timed out after {:?}", self.name(), self.timeout)));
        }
        if !output.success() {
            return Err(TidyError::AgentFix(format!(
                "{} exited with {:?}: {}",
                self.name(),
                output.exit_code,
                first_line(&output.stderr)
            )));
        }

        let value = extract_json(&output.stdout)
            .ok_or_else(|| TidyError::Parse(format!("{} returned no JSON proposal", self.name())))?;
        Ok(serde_json::from_value(value)?)
    }
}

pub struct DelegatingAgent {
    backend: Arc<dyn FixBackend>,
}

impl DelegatingAgent {
    pub const NAME: &'static str = "delegate";

    /// Types no deterministic agent covers.
    const TYPES: &'static [IssueType] = &[
        IssueType::TypeError,
        IssueType::Security,
        IssueType::Complexity,
        IssueType::TestFailure,
        IssueType::Documentation,
        IssueType::Dependency,
        IssueType::Performance,
    ];

    pub fn new(backend: Arc<dyn FixBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl FixAgent for DelegatingAgent {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn supported_types(&self) -> &[IssueType] {
        Self::TYPES
    }

    fn can_handle(&self, issue: &Issue) -> f64 {
        if !Self::TYPES.contains(&issue.issue_type) {
            return 0.0;
        }
        // Without a line the backend has to search the whole file.
        if issue.line_number.is_some() { 0.75 } else { 0.6 }
    }

    async fn analyze_and_fix(&self, issue: &Issue, session: &EditSession) -> Result<FixResult> {
        let source = session.read(&issue.file_path).await?;
        let proposal = self.backend.propose(issue, &source).await?;
        log::debug!(
            "{} proposed a fix for {} (confidence {:.2})",
            self.backend.name(),
            issue.location(),
            proposal.confidence
        );

        let Some(content) = proposal.content else {
            return Ok(FixResult::failure(format!(
                "{} declined: {}",
                self.backend.name(),
                proposal.explanation
            )));
        };

        let outcome = session
            .write_if_unchanged(&issue.file_path, &content_hash(&source), &content)
            .await?;
        let result = match outcome {
            WriteOutcome::Written => {
                let mut result = FixResult::success(proposal.confidence)
                    .with_fix(format!("Applied {} proposal for {}", self.backend.name(), issue.location()))
                    .with_file(issue.file_path.clone());
                if !proposal.explanation.is_empty() {
                    result = result.with_recommendation(proposal.explanation);
                }
                result
            }
            WriteOutcome::Unchanged => FixResult::failure("Proposal is identical to the current file"),
            WriteOutcome::Conflict => FixResult::failure(format!(
                "{} changed while the proposal was being prepared",
                issue.file_path.display()
            )),
        };
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Severity;
    use crate::safety::{FileEditor, RoundSnapshot};
    use std::fs;
    use tempfile::TempDir;

    struct FixedBackend(Proposal);

    #[async_trait]
    impl FixBackend for FixedBackend {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn propose(&self, _issue: &Issue, _source: &str) -> Result<Proposal> {
            Ok(self.0.clone())
        }
    }

    fn type_issue() -> Issue {
        Issue::new("mypy", IssueType::TypeError, Severity::High, "Incompatible return value", "a.py").at_line(2)
    }

    fn setup(content: &str) -> (TempDir, EditSession) {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("p");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("a.py"), content).unwrap();
        let snapshot = Arc::new(RoundSnapshot::new(&root, &dir.path().join("b"), 1));
        let session = EditSession::new(Arc::new(FileEditor::new(snapshot)));
        (dir, session)
    }

    #[tokio::test]
    async fn test_applies_proposal() {
        let (dir, session) = setup("def f() -> int:\n    return 'x'\n");
        let agent = DelegatingAgent::new(Arc::new(FixedBackend(Proposal {
            content: Some("def f() -> int:\n    return 1\n".to_string()),
            confidence: 0.8,
            explanation: "return an int".to_string(),
        })));

        let result = agent.analyze_and_fix(&type_issue(), &session).await.unwrap();
        assert!(result.success);
        assert_eq!(result.confidence, 0.8);
        assert_eq!(result.recommendations, vec!["return an int".to_string()]);
        assert_eq!(
            fs::read_to_string(dir.path().join("p/a.py")).unwrap(),
            "def f() -> int:\n    return 1\n"
        );
    }

    #[tokio::test]
    async fn test_declined_proposal_fails() {
        let (_dir, session) = setup("x = 1\n");
        let agent = DelegatingAgent::new(Arc::new(FixedBackend(Proposal {
            content: None,
            confidence: 0.0,
            explanation: "needs a human".to_string(),
        })));
        let result = agent.analyze_and_fix(&type_issue(), &session).await.unwrap();
        assert!(!result.success);
        assert!(result.failure_reason().unwrap().contains("needs a human"));
    }

    #[tokio::test]
    async fn test_invalid_proposal_is_rejected() {
        let (dir, session) = setup("x = 1\n");
        let agent = DelegatingAgent::new(Arc::new(FixedBackend(Proposal {
            content: Some("def (:\n".to_string()),
            confidence: 0.9,
            explanation: String::new(),
        })));
        let err = agent.analyze_and_fix(&type_issue(), &session).await.unwrap_err();
        assert!(matches!(err, TidyError::Validation(_)));
        assert_eq!(fs::read_to_string(dir.path().join("p/a.py")).unwrap(), "x = 1\n");
    }

    #[tokio::test]
    async fn test_command_backend_round_trip() {
        let dir = TempDir::new().unwrap();
        let script = r#"cat > /dev/null; echo 'thinking...'; printf '%s\n' '{"content": "x = 2\n", "confidence": 0.9}'"#;
        let backend = CommandBackend::new(
            crate::adapters::argv(&["sh", "-c", script]),
            dir.path(),
            Duration::from_secs(10),
        );
        let proposal = backend.propose(&type_issue(), "x = 1\n").await.unwrap();
        assert_eq!(proposal.content.as_deref(), Some("x = 2\n"));
        assert_eq!(proposal.confidence, 0.9);
    }

    #[tokio::test]
    async fn test_command_backend_without_json() {
        let dir = TempDir::new().unwrap();
        let backend = CommandBackend::new(
            crate::adapters::argv(&["sh", "-c", "cat > /dev/null; echo nope"]),
            dir.path(),
            Duration::from_secs(10),
        );
        let err = backend.propose(&type_issue(), "x = 1\n").await.unwrap_err();
        assert!(matches!(err, TidyError::Parse(_)));
    }
}
