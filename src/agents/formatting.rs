//! Whitespace normalizer for formatting issues no formatter claimed.

use async_trait::async_trait;

use super::traits::FixAgent;
use crate::domain::{FixResult, Issue, IssueType};
use crate::error::Result;
use crate::safety::EditSession;

const WHITESPACE_HINTS: &[&str] = &[
    "whitespace",
    "trailing",
    "blank line",
    "newline at end",
    "no newline",
    "tab",
];

pub struct WhitespaceAgent;

impl WhitespaceAgent {
    pub const NAME: &'static str = "whitespace";

    pub fn new() -> Self {
        Self
    }
}

impl Default for WhitespaceAgent {
    fn default() -> Self {
        Self::new()
    }
}

/// Strip trailing whitespace, drop trailing blank lines and end with exactly
/// one newline. Keeps CRLF line endings when the file uses them.
pub fn normalize_whitespace(content: &str) -> String {
    if content.is_empty() {
        return String::new();
    }
    let eol = if content.contains("\r\n") { "\r\n" } else { "\n" };
    let mut lines: Vec<&str> = content.lines().map(str::trim_end).collect();
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    if lines.is_empty() {
        return String::new();
    }
    let mut out = lines.join(eol);
    out.push_str(eol);
    out
}

#[async_trait]
impl FixAgent for WhitespaceAgent {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn supported_types(&self) -> &[IssueType] {
        &[IssueType::Formatting]
    }

    fn can_handle(&self, issue: &Issue) -> f64 {
        if issue.issue_type != IssueType::Formatting {
            return 0.0;
        }
        let message = issue.message.to_lowercase();
        if WHITESPACE_HINTS.iter().any(|hint| message.contains(hint)) {
            0.9
        } else {
            0.4
        }
    }

    async fn analyze_and_fix(&self, issue: &Issue, session: &EditSession) -> Result<FixResult> {
        let changed = session
            .modify(&issue.file_path, |content| {
                let normalized = normalize_whitespace(content);
                (normalized != content).then_some(normalized)
            })
            .await?;

        if !changed {
            return Ok(FixResult::failure(format!(
                "No whitespace problems in {}",
                issue.file_path.display()
            )));
        }
        Ok(FixResult::success(0.9)
            .with_fix(format!("Normalized whitespace in {}", issue.file_path.display()))
            .with_file(issue.file_path.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Severity;
    use crate::safety::{FileEditor, RoundSnapshot};
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn issue(message: &str) -> Issue {
        Issue::new("ruff-check", IssueType::Formatting, Severity::Low, message, "a.py").at_line(1)
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("x = 1   \n\n\n"), "x = 1\n");
        assert_eq!(normalize_whitespace("x = 1"), "x = 1\n");
        assert_eq!(normalize_whitespace("a \r\nb\t\r\n"), "a\r\nb\r\n");
        assert_eq!(normalize_whitespace("   \n"), "");
        assert_eq!(normalize_whitespace(""), "");
    }

    #[test]
    fn test_can_handle() {
        let agent = WhitespaceAgent::new();
        assert_eq!(agent.can_handle(&issue("W291 Trailing whitespace")), 0.9);
        assert_eq!(agent.can_handle(&issue("E501 Line too long")), 0.4);
        let other = Issue::new("mypy", IssueType::TypeError, Severity::High, "bad", "a.py");
        assert_eq!(agent.can_handle(&other), 0.0);
    }

    #[tokio::test]
    async fn test_fixes_trailing_whitespace() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("p");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("a.py"), "x = 1  \ny = 2\n\n").unwrap();

        let snapshot = Arc::new(RoundSnapshot::new(&root, &dir.path().join("b"), 1));
        let session = EditSession::new(Arc::new(FileEditor::new(snapshot)));
        let agent = WhitespaceAgent::new();

        let result = agent
            .analyze_and_fix(&issue("W291 Trailing whitespace"), &session)
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.files_modified, vec![PathBuf::from("a.py")]);
        assert_eq!(fs::read_to_string(root.join("a.py")).unwrap(), "x = 1\ny = 2\n");

        let again = agent
            .analyze_and_fix(&issue("W291 Trailing whitespace"), &session)
            .await
            .unwrap();
        assert!(!again.success);
        assert!(session.files_modified().await.contains(&Path::new("a.py").to_path_buf()));
    }
}
