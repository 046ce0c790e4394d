//! Unused-import removal for Python sources.
//!
//! Handles single-line `import a, b as c` and `from m import x, y` statements
//! at the reported line. Parenthesized or continued imports are left alone.

use async_trait::async_trait;

use super::traits::{FixAgent, has_extension};
use crate::domain::{FixResult, Issue, IssueType};
use crate::error::Result;
use crate::safety::EditSession;

pub struct DeadCodeAgent;

impl DeadCodeAgent {
    pub const NAME: &'static str = "dead-code";

    pub fn new() -> Self {
        Self
    }
}

impl Default for DeadCodeAgent {
    fn default() -> Self {
        Self::new()
    }
}

fn is_unused_import(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("import") && (message.contains("unused") || message.contains("not accessed"))
}

/// Name quoted in a tool message: `os`, 'os' or "os".
pub fn imported_name(message: &str) -> Option<String> {
    for quote in ['`', '\'', '"'] {
        let Some(start) = message.find(quote) else {
            continue;
        };
        let rest = &message[start + 1..];
        let Some(end) = rest.find(quote) else {
            continue;
        };
        let name = &rest[..end];
        if !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.') {
            return Some(name.to_string());
        }
    }
    None
}

fn clause_matches(clause: &str, name: &str, module: Option<&str>) -> bool {
    let (target, alias) = match clause.split_once(" as ") {
        Some((target, alias)) => (target.trim(), Some(alias.trim())),
        None => (clause, None),
    };
    if target == name || alias == Some(name) {
        return true;
    }
    module.is_some_and(|m| format!("{}.{}", m, target) == name)
}

/// Remove `name` from one import line.
///
/// `None` when the line is not a simple import of `name`; `Some(None)` when
/// the whole line goes; `Some(Some(line))` for the rewritten line.
pub fn remove_import(line: &str, name: &str) -> Option<Option<String>> {
    let indent_len = line.len() - line.trim_start().len();
    let (indent, statement) = line.split_at(indent_len);
    let (code, comment) = match statement.find('#') {
        Some(i) => (statement[..i].trim_end(), Some(&statement[i..])),
        None => (statement.trim_end(), None),
    };
    if code.contains('(') || code.ends_with('\\') || code.contains(';') {
        return None;
    }

    let (prefix, clauses, module) = if let Some(rest) = code.strip_prefix("import ") {
        ("import ".to_string(), rest, None)
    } else if let Some(rest) = code.strip_prefix("from ") {
        let (module, names) = rest.split_once(" import ")?;
        (format!("from {} import ", module.trim()), names, Some(module.trim()))
    } else {
        return None;
    };

    let items: Vec<&str> = clauses.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
    let keep: Vec<&str> = items
        .iter()
        .copied()
        .filter(|clause| !clause_matches(clause, name, module))
        .collect();
    if keep.len() == items.len() {
        return None;
    }
    if keep.is_empty() {
        return Some(None);
    }

    let mut rewritten = format!("{}{}{}", indent, prefix, keep.join(", "));
    if let Some(comment) = comment {
        rewritten.push_str("  ");
        rewritten.push_str(comment);
    }
    Some(Some(rewritten))
}

/// Apply [`remove_import`] to 1-based `line_number` of `content`.
fn remove_from_content(content: &str, line_number: u32, name: &str) -> Option<String> {
    let index = usize::try_from(line_number).ok()?.checked_sub(1)?;
    let mut lines: Vec<&str> = content.split_inclusive('\n').collect();
    let original = *lines.get(index)?;
    let body = original.trim_end_matches(['\n', '\r']);
    let ending = &original[body.len()..];

    let replacement = remove_import(body, name)?;
    let mut out = String::with_capacity(content.len());
    for (i, line) in lines.drain(..).enumerate() {
        if i != index {
            out.push_str(line);
        } else if let Some(new_line) = &replacement {
            out.push_str(new_line);
            out.push_str(ending);
        }
    }
    Some(out)
}

#[async_trait]
impl FixAgent for DeadCodeAgent {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn supported_types(&self) -> &[IssueType] {
        &[IssueType::DeadCode, IssueType::ImportError]
    }

    fn can_handle(&self, issue: &Issue) -> f64 {
        if !self.supported_types().contains(&issue.issue_type)
            || !has_extension(&issue.file_path, &["py", "pyi"])
            || issue.line_number.is_none()
            || !is_unused_import(&issue.message)
            || imported_name(&issue.message).is_none()
        {
            return 0.0;
        }
        // Package re-exports often look unused.
        if issue.file_path.file_name().is_some_and(|n| n == "__init__.py") {
            0.6
        } else {
            0.85
        }
    }

    async fn analyze_and_fix(&self, issue: &Issue, session: &EditSession) -> Result<FixResult> {
        let (Some(line), Some(name)) = (issue.line_number, imported_name(&issue.message)) else {
            return Ok(FixResult::failure("Issue does not name an import and a line"));
        };

        let changed = session
            .modify(&issue.file_path, |content| remove_from_content(content, line, &name))
            .await?;
        if !changed {
            return Ok(FixResult::failure(format!(
                "No removable import of {} at {}",
                name,
                issue.location()
            )));
        }

        Ok(FixResult::success(self.can_handle(issue))
            .with_fix(format!("Removed unused import {} at {}", name, issue.location()))
            .with_file(issue.file_path.clone()))
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

    #[test]
    fn test_imported_name() {
        assert_eq!(imported_name("F401 [*] `os` imported but unused").as_deref(), Some("os"));
        assert_eq!(imported_name("unused import 'sys'").as_deref(), Some("sys"));
        assert_eq!(imported_name("Import \"typing.List\" is not accessed").as_deref(), Some("typing.List"));
        assert_eq!(imported_name("imported but unused"), None);
    }

    #[test]
    fn test_remove_whole_line() {
        assert_eq!(remove_import("import os", "os"), Some(None));
        assert_eq!(remove_import("from typing import List", "typing.List"), Some(None));
        assert_eq!(remove_import("import numpy as np", "np"), Some(None));
    }

    #[test]
    fn test_remove_one_of_many() {
        assert_eq!(
            remove_import("import os, sys  # stdlib", "os"),
            Some(Some("import sys  # stdlib".to_string()))
        );
        assert_eq!(
            remove_import("    from a.b import x, y as z", "a.b.y"),
            Some(Some("    from a.b import x".to_string()))
        );
    }

    #[test]
    fn test_remove_refuses_complex_statements() {
        assert_eq!(remove_import("from a import (x, y)", "x"), None);
        assert_eq!(remove_import("import os; import sys", "os"), None);
        assert_eq!(remove_import("x = os.path", "os"), None);
        assert_eq!(remove_import("import sys", "os"), None);
    }

    #[test]
    fn test_remove_from_content_keeps_line_endings() {
        let content = "import os\r\nimport sys\r\nprint(sys.argv)\r\n";
        assert_eq!(
            remove_from_content(content, 1, "os").unwrap(),
            "import sys\r\nprint(sys.argv)\r\n"
        );
        assert!(remove_from_content(content, 9, "os").is_none());
        assert!(remove_from_content(content, 0, "os").is_none());
    }

    #[test]
    fn test_can_handle() {
        let agent = DeadCodeAgent::new();
        let issue = Issue::new(
            "ruff-check",
            IssueType::ImportError,
            Severity::Low,
            "F401 `os` imported but unused",
            "app.py",
        )
        .at_line(1);
        assert_eq!(agent.can_handle(&issue), 0.85);

        let init = issue.clone().with_file_path("pkg/__init__.py");
        assert_eq!(agent.can_handle(&init), 0.6);

        let unused_var = Issue::new("ruff-check", IssueType::DeadCode, Severity::Low, "F841 `x` assigned", "a.py").at_line(2);
        assert_eq!(agent.can_handle(&unused_var), 0.0);
    }

    #[tokio::test]
    async fn test_fix_removes_import() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("p");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("app.py"), "import os\nimport sys\n\nprint(sys.argv)\n").unwrap();

        let snapshot = Arc::new(RoundSnapshot::new(&root, &dir.path().join("b"), 1));
        let session = EditSession::new(Arc::new(FileEditor::new(snapshot)));
        let issue = Issue::new("vulture", IssueType::ImportError, Severity::Low, "unused import 'os'", "app.py").at_line(1);

        let result = DeadCodeAgent::new().analyze_and_fix(&issue, &session).await.unwrap();
        assert!(result.success);
        assert_eq!(
            fs::read_to_string(root.join("app.py")).unwrap(),
            "import sys\n\nprint(sys.argv)\n"
        );
    }
}
