//! Canonical issue model.
//!
//! Every adapter's output is coerced into [`Issue`]. Issues are immutable once
//! normalized; the router consumes them and reports keep them afterwards.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Kind of defect, used to route issues to fix agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    Formatting,
    TypeError,
    Security,
    Complexity,
    DeadCode,
    ImportError,
    TestFailure,
    Documentation,
    Dependency,
    Performance,
}

impl IssueType {
    /// All issue types, in routing-table order.
    pub const ALL: [IssueType; 10] = [
        IssueType::Formatting,
        IssueType::TypeError,
        IssueType::Security,
        IssueType::Complexity,
        IssueType::DeadCode,
        IssueType::ImportError,
        IssueType::TestFailure,
        IssueType::Documentation,
        IssueType::Dependency,
        IssueType::Performance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IssueType::Formatting => "formatting",
            IssueType::TypeError => "type_error",
            IssueType::Security => "security",
            IssueType::Complexity => "complexity",
            IssueType::DeadCode => "dead_code",
            IssueType::ImportError => "import_error",
            IssueType::TestFailure => "test_failure",
            IssueType::Documentation => "documentation",
            IssueType::Dependency => "dependency",
            IssueType::Performance => "performance",
        }
    }

    /// Parse from the snake_case name used in config files.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == s)
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Issue severity. Ordered so that `High > Medium > Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single normalized defect derived from one tool's output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Issue {
    /// Stable identifier (fingerprint prefix plus line).
    pub id: String,

    pub issue_type: IssueType,

    pub severity: Severity,

    /// Human-readable description as reported by the tool.
    pub message: String,

    /// File the issue belongs to. Always present; file-level issues carry
    /// no line number.
    pub file_path: PathBuf,

    pub line_number: Option<u32>,

    /// Name of the hook/tool that reported the issue.
    pub tool: String,

    /// Strategy stage the issue was collected in.
    pub stage: String,
}

impl Issue {
    /// Create a new file-level issue.
    pub fn new(
        tool: impl Into<String>,
        issue_type: IssueType,
        severity: Severity,
        message: impl Into<String>,
        file_path: impl Into<PathBuf>,
    ) -> Self {
        let mut issue = Self {
            id: String::new(),
            issue_type,
            severity,
            message: message.into(),
            file_path: file_path.into(),
            line_number: None,
            tool: tool.into(),
            stage: String::new(),
        };
        issue.id = issue.compute_id();
        issue
    }

    /// Attach a line number.
    pub fn at_line(mut self, line: u32) -> Self {
        self.line_number = Some(line);
        self.id = self.compute_id();
        self
    }

    /// Set the stage the issue was collected in.
    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = stage.into();
        self
    }

    /// Attribute the issue to a hook name other than the adapter's.
    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = tool.into();
        self.id = self.compute_id();
        self
    }

    /// Replace the file path (used when relativizing against the project root).
    pub fn with_file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = path.into();
        self.id = self.compute_id();
        self
    }

    /// Stable hash of the identifying fields (type, message, file).
    ///
    /// The line number is excluded so that a fix elsewhere in the file that
    /// shifts lines does not change the issue's identity.
    pub fn fingerprint(&self) -> String {
        fingerprint(self.issue_type, &self.message, &self.file_path)
    }

    /// Format the location string (e.g., "src/app.py:42").
    pub fn location(&self) -> String {
        match self.line_number {
            Some(line) => format!("{}:{}", self.file_path.display(), line),
            None => self.file_path.display().to_string(),
        }
    }

    fn compute_id(&self) -> String {
        let fp = self.fingerprint();
        match self.line_number {
            Some(line) => format!("{}-{}-L{}", self.tool, &fp[..12], line),
            None => format!("{}-{}", self.tool, &fp[..12]),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}/{}] {} ({})",
            self.location(),
            self.issue_type,
            self.severity,
            self.message,
            self.tool
        )
    }
}

/// Compute the fingerprint for an issue's identifying fields.
pub fn fingerprint(issue_type: IssueType, message: &str, file_path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(issue_type.as_str().as_bytes());
    hasher.update(b"\0");
    hasher.update(message.trim().as_bytes());
    hasher.update(b"\0");
    hasher.update(file_path.to_string_lossy().as_bytes());
    hex::encode(hasher.finalize())
}

/// The one counting function for issue lists.
///
/// Execution results, round reports and terminal output all go through this,
/// so the figure shown for a round can never diverge between layers.
pub fn count_issues(issues: &[Issue]) -> usize {
    issues.len()
}

/// Sorted fingerprint multiset of an issue list, used for progress detection.
pub fn fingerprint_set(issues: &[Issue]) -> Vec<String> {
    let mut fps: Vec<String> = issues.iter().map(Issue::fingerprint).collect();
    fps.sort();
    fps
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Issue {
        Issue::new("ruff-check", IssueType::ImportError, Severity::Medium, "F401 `os` imported but unused", "app.py")
    }

    #[test]
    fn test_issue_type_roundtrip_names() {
        for t in IssueType::ALL {
            assert_eq!(IssueType::parse(t.as_str()), Some(t));
        }
        assert_eq!(IssueType::parse("nonsense"), None);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn test_fingerprint_is_stable() {
        assert_eq!(sample().fingerprint(), sample().fingerprint());
        assert_eq!(sample().fingerprint().len(), 64);
    }

    #[test]
    fn test_fingerprint_ignores_line() {
        let a = sample().at_line(3);
        let b = sample().at_line(30);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_fingerprint_differs_by_file() {
        let a = sample();
        let b = sample().with_file_path("other.py");
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fingerprint_ignores_surrounding_whitespace() {
        let a = fingerprint(IssueType::Formatting, "msg", Path::new("a.py"));
        let b = fingerprint(IssueType::Formatting, "  msg \n", Path::new("a.py"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_location() {
        assert_eq!(sample().location(), "app.py");
        assert_eq!(sample().at_line(7).location(), "app.py:7");
    }

    #[test]
    fn test_id_prefix_is_tool() {
        let issue = sample();
        assert!(issue.id.starts_with("ruff-check-"));
    }

    #[test]
    fn test_with_stage_keeps_id() {
        let issue = sample().at_line(1);
        let staged = issue.clone().with_stage("fast");
        assert_eq!(issue.id, staged.id);
        assert_eq!(staged.stage, "fast");
    }

    #[test]
    fn test_count_issues() {
        let issues = vec![sample(), sample().at_line(2)];
        assert_eq!(count_issues(&issues), 2);
        assert_eq!(count_issues(&[]), 0);
    }

    #[test]
    fn test_fingerprint_set_is_sorted_multiset() {
        let a = sample();
        let b = sample().with_file_path("b.py");
        let set1 = fingerprint_set(&[a.clone(), b.clone(), a.clone()]);
        let set2 = fingerprint_set(&[b, a.clone(), a]);
        assert_eq!(set1, set2);
        assert_eq!(set1.len(), 3);
    }
}
