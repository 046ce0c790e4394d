//! Fix attempt results produced by agents.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One file edit performed during a fix attempt.
///
/// Recorded so that a cached decision can be replayed against identical
/// file content without invoking the agent again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEdit {
    pub path: PathBuf,
    /// SHA-256 (hex) of the file content before the edit; empty when the file
    /// did not exist.
    pub before_sha256: String,
    pub after_content: String,
}

impl FileEdit {
    pub fn new(path: impl Into<PathBuf>, before: Option<&str>, after: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            before_sha256: before.map(content_hash).unwrap_or_default(),
            after_content: after.into(),
        }
    }
}

/// Hex SHA-256 of file content.
pub fn content_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Result of one agent attempt on one issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixResult {
    pub success: bool,

    /// Agent's confidence in the fix, in `[0, 1]`.
    pub confidence: f64,

    /// Short descriptions of what was changed.
    pub fixes_applied: Vec<String>,

    pub files_modified: Vec<PathBuf>,

    /// Problems the agent knows it left unresolved.
    pub remaining_issues: Vec<String>,

    #[serde(default)]
    pub recommendations: Vec<String>,

    #[serde(default)]
    pub edits: Vec<FileEdit>,
}

impl FixResult {
    /// Create a successful result with the given confidence.
    pub fn success(confidence: f64) -> Self {
        Self {
            success: true,
            confidence: confidence.clamp(0.0, 1.0),
            fixes_applied: Vec::new(),
            files_modified: Vec::new(),
            remaining_issues: Vec::new(),
            recommendations: Vec::new(),
            edits: Vec::new(),
        }
    }

    /// Create a failed result with a reason.
    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            confidence: 0.0,
            fixes_applied: Vec::new(),
            files_modified: Vec::new(),
            remaining_issues: vec![reason.into()],
            recommendations: Vec::new(),
            edits: Vec::new(),
        }
    }

    pub fn with_fix(mut self, description: impl Into<String>) -> Self {
        self.fixes_applied.push(description.into());
        self
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if !self.files_modified.contains(&path) {
            self.files_modified.push(path);
        }
        self
    }

    pub fn with_recommendation(mut self, text: impl Into<String>) -> Self {
        self.recommendations.push(text.into());
        self
    }

    /// First failure reason, if any.
    pub fn failure_reason(&self) -> Option<&str> {
        if self.success {
            None
        } else {
            self.remaining_issues.first().map(String::as_str)
        }
    }

    /// Whether this result may be stored in the decision cache.
    pub fn is_cacheable(&self, min_confidence: f64) -> bool {
        self.success && self.confidence >= min_confidence
    }

    /// Merge another result into this one.
    pub fn merge(&mut self, other: FixResult) {
        self.success = self.success && other.success;
        self.confidence = self.confidence.min(other.confidence);
        self.fixes_applied.extend(other.fixes_applied);
        for file in other.files_modified {
            if !self.files_modified.contains(&file) {
                self.files_modified.push(file);
            }
        }
        self.remaining_issues.extend(other.remaining_issues);
        self.recommendations.extend(other.recommendations);
        self.edits.extend(other.edits);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_clamps_confidence() {
        assert_eq!(FixResult::success(1.5).confidence, 1.0);
        assert_eq!(FixResult::success(-0.5).confidence, 0.0);
    }

    #[test]
    fn test_failure_has_reason() {
        let result = FixResult::failure("agent timed out");
        assert!(!result.success);
        assert_eq!(result.failure_reason(), Some("agent timed out"));
    }

    #[test]
    fn test_success_has_no_failure_reason() {
        assert_eq!(FixResult::success(0.9).failure_reason(), None);
    }

    #[test]
    fn test_cacheable_requires_success_and_confidence() {
        assert!(FixResult::success(0.7).is_cacheable(0.7));
        assert!(FixResult::success(0.95).is_cacheable(0.7));
        assert!(!FixResult::success(0.69).is_cacheable(0.7));
        assert!(!FixResult::failure("nope").is_cacheable(0.0));
    }

    #[test]
    fn test_with_file_dedupes() {
        let result = FixResult::success(0.9).with_file("a.py").with_file("a.py");
        assert_eq!(result.files_modified.len(), 1);
    }

    #[test]
    fn test_merge() {
        let mut a = FixResult::success(0.9).with_fix("removed import").with_file("a.py");
        let b = FixResult::failure("could not parse").with_file("a.py");
        a.merge(b);
        assert!(!a.success);
        assert_eq!(a.confidence, 0.0);
        assert_eq!(a.files_modified.len(), 1);
        assert_eq!(a.remaining_issues, vec!["could not parse".to_string()]);
    }

    #[test]
    fn test_file_edit_hashes_before_content() {
        let edit = FileEdit::new("a.py", Some("x = 1\n"), "x = 2\n");
        assert_eq!(edit.before_sha256, content_hash("x = 1\n"));
        let created = FileEdit::new("b.py", None, "y = 1\n");
        assert!(created.before_sha256.is_empty());
    }

    #[test]
    fn test_legacy_json_without_edits_deserializes() {
        let json = r#"{"success":true,"confidence":0.8,"fixes_applied":[],"files_modified":[],"remaining_issues":[]}"#;
        let result: FixResult = serde_json::from_str(json).unwrap();
        assert!(result.edits.is_empty());
    }
}
