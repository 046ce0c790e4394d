//! Issue normalization.
//!
//! Turns an adapter's parsed issues into the canonical shape the rest of the
//! system sees: attributed to the hook, stamped with the stage, relative to the
//! project root, and in a deterministic order.

use std::path::{Component, Path, PathBuf};

use super::traits::{RawOutput, ToolAdapter};
use crate::domain::Issue;

/// Normalizes adapter output for one project root.
#[derive(Debug, Clone)]
pub struct IssueNormalizer {
    root: PathBuf,
}

impl IssueNormalizer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Parse `raw` with `adapter` and normalize the result.
    pub fn normalize(&self, adapter: &dyn ToolAdapter, raw: &RawOutput, hook_name: &str, stage: &str) -> Vec<Issue> {
        self.normalize_issues(adapter.parse_output(raw), hook_name, stage)
    }

    /// Normalize already-parsed issues.
    pub fn normalize_issues(&self, issues: Vec<Issue>, hook_name: &str, stage: &str) -> Vec<Issue> {
        let mut normalized: Vec<Issue> = issues
            .into_iter()
            .filter_map(|issue| {
                if issue.file_path.as_os_str().is_empty() {
                    log::warn!("{}: dropping issue without a file path: {}", hook_name, issue.message);
                    return None;
                }
                let path = self.relativize(&issue.file_path);
                let issue = issue.with_file_path(path).with_stage(stage);
                Some(if issue.tool == hook_name {
                    issue
                } else {
                    issue.with_tool(hook_name)
                })
            })
            .collect();

        normalized.sort_by(|a, b| {
            a.file_path
                .cmp(&b.file_path)
                .then(a.line_number.cmp(&b.line_number))
                .then(a.message.cmp(&b.message))
        });
        normalized
    }

    /// Make `path` relative to the root when it lies inside it.
    pub fn relativize(&self, path: &Path) -> PathBuf {
        let cleaned = clean(path);
        if cleaned.is_absolute() {
            if let Ok(rel) = cleaned.strip_prefix(clean(&self.root)) {
                return if rel.as_os_str().is_empty() {
                    PathBuf::from(".")
                } else {
                    rel.to_path_buf()
                };
            }
        }
        cleaned
    }
}

/// Drop `.` components so `./a.py` and `a.py` compare equal.
fn clean(path: &Path) -> PathBuf {
    let cleaned: PathBuf = path.components().filter(|c| !matches!(c, Component::CurDir)).collect();
    if cleaned.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{IssueType, Severity, count_issues};

    struct LineAdapter;

    impl ToolAdapter for LineAdapter {
        fn name(&self) -> &str {
            "lines"
        }

        fn build_command(&self, _files: &[PathBuf]) -> Vec<String> {
            Vec::new()
        }

        fn parse_output(&self, raw: &RawOutput) -> Vec<Issue> {
            raw.stdout
                .lines()
                .map(|l| Issue::new("lines", IssueType::Formatting, Severity::Low, "bad", l))
                .collect()
        }
    }

    #[test]
    fn test_relativize_absolute_inside_root() {
        let n = IssueNormalizer::new("/project");
        assert_eq!(n.relativize(Path::new("/project/src/a.py")), PathBuf::from("src/a.py"));
        assert_eq!(n.relativize(Path::new("/project")), PathBuf::from("."));
    }

    #[test]
    fn test_relativize_keeps_outside_and_relative() {
        let n = IssueNormalizer::new("/project");
        assert_eq!(n.relativize(Path::new("/elsewhere/a.py")), PathBuf::from("/elsewhere/a.py"));
        assert_eq!(n.relativize(Path::new("./src/a.py")), PathBuf::from("src/a.py"));
    }

    #[test]
    fn test_normalize_stamps_stage_and_hook() {
        let n = IssueNormalizer::new("/project");
        let raw = RawOutput::new(Some(1), "/project/b.py\na.py\n", "");
        let issues = n.normalize(&LineAdapter, &raw, "my-hook", "fast");
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| i.stage == "fast" && i.tool == "my-hook"));
        assert!(issues.iter().all(|i| i.id.starts_with("my-hook-")));
        assert_eq!(issues[0].file_path, PathBuf::from("a.py"));
        assert_eq!(issues[1].file_path, PathBuf::from("b.py"));
    }

    #[test]
    fn test_normalize_drops_pathless_and_keeps_duplicates() {
        let n = IssueNormalizer::new("/project");
        let issues = vec![
            Issue::new("t", IssueType::Formatting, Severity::Low, "x", ""),
            Issue::new("t", IssueType::Formatting, Severity::Low, "x", "a.py").at_line(1),
            Issue::new("t", IssueType::Formatting, Severity::Low, "x", "a.py").at_line(1),
        ];
        let normalized = n.normalize_issues(issues, "t", "fast");
        assert_eq!(count_issues(&normalized), 2);
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let n = IssueNormalizer::new("/project");
        let raw = RawOutput::new(Some(1), "c.py\na.py\nb.py\n", "");
        let first = n.normalize(&LineAdapter, &raw, "h", "s");
        let second = n.normalize(&LineAdapter, &raw, "h", "s");
        assert_eq!(first, second);
    }
}
