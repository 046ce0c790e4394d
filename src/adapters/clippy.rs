//! cargo clippy adapter (short message format).

use std::path::PathBuf;

use super::parse::{is_noise, split_location};
use super::traits::{RawOutput, ToolAdapter, argv};
use crate::domain::{Issue, IssueType, Severity};

pub struct ClippyAdapter {
    base: Vec<String>,
}

impl ClippyAdapter {
    pub const NAME: &'static str = "clippy";

    pub fn new() -> Self {
        Self::with_command(None)
    }

    pub fn with_command(command: Option<Vec<String>>) -> Self {
        Self {
            base: command.unwrap_or_else(|| argv(&["cargo", "clippy", "--message-format=short", "--quiet"])),
        }
    }
}

impl Default for ClippyAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn classify(level: &str, message: &str) -> (IssueType, Severity) {
    if message.starts_with("unused import") {
        (IssueType::ImportError, Severity::Medium)
    } else if message.starts_with("unused") || message.contains("never used") || message.contains("never read") {
        (IssueType::DeadCode, Severity::Medium)
    } else if level == "error" {
        (IssueType::TypeError, Severity::High)
    } else {
        (IssueType::Formatting, Severity::Low)
    }
}

impl ToolAdapter for ClippyAdapter {
    fn name(&self) -> &str {
        Self::NAME
    }

    // cargo works on the whole crate; file targeting happens after parsing.
    fn build_command(&self, _files: &[PathBuf]) -> Vec<String> {
        self.base.clone()
    }

    fn parse_output(&self, raw: &RawOutput) -> Vec<Issue> {
        raw.lines()
            .filter(|line| !is_noise(line))
            .filter_map(|line| {
                let loc = split_location(line)?;
                let (level, message) = loc.rest.split_once(':')?;
                let level = level.trim();
                if level != "warning" && level != "error" {
                    return None;
                }
                let message = message.trim();
                let (issue_type, severity) = classify(level, message);
                Some(Issue::new(Self::NAME, issue_type, severity, message, loc.file).at_line(loc.line))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_short_format() {
        let stderr = "\
src/main.rs:1:5: warning: unused import: `std::fs`
src/main.rs:8:9: warning: unused variable: `x`
src/lib.rs:20:1: warning: this function has too many arguments (9/7)
src/lib.rs:31:13: error: mismatched types
warning: `demo` (bin \"demo\") generated 3 warnings
error: could not compile `demo` (bin \"demo\") due to 1 previous error
";
        let issues = ClippyAdapter::new().parse_output(&RawOutput::new(Some(101), "", stderr));
        assert_eq!(issues.len(), 4);
        assert_eq!(issues[0].issue_type, IssueType::ImportError);
        assert_eq!(issues[1].issue_type, IssueType::DeadCode);
        assert_eq!(issues[2].issue_type, IssueType::Formatting);
        assert_eq!(issues[3].issue_type, IssueType::TypeError);
        assert_eq!(issues[3].severity, Severity::High);
    }

    #[test]
    fn test_ignores_notes() {
        let stderr = "src/main.rs:3:1: note: the lint level is defined here\n";
        assert!(ClippyAdapter::new().parse_output(&RawOutput::new(Some(0), "", stderr)).is_empty());
    }
}
