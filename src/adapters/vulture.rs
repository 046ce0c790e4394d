//! vulture dead-code detector adapter.

use std::path::PathBuf;

use super::parse::{is_noise, split_location};
use super::traits::{RawOutput, ToolAdapter, argv, command_with_files};
use crate::domain::{Issue, IssueType, Severity};

pub struct VultureAdapter {
    base: Vec<String>,
}

impl VultureAdapter {
    pub const NAME: &'static str = "vulture";

    pub fn new() -> Self {
        Self::with_command(None)
    }

    pub fn with_command(command: Option<Vec<String>>) -> Self {
        Self {
            base: command.unwrap_or_else(|| argv(&["vulture", "--min-confidence", "60"])),
        }
    }
}

impl Default for VultureAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// Split `message (NN% confidence)` into the message and the percentage.
fn split_confidence(rest: &str) -> (&str, Option<u32>) {
    let Some(open) = rest.rfind(" (") else {
        return (rest, None);
    };
    let pct = rest[open + 2..]
        .strip_suffix("% confidence)")
        .and_then(|n| n.parse().ok());
    match pct {
        Some(p) => (rest[..open].trim(), Some(p)),
        None => (rest, None),
    }
}

impl ToolAdapter for VultureAdapter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn build_command(&self, files: &[PathBuf]) -> Vec<String> {
        command_with_files(&self.base, files, Some("."))
    }

    fn parse_output(&self, raw: &RawOutput) -> Vec<Issue> {
        raw.stdout
            .lines()
            .filter(|line| !is_noise(line))
            .filter_map(|line| {
                let loc = split_location(line)?;
                let (message, confidence) = split_confidence(loc.rest);
                let issue_type = if message.starts_with("unused import") {
                    IssueType::ImportError
                } else {
                    IssueType::DeadCode
                };
                let severity = if confidence.unwrap_or(0) >= 90 { Severity::Medium } else { Severity::Low };
                Some(Issue::new(Self::NAME, issue_type, severity, message, loc.file).at_line(loc.line))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_confidence() {
        assert_eq!(split_confidence("unused import 'os' (90% confidence)"), ("unused import 'os'", Some(90)));
        assert_eq!(split_confidence("unused variable 'x'"), ("unused variable 'x'", None));
        assert_eq!(split_confidence("odd (thing)"), ("odd (thing)", None));
    }

    #[test]
    fn test_parses_findings() {
        let stdout = "\
app.py:1: unused import 'os' (90% confidence)
app.py:14: unused function 'helper' (60% confidence)
";
        let issues = VultureAdapter::new().parse_output(&RawOutput::new(Some(3), stdout, ""));
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].issue_type, IssueType::ImportError);
        assert_eq!(issues[0].severity, Severity::Medium);
        assert_eq!(issues[0].message, "unused import 'os'");
        assert_eq!(issues[1].issue_type, IssueType::DeadCode);
        assert_eq!(issues[1].severity, Severity::Low);
        assert_eq!(issues[1].line_number, Some(14));
    }
}
