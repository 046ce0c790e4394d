//! pytest adapter.
//!
//! Reads the short test summary (`-rfE`), one issue per failed or erroring test.

use std::path::PathBuf;

use super::traits::{RawOutput, ToolAdapter, argv, command_with_files};
use crate::domain::{Issue, IssueType, Severity};

pub struct PytestAdapter {
    base: Vec<String>,
}

impl PytestAdapter {
    pub const NAME: &'static str = "pytest";

    pub fn new() -> Self {
        Self::with_command(None)
    }

    pub fn with_command(command: Option<Vec<String>>) -> Self {
        Self {
            base: command.unwrap_or_else(|| argv(&["pytest", "-q", "-rfE", "--no-header", "-p", "no:cacheprovider"])),
        }
    }
}

impl Default for PytestAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse `FAILED path::test - message` or `ERROR path - message`.
fn parse_summary_line(line: &str) -> Option<Issue> {
    let rest = line.strip_prefix("FAILED ").or_else(|| line.strip_prefix("ERROR "))?;
    let (node, reason) = match rest.split_once(" - ") {
        Some((node, reason)) => (node.trim(), Some(reason.trim())),
        None => (rest.trim(), None),
    };
    let file = node.split("::").next().unwrap_or(node);
    if file.is_empty() {
        return None;
    }
    let message = match reason {
        Some(reason) => format!("{} failed: {}", node, reason),
        None => format!("{} failed", node),
    };
    Some(Issue::new(PytestAdapter::NAME, IssueType::TestFailure, Severity::High, message, file))
}

impl ToolAdapter for PytestAdapter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn build_command(&self, files: &[PathBuf]) -> Vec<String> {
        command_with_files(&self.base, files, None)
    }

    fn parse_output(&self, raw: &RawOutput) -> Vec<Issue> {
        raw.stdout.lines().filter_map(|line| parse_summary_line(line.trim_end())).collect()
    }
}
