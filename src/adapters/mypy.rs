//! mypy adapter.

use std::path::PathBuf;

use super::parse::{is_noise, split_location};
use super::traits::{RawOutput, ToolAdapter, argv, command_with_files};
use crate::domain::{Issue, IssueType, Severity};

pub struct MypyAdapter {
    base: Vec<String>,
}

impl MypyAdapter {
    pub const NAME: &'static str = "mypy";

    pub fn new() -> Self {
        Self::with_command(None)
    }

    pub fn with_command(command: Option<Vec<String>>) -> Self {
        Self {
            base: command.unwrap_or_else(|| {
                argv(&["mypy", "--no-color-output", "--no-pretty"])
            }),
        }
    }
}

impl Default for MypyAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// Trailing `[code]` of a mypy message.
fn error_code(message: &str) -> Option<&str> {
    let trimmed = message.trim_end();
    let open = trimmed.rfind('[')?;
    trimmed.ends_with(']').then(|| &trimmed[open + 1..trimmed.len() - 1])
}

impl ToolAdapter for MypyAdapter {
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
                let message = loc.rest.strip_prefix("error:")?.trim();
                let issue_type = match error_code(message) {
                    Some("import" | "import-untyped" | "import-not-found") => IssueType::ImportError,
                    _ => IssueType::TypeError,
                };
                Some(Issue::new(Self::NAME, issue_type, Severity::High, message, loc.file).at_line(loc.line))
            })
            .collect()
    }
}
