//! complexipy cognitive-complexity adapter.

use std::path::PathBuf;

use serde::Deserialize;

use super::parse::{entries, extract_json, has_path, parse_entries};
use super::traits::{RawOutput, ToolAdapter, argv, command_with_files};
use crate::domain::{Issue, IssueType, Severity};

/// Functions above this cognitive complexity are reported.
pub const DEFAULT_THRESHOLD: u32 = 15;

pub struct ComplexipyAdapter {
    base: Vec<String>,
    threshold: u32,
}

impl ComplexipyAdapter {
    pub const NAME: &'static str = "complexipy";

    pub fn new() -> Self {
        Self::with_command(None)
    }

    pub fn with_command(command: Option<Vec<String>>) -> Self {
        Self {
            base: command.unwrap_or_else(|| argv(&["complexipy", "--output-json", "--quiet"])),
            threshold: DEFAULT_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: u32) -> Self {
        self.threshold = threshold;
        self
    }
}

impl Default for ComplexipyAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct FunctionComplexity {
    path: String,
    function_name: String,
    complexity: u32,
    #[serde(default)]
    line: Option<u32>,
}

impl ToolAdapter for ComplexipyAdapter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn build_command(&self, files: &[PathBuf]) -> Vec<String> {
        command_with_files(&self.base, files, Some("."))
    }

    fn parse_output(&self, raw: &RawOutput) -> Vec<Issue> {
        let Some(doc) = extract_json(&raw.stdout) else {
            return Vec::new();
        };
        let functions: Vec<FunctionComplexity> = parse_entries(Self::NAME, entries(&doc, "functions"));

        functions
            .into_iter()
            .filter(|f| f.complexity > self.threshold && has_path(Self::NAME, &f.path))
            .map(|f| {
                let severity = if f.complexity > self.threshold * 2 {
                    Severity::High
                } else {
                    Severity::Medium
                };
                let message = format!(
                    "Function '{}' has cognitive complexity {} (threshold {})",
                    f.function_name, f.complexity, self.threshold
                );
                let issue = Issue::new(Self::NAME, IssueType::Complexity, severity, message, f.path);
                match f.line {
                    Some(line) => issue.at_line(line),
                    None => issue,
                }
            })
            .collect()
    }
}
