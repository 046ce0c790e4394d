//! Configurable adapter for any tool that prints `path:line[:col]: message`.

use std::path::PathBuf;

use super::parse::{is_noise, split_location};
use super::traits::{RawOutput, ToolAdapter, command_with_files};
use crate::domain::{Issue, IssueType, Severity};

pub struct GenericAdapter {
    name: String,
    base: Vec<String>,
    issue_type: IssueType,
    severity: Severity,
}

impl GenericAdapter {
    pub const NAME: &'static str = "generic";

    pub fn new(name: impl Into<String>, base: Vec<String>) -> Self {
        Self {
            name: name.into(),
            base,
            issue_type: IssueType::Formatting,
            severity: Severity::Medium,
        }
    }

    pub fn with_issue_type(mut self, issue_type: IssueType) -> Self {
        self.issue_type = issue_type;
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }
}

impl ToolAdapter for GenericAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn build_command(&self, files: &[PathBuf]) -> Vec<String> {
        command_with_files(&self.base, files, None)
    }

    fn parse_output(&self, raw: &RawOutput) -> Vec<Issue> {
        raw.lines()
            .filter(|line| !is_noise(line))
            .filter_map(|line| {
                let loc = split_location(line)?;
                if loc.rest.is_empty() {
                    return None;
                }
                Some(Issue::new(&self.name, self.issue_type, self.severity, loc.rest, loc.file).at_line(loc.line))
            })
            .collect()
    }
}
