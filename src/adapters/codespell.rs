//! codespell adapter.

use std::path::PathBuf;

use super::parse::{is_noise, split_location};
use super::traits::{RawOutput, ToolAdapter, argv, command_with_files};
use crate::domain::{Issue, IssueType, Severity};

pub struct CodespellAdapter {
    base: Vec<String>,
}

impl CodespellAdapter {
    pub const NAME: &'static str = "codespell";

    pub fn new() -> Self {
        Self::with_command(None)
    }

    pub fn with_command(command: Option<Vec<String>>) -> Self {
        Self {
            base: command.unwrap_or_else(|| argv(&["codespell"])),
        }
    }
}

impl Default for CodespellAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolAdapter for CodespellAdapter {
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
                if !loc.rest.contains("==>") {
                    return None;
                }
                let message = format!("Misspelling: {}", loc.rest);
                Some(Issue::new(Self::NAME, IssueType::Documentation, Severity::Low, message, loc.file).at_line(loc.line))
            })
            .collect()
    }
}
