//! pyright adapter (JSON output).

use std::path::PathBuf;

use serde::Deserialize;

use super::parse::{entries, extract_json, first_line, has_path, parse_entries};
use super::traits::{RawOutput, ToolAdapter, argv, command_with_files};
use crate::domain::{Issue, IssueType, Severity};

pub struct PyrightAdapter {
    base: Vec<String>,
}

impl PyrightAdapter {
    pub const NAME: &'static str = "pyright";

    pub fn new() -> Self {
        Self::with_command(None)
    }

    pub fn with_command(command: Option<Vec<String>>) -> Self {
        Self {
            base: command.unwrap_or_else(|| argv(&["pyright", "--outputjson"])),
        }
    }
}

impl Default for PyrightAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct Diagnostic {
    file: String,
    severity: String,
    message: String,
    #[serde(default)]
    range: Option<Range>,
    #[serde(default)]
    rule: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Range {
    start: Position,
}

#[derive(Debug, Deserialize)]
struct Position {
    line: u32,
}

impl ToolAdapter for PyrightAdapter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn build_command(&self, files: &[PathBuf]) -> Vec<String> {
        command_with_files(&self.base, files, None)
    }

    fn parse_output(&self, raw: &RawOutput) -> Vec<Issue> {
        let Some(doc) = extract_json(&raw.stdout) else {
            return Vec::new();
        };
        let diagnostics: Vec<Diagnostic> = parse_entries(Self::NAME, entries(&doc, "generalDiagnostics"));

        diagnostics
            .into_iter()
            .filter(|d| d.severity != "information" && has_path(Self::NAME, &d.file))
            .map(|d| {
                let severity = if d.severity == "error" { Severity::High } else { Severity::Medium };
                let issue_type = match d.rule.as_deref() {
                    Some("reportMissingImports" | "reportMissingModuleSource" | "reportUnusedImport") => {
                        IssueType::ImportError
                    }
                    Some("reportUnusedVariable" | "reportUnusedFunction" | "reportUnusedClass") => IssueType::DeadCode,
                    _ => IssueType::TypeError,
                };
                let issue = Issue::new(Self::NAME, issue_type, severity, first_line(&d.message), d.file);
                match d.range {
                    // pyright lines are zero-based
                    Some(range) => issue.at_line(range.start.line + 1),
                    None => issue,
                }
            })
            .collect()
    }
}
