//! bandit security scanner adapter (JSON output).

use std::path::PathBuf;

use serde::Deserialize;

use super::parse::{entries, extract_json, has_path, parse_entries};
use super::traits::{RawOutput, ToolAdapter, argv};
use crate::domain::{Issue, IssueType, Severity};

pub struct BanditAdapter {
    base: Vec<String>,
}

impl BanditAdapter {
    pub const NAME: &'static str = "bandit";

    pub fn new() -> Self {
        Self::with_command(None)
    }

    pub fn with_command(command: Option<Vec<String>>) -> Self {
        Self {
            base: command.unwrap_or_else(|| argv(&["bandit", "-f", "json", "-q"])),
        }
    }
}

impl Default for BanditAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct Finding {
    filename: String,
    issue_text: String,
    issue_severity: String,
    line_number: u32,
    #[serde(default)]
    test_id: Option<String>,
}

fn severity(level: &str) -> Severity {
    match level.to_ascii_uppercase().as_str() {
        "HIGH" => Severity::High,
        "MEDIUM" => Severity::Medium,
        _ => Severity::Low,
    }
}

impl ToolAdapter for BanditAdapter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn build_command(&self, files: &[PathBuf]) -> Vec<String> {
        let mut argv = self.base.clone();
        if files.is_empty() {
            argv.extend(["-r".to_string(), ".".to_string()]);
        } else {
            argv.extend(files.iter().map(|f| f.to_string_lossy().to_string()));
        }
        argv
    }

    fn parse_output(&self, raw: &RawOutput) -> Vec<Issue> {
        let Some(doc) = extract_json(&raw.stdout) else {
            return Vec::new();
        };
        let findings: Vec<Finding> = parse_entries(Self::NAME, entries(&doc, "results"));

        findings
            .into_iter()
            .filter(|f| has_path(Self::NAME, &f.filename))
            .map(|f| {
                let message = match &f.test_id {
                    Some(id) => format!("{} {}", id, f.issue_text),
                    None => f.issue_text.clone(),
                };
                Issue::new(Self::NAME, IssueType::Security, severity(&f.issue_severity), message, f.filename)
                    .at_line(f.line_number)
            })
            .collect()
    }
}
