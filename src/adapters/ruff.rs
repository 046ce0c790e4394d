//! Ruff linter and formatter adapters.

use std::path::PathBuf;

use super::parse::{is_noise, split_location};
use super::traits::{RawOutput, ToolAdapter, argv, command_with_files};
use crate::domain::{Issue, IssueType, Severity};

/// `ruff check` in concise output mode.
pub struct RuffCheckAdapter {
    base: Vec<String>,
}

impl RuffCheckAdapter {
    pub const NAME: &'static str = "ruff-check";

    pub fn new() -> Self {
        Self::with_command(None)
    }

    pub fn with_command(command: Option<Vec<String>>) -> Self {
        Self {
            base: command.unwrap_or_else(|| argv(&["ruff", "check", "--output-format=concise", "--no-fix"])),
        }
    }
}

impl Default for RuffCheckAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a ruff rule code to an issue type and severity.
pub fn classify_rule(code: &str) -> (IssueType, Severity) {
    const IMPORT_RULES: [&str; 5] = ["F401", "F811", "I001", "E401", "E402"];
    let digit_after = |prefix: &str| {
        code.strip_prefix(prefix)
            .and_then(|rest| rest.chars().next())
            .is_some_and(|c| c.is_ascii_digit())
    };

    if IMPORT_RULES.contains(&code) || digit_after("I") {
        (IssueType::ImportError, Severity::Medium)
    } else if code == "F841" {
        (IssueType::DeadCode, Severity::Medium)
    } else if code.starts_with("C90") {
        (IssueType::Complexity, Severity::Medium)
    } else if digit_after("S") {
        (IssueType::Security, Severity::High)
    } else if digit_after("D") {
        (IssueType::Documentation, Severity::Low)
    } else if code.starts_with("PERF") {
        (IssueType::Performance, Severity::Low)
    } else if code == "F821" || code.starts_with("E9") {
        (IssueType::TypeError, Severity::High)
    } else {
        (IssueType::Formatting, Severity::Low)
    }
}

impl ToolAdapter for RuffCheckAdapter {
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
                let code = loc.rest.split_whitespace().next().unwrap_or("");
                let (issue_type, severity) = classify_rule(code.trim_end_matches(':'));
                Some(Issue::new(Self::NAME, issue_type, severity, loc.rest, loc.file).at_line(loc.line))
            })
            .collect()
    }
}

/// `ruff format --check`: one issue per file that would be reformatted.
pub struct RuffFormatAdapter {
    base: Vec<String>,
}

impl RuffFormatAdapter {
    pub const NAME: &'static str = "ruff-format";

    pub fn new() -> Self {
        Self::with_command(None)
    }

    pub fn with_command(command: Option<Vec<String>>) -> Self {
        Self {
            base: command.unwrap_or_else(|| argv(&["ruff", "format", "--check"])),
        }
    }
}

impl Default for RuffFormatAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolAdapter for RuffFormatAdapter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn build_command(&self, files: &[PathBuf]) -> Vec<String> {
        command_with_files(&self.base, files, Some("."))
    }

    fn parse_output(&self, raw: &RawOutput) -> Vec<Issue> {
        raw.lines()
            .filter_map(|line| line.trim().strip_prefix("Would reformat:"))
            .map(str::trim)
            .filter(|path| !path.is_empty())
            .map(|path| Issue::new(Self::NAME, IssueType::Formatting, Severity::Low, "File would be reformatted", path))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_classify_rule() {
        assert_eq!(classify_rule("F401").0, IssueType::ImportError);
        assert_eq!(classify_rule("I002").0, IssueType::ImportError);
        assert_eq!(classify_rule("F841").0, IssueType::DeadCode);
        assert_eq!(classify_rule("C901").0, IssueType::Complexity);
        assert_eq!(classify_rule("S105"), (IssueType::Security, Severity::High));
        assert_eq!(classify_rule("D100").0, IssueType::Documentation);
        assert_eq!(classify_rule("PERF401").0, IssueType::Performance);
        assert_eq!(classify_rule("F821").0, IssueType::TypeError);
        assert_eq!(classify_rule("E999").0, IssueType::TypeError);
        assert_eq!(classify_rule("E501").0, IssueType::Formatting);
        assert_eq!(classify_rule("SIM108").0, IssueType::Formatting);
        assert_eq!(classify_rule("DTZ005").0, IssueType::Formatting);
    }

    #[test]
    fn test_check_parses_concise_output() {
        let stdout = "\
app.py:1:8: F401 [*] `os` imported but unused
app.py:10:5: F841 Local variable `x` is assigned to but never used
lib/util.py:3:1: E501 Line too long (120 > 88)
Found 3 errors.
[*] 1 fixable with the `--fix` option.
";
        let issues = RuffCheckAdapter::new().parse_output(&RawOutput::new(Some(1), stdout, ""));
        assert_eq!(issues.len(), 3);
        assert_eq!(issues[0].issue_type, IssueType::ImportError);
        assert_eq!(issues[0].line_number, Some(1));
        assert_eq!(issues[1].issue_type, IssueType::DeadCode);
        assert_eq!(issues[2].file_path, Path::new("lib/util.py"));
    }

    #[test]
    fn test_check_clean_output() {
        let issues = RuffCheckAdapter::new().parse_output(&RawOutput::new(Some(0), "All checks passed!\n", ""));
        assert!(issues.is_empty());
    }

    #[test]
    fn test_check_build_command() {
        let adapter = RuffCheckAdapter::new();
        let argv = adapter.build_command(&[PathBuf::from("a.py")]);
        assert_eq!(argv.first().map(String::as_str), Some("ruff"));
        assert_eq!(argv.last().map(String::as_str), Some("a.py"));
        assert_eq!(adapter.build_command(&[]).last().map(String::as_str), Some("."));
    }

    #[test]
    fn test_format_parses_would_reformat() {
        let stdout = "Would reformat: a.py\nWould reformat: pkg/b.py\n2 files would be reformatted, 3 files already formatted\n";
        let issues = RuffFormatAdapter::new().parse_output(&RawOutput::new(Some(1), stdout, ""));
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| i.issue_type == IssueType::Formatting));
        assert_eq!(issues[1].file_path, Path::new("pkg/b.py"));
    }

    #[test]
    fn test_command_override() {
        let adapter = RuffFormatAdapter::with_command(Some(argv(&["uvx", "ruff", "format", "--check"])));
        assert_eq!(adapter.build_command(&[])[0], "uvx");
    }
}
