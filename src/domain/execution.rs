//! Per-hook execution results.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::issue::{Issue, count_issues};

/// Outcome of one hook invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookStatus {
    /// Tool ran and reported nothing.
    Passed,
    /// Tool ran and reported findings.
    Failed,
    /// Tool could not run, or exited abnormally without parseable findings.
    Error,
    /// Tool exceeded its timeout and was killed.
    Timeout,
}

impl HookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookStatus::Passed => "passed",
            HookStatus::Failed => "failed",
            HookStatus::Error => "error",
            HookStatus::Timeout => "timeout",
        }
    }

    /// Whether the outcome came from the process layer rather than the code.
    pub fn is_infrastructure_failure(&self) -> bool {
        matches!(self, HookStatus::Error | HookStatus::Timeout)
    }
}

impl fmt::Display for HookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of running one hook once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub hook_name: String,

    pub status: HookStatus,

    /// Combined stdout/stderr as captured from the tool.
    pub raw_output: String,

    /// Issues the normalizer derived from `raw_output`.
    pub issues: Vec<Issue>,

    pub exit_code: Option<i32>,

    #[serde(with = "duration_ms")]
    pub duration: Duration,

    /// Number of files passed to the tool (0 for project-wide runs).
    pub files_processed: usize,

    /// How many times the hook was started (retries included).
    pub attempts: u32,

    /// Diagnostic text for ERROR/TIMEOUT outcomes.
    pub error_message: Option<String>,
}

impl ExecutionResult {
    /// Build a result from a completed run and its normalized issues.
    pub fn completed(
        hook_name: impl Into<String>,
        exit_code: Option<i32>,
        raw_output: impl Into<String>,
        issues: Vec<Issue>,
        duration: Duration,
    ) -> Self {
        let status = if count_issues(&issues) > 0 {
            HookStatus::Failed
        } else {
            HookStatus::Passed
        };
        Self {
            hook_name: hook_name.into(),
            status,
            raw_output: raw_output.into(),
            issues,
            exit_code,
            duration,
            files_processed: 0,
            attempts: 1,
            error_message: None,
        }
    }

    /// Build an ERROR result carrying diagnostic text.
    pub fn error(
        hook_name: impl Into<String>,
        message: impl Into<String>,
        raw_output: impl Into<String>,
        exit_code: Option<i32>,
        duration: Duration,
    ) -> Self {
        Self {
            hook_name: hook_name.into(),
            status: HookStatus::Error,
            raw_output: raw_output.into(),
            issues: Vec::new(),
            exit_code,
            duration,
            files_processed: 0,
            attempts: 1,
            error_message: Some(message.into()),
        }
    }

    /// Build a TIMEOUT result.
    pub fn timeout(hook_name: impl Into<String>, timeout: Duration) -> Self {
        Self {
            hook_name: hook_name.into(),
            status: HookStatus::Timeout,
            raw_output: String::new(),
            issues: Vec::new(),
            exit_code: None,
            duration: timeout,
            files_processed: 0,
            attempts: 1,
            error_message: Some(format!("Timed out after {:?}", timeout)),
        }
    }

    pub fn with_files_processed(mut self, count: usize) -> Self {
        self.files_processed = count;
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Number of issues found. Always equals the normalized issue list length.
    pub fn issues_found(&self) -> usize {
        count_issues(&self.issues)
    }
}

/// Total issue count across a round's execution results.
pub fn total_issues(results: &[ExecutionResult]) -> usize {
    results.iter().map(ExecutionResult::issues_found).sum()
}

/// Flatten a round's execution results into one issue list.
pub fn collect_issues(results: &[ExecutionResult]) -> Vec<Issue> {
    results.iter().flat_map(|r| r.issues.iter().cloned()).collect()
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
