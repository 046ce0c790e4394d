//! Structured results of an autofix run.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::domain::{Issue, count_issues};

/// How the convergence loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// No issues left.
    Converged,
    /// The issue list stopped changing.
    Stuck,
    /// The fix-round budget ran out.
    Exhausted,
    Cancelled,
}

impl Termination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Termination::Converged => "converged",
            Termination::Stuck => "stuck",
            Termination::Exhausted => "exhausted",
            Termination::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoundDisposition {
    /// Edits kept; the re-run list becomes the next round's input.
    Accepted,
    /// Edits undone.
    RolledBack { reason: String },
    /// No agent changed any file.
    NoChanges,
    /// Cancelled mid-round; partial edits rolled back.
    Cancelled,
}

impl RoundDisposition {
    pub fn is_accepted(&self) -> bool {
        matches!(self, RoundDisposition::Accepted)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RoundReport {
    pub round: u32,
    /// Size of this round's COLLECT list.
    pub issues_to_fix: usize,
    pub attempted: usize,
    pub fixed: usize,
    pub from_cache: usize,
    pub files_modified: Vec<PathBuf>,
    /// Count after the re-run, when one happened.
    pub issues_after: Option<usize>,
    pub disposition: RoundDisposition,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
}

impl RoundReport {
    pub fn new(round: u32, collected: &[Issue]) -> Self {
        Self {
            round,
            issues_to_fix: count_issues(collected),
            attempted: 0,
            fixed: 0,
            from_cache: 0,
            files_modified: Vec::new(),
            issues_after: None,
            disposition: RoundDisposition::NoChanges,
            duration: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AutofixReport {
    pub termination: Termination,
    /// Round at whose start the loop terminated.
    pub iterations: u32,
    pub initial_issues: usize,
    pub rounds: Vec<RoundReport>,
    pub final_issues: Vec<Issue>,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
}

impl AutofixReport {
    pub fn remaining(&self) -> usize {
        count_issues(&self.final_issues)
    }

    pub fn resolved(&self) -> usize {
        self.initial_issues.saturating_sub(self.remaining())
    }

    pub fn rounds_accepted(&self) -> usize {
        self.rounds.iter().filter(|r| r.disposition.is_accepted()).count()
    }

    pub fn is_clean(&self) -> bool {
        self.termination == Termination::Converged
    }

    /// One-line summary for terminal output and logs.
    pub fn summary(&self) -> String {
        format!(
            "{} after {} round(s): {} of {} issue(s) resolved, {} remaining",
            self.termination,
            self.iterations,
            self.resolved(),
            self.initial_issues,
            self.remaining()
        )
    }
}

mod duration_ms {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}
