//! Post-apply validation of every file touched in a round.

use std::path::{Path, PathBuf};

use super::syntax::check_syntax;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub checked: usize,
    /// `path: reason` for every file that failed to re-parse.
    pub failures: Vec<String>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct SafetyValidator {
    root: PathBuf,
}

impl SafetyValidator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Re-read and re-parse each touched file. Files that no longer exist
    /// were created and removed within the round and are skipped.
    pub async fn validate(&self, touched: &[PathBuf]) -> ValidationReport {
        let mut report = ValidationReport::default();
        for rel in touched {
            let full = self.root.join(rel);
            if !full.exists() {
                continue;
            }
            report.checked += 1;
            match tokio::fs::read_to_string(&full).await {
                Ok(content) => {
                    if let Err(e) = check_syntax(rel, &content) {
                        report.failures.push(e.to_string());
                    }
                }
                Err(e) => report.failures.push(format!("{}: {}", rel.display(), e)),
            }
        }

        if report.is_ok() {
            log::debug!("Validated {} touched file(s)", report.checked);
        } else {
            log::warn!("Validation failed: {}", report.failures.join("; "));
        }
        report
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
