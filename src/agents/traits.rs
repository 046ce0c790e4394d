//! Fix agent contract.

use std::path::Path;

use async_trait::async_trait;

use crate::domain::{FixResult, Issue, IssueType};
use crate::error::Result;
use crate::safety::EditSession;

/// A strategy for fixing one kind of issue.
///
/// Agents touch files only through the [`EditSession`] they are given. An
/// `Err` or an unsuccessful [`FixResult`] both count as a failed attempt; the
/// router reverts whatever the session wrote.
#[async_trait]
pub trait FixAgent: Send + Sync {
    /// Registry name, also the decision-cache key.
    fn name(&self) -> &str;

    fn supported_types(&self) -> &[IssueType];

    /// Confidence in `[0, 1]` that this agent can fix `issue`.
    fn can_handle(&self, issue: &Issue) -> f64;

    async fn analyze_and_fix(&self, issue: &Issue, session: &EditSession) -> Result<FixResult>;
}

/// Whether `path` has one of `extensions` (without the dot).
pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_extension() {
        assert!(has_extension(Path::new("src/a.py"), &["py", "pyi"]));
        assert!(has_extension(Path::new("A.PY"), &["py"]));
        assert!(!has_extension(Path::new("Makefile"), &["py"]));
    }
}
