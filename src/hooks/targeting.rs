//! Target file selection for a run.

use std::path::{Path, PathBuf};

use super::definition::HookDefinition;

/// Files a whole strategy run is scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSet {
    /// Every hook scans the project.
    Full,
    /// Only these files (relative to the root) are in scope.
    Files(Vec<PathBuf>),
}

impl TargetSet {
    /// Scope to `files`, falling back to a full scan above `threshold`.
    pub fn incremental(files: Vec<PathBuf>, threshold: usize) -> Self {
        if files.len() > threshold {
            log::info!(
                "{} changed files exceed the incremental threshold of {}, running a full scan",
                files.len(),
                threshold
            );
            TargetSet::Full
        } else {
            TargetSet::Files(files)
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, TargetSet::Full)
    }
}

/// What one hook is asked to run against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookTarget {
    ProjectWide,
    Files(Vec<PathBuf>),
    /// Nothing in scope; the hook does not run.
    Skip,
}

impl HookTarget {
    /// Files to pass to the adapter (empty for a project-wide run).
    pub fn files(&self) -> &[PathBuf] {
        match self {
            HookTarget::Files(files) => files,
            _ => &[],
        }
    }
}

/// Resolve the target of `hook` within `targets`.
///
/// A hook with `pass_files = false` cannot be narrowed to a file list, so any
/// applicable change escalates it to [`HookTarget::ProjectWide`]. Its issues
/// then cover the whole tree, including files outside the changed set.
pub fn target_for(hook: &HookDefinition, targets: &TargetSet) -> HookTarget {
    match targets {
        TargetSet::Full => HookTarget::ProjectWide,
        TargetSet::Files(files) => {
            let applicable: Vec<PathBuf> = files.iter().filter(|f| hook.applies_to(f)).cloned().collect();
            if applicable.is_empty() {
                HookTarget::Skip
            } else if hook.pass_files {
                HookTarget::Files(applicable)
            } else {
                HookTarget::ProjectWide
            }
        }
    }
}

/// Make explicit file arguments relative to `root` where possible.
pub fn relative_to_root(root: &Path, files: &[PathBuf]) -> Vec<PathBuf> {
    files
        .iter()
        .map(|f| match f.strip_prefix(root) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => f.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn python_hook() -> HookDefinition {
        HookDefinition::new("ruff-check", "ruff-check").with_extensions(&["py"])
    }

    #[test]
    fn test_full_is_project_wide() {
        assert_eq!(target_for(&python_hook(), &TargetSet::Full), HookTarget::ProjectWide);
    }

    #[test]
    fn test_files_filtered_by_extension() {
        let targets = TargetSet::Files(vec![PathBuf::from("a.py"), PathBuf::from("README.md")]);
        assert_eq!(target_for(&python_hook(), &targets), HookTarget::Files(vec![PathBuf::from("a.py")]));
    }

    #[test]
    fn test_no_applicable_files_skips() {
        let targets = TargetSet::Files(vec![PathBuf::from("README.md")]);
        assert_eq!(target_for(&python_hook(), &targets), HookTarget::Skip);
    }

    #[test]
    fn test_project_wide_hook_with_applicable_change() {
        let hook = python_hook().project_wide();
        let targets = TargetSet::Files(vec![PathBuf::from("a.py")]);
        assert_eq!(target_for(&hook, &targets), HookTarget::ProjectWide);
        assert!(target_for(&hook, &targets).files().is_empty());
    }

    #[test]
    fn test_incremental_threshold_fallback() {
        let files: Vec<PathBuf> = (0..5).map(|i| PathBuf::from(format!("f{}.py", i))).collect();
        assert!(TargetSet::incremental(files.clone(), 4).is_full());
        assert_eq!(TargetSet::incremental(files.clone(), 5), TargetSet::Files(files));
    }

    #[test]
    fn test_relative_to_root() {
        let files = vec![PathBuf::from("/p/src/a.py"), PathBuf::from("b.py")];
        assert_eq!(
            relative_to_root(Path::new("/p"), &files),
            vec![PathBuf::from("src/a.py"), PathBuf::from("b.py")]
        );
    }
}
