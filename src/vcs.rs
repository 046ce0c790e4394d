//! Version-control queries used for incremental runs.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use crate::adapters::{argv, process};
use crate::error::{Result, TidyError};

const GIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Files changed since a base revision.
#[async_trait]
pub trait ChangedFiles: Send + Sync {
    /// Paths relative to the project root. May include deleted files.
    async fn changed_files(&self, base_ref: &str) -> Result<Vec<PathBuf>>;
}

/// `git diff --name-only <base>` plus untracked files.
pub struct GitChangedFiles {
    root: PathBuf,
}

impl GitChangedFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn git(&self, args: &[&str]) -> Result<String> {
        let mut cmd = argv(&["git"]);
        cmd.extend(args.iter().map(|a| a.to_string()));
        let raw = process::run_command(&cmd, &self.root, GIT_TIMEOUT).await?;
        if raw.timed_out {
            return Err(TidyError::ToolExecution(format!("git {} timed out", args.join(" "))));
        }
        if !raw.success() {
            return Err(TidyError::ToolExecution(format!(
                "git {} failed: {}",
                args.join(" "),
                raw.stderr.trim()
            )));
        }
        Ok(raw.stdout)
    }
}

#[async_trait]
impl ChangedFiles for GitChangedFiles {
    async fn changed_files(&self, base_ref: &str) -> Result<Vec<PathBuf>> {
        let tracked = self.git(&["diff", "--name-only", base_ref, "--"]).await?;
        let untracked = self.git(&["ls-files", "--others", "--exclude-standard"]).await?;
        let files = merge_name_lists(&[&tracked, &untracked]);
        log::debug!("{} files changed since {}", files.len(), base_ref);
        Ok(files)
    }
}

/// Fixed list of changed files.
pub struct StaticChangedFiles(pub Vec<PathBuf>);

#[async_trait]
impl ChangedFiles for StaticChangedFiles {
    async fn changed_files(&self, _base_ref: &str) -> Result<Vec<PathBuf>> {
        Ok(self.0.clone())
    }
}

/// Merge newline-separated path lists, dropping blanks and duplicates.
fn merge_name_lists(lists: &[&str]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = lists
        .iter()
        .flat_map(|list| list.lines())
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .collect();
    files.sort();
    files.dedup();
    files
}

/// Keep only paths that still exist under `root`.
pub fn existing_only(root: &Path, files: Vec<PathBuf>) -> Vec<PathBuf> {
    files
        .into_iter()
        .filter(|f| {
            let exists = root.join(f).is_file();
            if !exists {
                log::debug!("Dropping deleted file {}", f.display());
            }
            exists
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_merge_name_lists() {
        let files = merge_name_lists(&["b.py\na.py\n\n", "a.py\nnew.py\n"]);
        assert_eq!(files, vec![PathBuf::from("a.py"), PathBuf::from("b.py"), PathBuf::from("new.py")]);
    }

    #[test]
    fn test_existing_only_drops_deleted() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("kept.py"), "x = 1\n").unwrap();
        let files = existing_only(dir.path(), vec![PathBuf::from("kept.py"), PathBuf::from("gone.py")]);
        assert_eq!(files, vec![PathBuf::from("kept.py")]);
    }

    #[tokio::test]
    async fn test_static_changed_files() {
        let source = StaticChangedFiles(vec![PathBuf::from("a.py")]);
        assert_eq!(source.changed_files("HEAD").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_git_changed_files_in_repo() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let git = |args: &[&str]| {
            std::process::Command::new("git")
                .args(args)
                .current_dir(root)
                .output()
                .map(|o| o.status.success())
                .unwrap_or(false)
        };
        if !git(&["init", "-q"]) {
            // git unavailable in this environment
            return;
        }
        git(&["config", "user.email", "dev@example.com"]);
        git(&["config", "user.name", "dev"]);
        fs::write(root.join("tracked.py"), "x = 1\n").unwrap();
        git(&["add", "."]);
        git(&["commit", "-q", "-m", "init"]);

        fs::write(root.join("tracked.py"), "x = 2\n").unwrap();
        fs::write(root.join("untracked.py"), "y = 1\n").unwrap();

        let files = GitChangedFiles::new(root).changed_files("HEAD").await.unwrap();
        assert_eq!(files, vec![PathBuf::from("tracked.py"), PathBuf::from("untracked.py")]);
    }

    #[tokio::test]
    async fn test_git_outside_repo_is_error() {
        let dir = TempDir::new().unwrap();
        let result = GitChangedFiles::new(dir.path()).changed_files("HEAD").await;
        assert!(result.is_err());
    }
}
