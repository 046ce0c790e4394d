//! File edit capability handed to fix agents.
//!
//! A [`FileEditor`] is scoped to one round: every write goes through the
//! round's [`RoundSnapshot`] first, proposed content is parsed before it
//! reaches disk, and paths may not leave the project root. Agents see it
//! through an [`EditSession`], which records one attempt's edits so the
//! attempt can be cached or reverted on its own.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;

use super::snapshot::RoundSnapshot;
use super::syntax::check_syntax;
use crate::domain::{FileEdit, content_hash};
use crate::error::{Result, TidyError};

/// Outcome of a conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// New content equals the current content; nothing was written.
    Unchanged,
    /// The file no longer has the expected content.
    Conflict,
}

/// One applied change, with the content it replaced.
#[derive(Debug, Clone)]
pub struct AppliedChange {
    pub path: PathBuf,
    pub before: Option<String>,
    pub after: String,
}

pub struct FileEditor {
    root: PathBuf,
    snapshot: Arc<RoundSnapshot>,
}

impl FileEditor {
    pub fn new(snapshot: Arc<RoundSnapshot>) -> Self {
        let root = snapshot.root();
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        Self { root, snapshot }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn snapshot(&self) -> &Arc<RoundSnapshot> {
        &self.snapshot
    }

    /// Resolve `path` to a root-relative path, rejecting anything that escapes
    /// the root lexically or through a symlink.
    pub fn resolve(&self, path: &Path) -> Result<PathBuf> {
        let relative = if path.is_absolute() {
            path.strip_prefix(&self.root)
                .or_else(|_| path.strip_prefix(self.snapshot.root()))
                .map_err(|_| self.violation(path))?
        } else {
            path
        };

        let mut clean = PathBuf::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => clean.push(part),
                Component::CurDir => {}
                Component::ParentDir => {
                    if !clean.pop() {
                        return Err(self.violation(path));
                    }
                }
                Component::RootDir | Component::Prefix(_) => return Err(self.violation(path)),
            }
        }
        if clean.as_os_str().is_empty() {
            return Err(self.violation(path));
        }

        // Existing files (or their nearest existing parent) must stay inside
        // the root once symlinks are resolved.
        let full = self.root.join(&clean);
        let canonical = full
            .ancestors()
            .find(|p| p.exists())
            .and_then(|p| p.canonicalize().ok());
        if canonical.is_some_and(|c| !c.starts_with(&self.root)) {
            return Err(self.violation(path));
        }

        Ok(clean)
    }

    fn violation(&self, path: &Path) -> TidyError {
        TidyError::Sandbox(format!("{} escapes {}", path.display(), self.root.display()))
    }

    pub async fn read(&self, path: &Path) -> Result<String> {
        let rel = self.resolve(path)?;
        Ok(tokio::fs::read_to_string(self.root.join(rel)).await?)
    }

    /// Read-modify-write under the path lock. `f` sees the current content
    /// (`None` when missing) and returns the new content, or `None` to leave
    /// the file alone.
    pub async fn update<F>(&self, path: &Path, f: F) -> Result<Option<AppliedChange>>
    where
        F: FnOnce(Option<&str>) -> Result<Option<String>>,
    {
        let rel = self.resolve(path)?;
        let guard = self.snapshot.lock(&rel).await;
        let full = self.root.join(&rel);

        let before = match tokio::fs::read_to_string(&full).await {
            Ok(content) => Some(content),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        let Some(after) = f(before.as_deref())? else {
            return Ok(None);
        };
        if before.as_deref() == Some(after.as_str()) {
            return Ok(None);
        }

        check_syntax(&rel, &after)?;
        self.snapshot.ensure(&guard).await?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, &after).await?;
        log::debug!("Wrote {} ({} bytes)", rel.display(), after.len());

        Ok(Some(AppliedChange {
            path: rel,
            before,
            after,
        }))
    }

    /// Put `content` back exactly, or remove the file when `content` is `None`.
    /// Used to revert an attempt; skips the syntax check since the content is
    /// what was on disk before.
    async fn restore(&self, rel: &Path, content: Option<&str>) -> Result<()> {
        let _guard = self.snapshot.lock(rel).await;
        let full = self.root.join(rel);
        match content {
            Some(content) => tokio::fs::write(&full, content).await?,
            None => match tokio::fs::remove_file(&full).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            },
        }
        Ok(())
    }

    /// Files written through this editor so far in the round.
    pub async fn touched(&self) -> Vec<PathBuf> {
        self.snapshot.touched().await
    }
}

/// One agent attempt's view of the editor.
pub struct EditSession {
    editor: Arc<FileEditor>,
    originals: Mutex<BTreeMap<PathBuf, Option<String>>>,
    edits: Mutex<Vec<FileEdit>>,
}

impl EditSession {
    pub fn new(editor: Arc<FileEditor>) -> Self {
        Self {
            editor,
            originals: Mutex::new(BTreeMap::new()),
            edits: Mutex::new(Vec::new()),
        }
    }

    pub fn root(&self) -> &Path {
        self.editor.root()
    }

    pub async fn read(&self, path: &Path) -> Result<String> {
        self.editor.read(path).await
    }

    /// Transform an existing file. Returns whether anything was written.
    pub async fn modify<F>(&self, path: &Path, f: F) -> Result<bool>
    where
        F: FnOnce(&str) -> Option<String>,
    {
        let display = path.display().to_string();
        let change = self
            .editor
            .update(path, |current| match current {
                Some(content) => Ok(f(content)),
                None => Err(TidyError::Io(std::io::Error::new(
                    ErrorKind::NotFound,
                    format!("{} does not exist", display),
                ))),
            })
            .await?;
        Ok(self.record(change).await)
    }

    /// Write `content` only if the file still hashes to `expected_sha256`
    /// (empty meaning the file must not exist).
    pub async fn write_if_unchanged(&self, path: &Path, expected_sha256: &str, content: &str) -> Result<WriteOutcome> {
        let mut conflict = false;
        let change = self
            .editor
            .update(path, |current| {
                let current_sha = current.map(content_hash).unwrap_or_default();
                if current_sha != expected_sha256 {
                    conflict = true;
                    return Ok(None);
                }
                Ok(Some(content.to_string()))
            })
            .await?;

        if conflict {
            return Ok(WriteOutcome::Conflict);
        }
        Ok(if self.record(change).await {
            WriteOutcome::Written
        } else {
            WriteOutcome::Unchanged
        })
    }

    /// Replay recorded edits. Every edit's `before_sha256` must match the
    /// current content up front; returns `false` without writing otherwise.
    /// A conflict midway reverts what this call wrote.
    pub async fn replay(&self, edits: &[FileEdit]) -> Result<bool> {
        for edit in edits {
            let current = match self.editor.read(&edit.path).await {
                Ok(content) => content_hash(&content),
                Err(TidyError::Io(e)) if e.kind() == ErrorKind::NotFound => String::new(),
                Err(e) => return Err(e),
            };
            if current != edit.before_sha256 {
                log::debug!("Cached edit for {} is stale", edit.path.display());
                return Ok(false);
            }
        }

        for edit in edits {
            let outcome = self
                .write_if_unchanged(&edit.path, &edit.before_sha256, &edit.after_content)
                .await;
            match outcome {
                Ok(WriteOutcome::Conflict) => {
                    self.revert().await?;
                    return Ok(false);
                }
                Ok(_) => {}
                Err(e) => {
                    self.revert().await?;
                    return Err(e);
                }
            }
        }
        Ok(true)
    }

    async fn record(&self, change: Option<AppliedChange>) -> bool {
        let Some(change) = change else {
            return false;
        };

        let mut originals = self.originals.lock().await;
        let original = originals
            .entry(change.path.clone())
            .or_insert_with(|| change.before.clone())
            .clone();

        let mut edits = self.edits.lock().await;
        match edits.iter_mut().find(|e| e.path == change.path) {
            Some(edit) => edit.after_content = change.after,
            None => edits.push(FileEdit::new(change.path, original.as_deref(), change.after)),
        }
        true
    }

    /// Edits recorded so far, one per file, first-before to last-after.
    pub async fn edits(&self) -> Vec<FileEdit> {
        self.edits.lock().await.clone()
    }

    pub async fn files_modified(&self) -> Vec<PathBuf> {
        self.edits.lock().await.iter().map(|e| e.path.clone()).collect()
    }

    /// Undo this session's writes, leaving other sessions' edits in place.
    pub async fn revert(&self) -> Result<()> {
        let originals = std::mem::take(&mut *self.originals.lock().await);
        self.edits.lock().await.clear();
        for (path, content) in &originals {
            self.editor.restore(path, content.as_deref()).await?;
        }
        if !originals.is_empty() {
            log::debug!("Reverted {} file(s)", originals.len());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        editor: Arc<FileEditor>,
    }

    impl Fixture {
        fn root(&self) -> PathBuf {
            self.dir.path().join("project")
        }

        fn write(&self, rel: &str, content: &str) {
            fs::write(self.root().join(rel), content).unwrap();
        }

        fn read(&self, rel: &str) -> String {
            fs::read_to_string(self.root().join(rel)).unwrap()
        }
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("project");
        fs::create_dir_all(&root).unwrap();
        let snapshot = Arc::new(RoundSnapshot::new(&root, &dir.path().join("backups"), 1));
        let editor = Arc::new(FileEditor::new(snapshot));
        Fixture { dir, editor }
    }

    #[test]
    fn test_resolve_rejects_escapes() {
        let f = fixture();
        assert!(matches!(f.editor.resolve(Path::new("../outside.py")), Err(TidyError::Sandbox(_))));
        assert!(matches!(f.editor.resolve(Path::new("/etc/passwd")), Err(TidyError::Sandbox(_))));
        assert_eq!(
            f.editor.resolve(Path::new("./pkg/../a.py")).unwrap(),
            PathBuf::from("a.py")
        );
        let absolute = f.editor.root().join("a.py");
        assert_eq!(f.editor.resolve(&absolute).unwrap(), PathBuf::from("a.py"));
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_rejects_symlink_escape() {
        let f = fixture();
        let outside = f.dir.path().join("outside");
        fs::create_dir_all(&outside).unwrap();
        std::os::unix::fs::symlink(&outside, f.root().join("link")).unwrap();
        assert!(matches!(f.editor.resolve(Path::new("link/x.py")), Err(TidyError::Sandbox(_))));
    }

    #[tokio::test]
    async fn test_modify_records_edit_and_snapshot() {
        let f = fixture();
        f.write("a.py", "x = 1   \n");
        let session = EditSession::new(f.editor.clone());

        let wrote = session
            .modify(Path::new("a.py"), |c| Some(c.replace("   \n", "\n")))
            .await
            .unwrap();
        assert!(wrote);
        assert_eq!(f.read("a.py"), "x = 1\n");

        let edits = session.edits().await;
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].before_sha256, content_hash("x = 1   \n"));
        assert_eq!(edits[0].after_content, "x = 1\n");
        assert_eq!(f.editor.touched().await, vec![PathBuf::from("a.py")]);
    }

    #[tokio::test]
    async fn test_modify_rejects_invalid_syntax() {
        let f = fixture();
        f.write("a.py", "x = 1\n");
        let session = EditSession::new(f.editor.clone());

        let err = session
            .modify(Path::new("a.py"), |_| Some("def broken(:\n".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, TidyError::Validation(_)));
        assert_eq!(f.read("a.py"), "x = 1\n");
        assert!(session.edits().await.is_empty());
        assert!(f.editor.touched().await.is_empty());
    }

    #[tokio::test]
    async fn test_modify_missing_file_fails() {
        let f = fixture();
        let session = EditSession::new(f.editor.clone());
        let err = session
            .modify(Path::new("missing.py"), |c| Some(c.to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, TidyError::Io(_)));
    }

    #[tokio::test]
    async fn test_write_if_unchanged_detects_conflict() {
        let f = fixture();
        f.write("a.py", "x = 1\n");
        let session = EditSession::new(f.editor.clone());

        let stale = content_hash("x = 0\n");
        let outcome = session
            .write_if_unchanged(Path::new("a.py"), &stale, "x = 2\n")
            .await
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Conflict);
        assert_eq!(f.read("a.py"), "x = 1\n");

        let current = content_hash("x = 1\n");
        let outcome = session
            .write_if_unchanged(Path::new("a.py"), &current, "x = 2\n")
            .await
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Written);
        assert_eq!(f.read("a.py"), "x = 2\n");
    }

    #[tokio::test]
    async fn test_revert_only_undoes_own_edits() {
        let f = fixture();
        f.write("a.py", "a = 1\n");
        f.write("b.py", "b = 1\n");

        let first = EditSession::new(f.editor.clone());
        first.modify(Path::new("a.py"), |_| Some("a = 2\n".into())).await.unwrap();

        let second = EditSession::new(f.editor.clone());
        second.modify(Path::new("b.py"), |_| Some("b = 2\n".into())).await.unwrap();
        second.modify(Path::new("b.py"), |_| Some("b = 3\n".into())).await.unwrap();
        second.revert().await.unwrap();

        assert_eq!(f.read("a.py"), "a = 2\n");
        assert_eq!(f.read("b.py"), "b = 1\n");
        assert!(second.edits().await.is_empty());
    }

    #[tokio::test]
    async fn test_replay_requires_matching_hashes() {
        let f = fixture();
        f.write("a.py", "x = 1\n");
        let recorded = vec![FileEdit::new("a.py", Some("x = 1\n"), "x = 2\n")];

        let session = EditSession::new(f.editor.clone());
        assert!(session.replay(&recorded).await.unwrap());
        assert_eq!(f.read("a.py"), "x = 2\n");

        // Content no longer matches the recorded "before".
        let again = EditSession::new(f.editor.clone());
        assert!(!again.replay(&recorded).await.unwrap());
        assert_eq!(f.read("a.py"), "x = 2\n");
    }

    #[tokio::test]
    async fn test_rollback_covers_session_writes() {
        let f = fixture();
        f.write("a.py", "x = 1\n");
        let session = EditSession::new(f.editor.clone());
        session.modify(Path::new("a.py"), |_| Some("x = 9\n".into())).await.unwrap();

        f.editor.snapshot().rollback().await.unwrap();
        assert_eq!(f.read("a.py"), "x = 1\n");
    }
}
