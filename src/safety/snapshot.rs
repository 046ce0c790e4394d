//! Per-round snapshots and all-or-nothing rollback.
//!
//! Before a file's first write in a round its original bytes are copied into
//! the round's backup directory. Files that did not exist are recorded as
//! created, and rollback removes them. A manifest next to the backups maps
//! each backup to its original path so retained backups can be recovered by
//! hand.

use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::OwnedMutexGuard;

use crate::error::{Result, TidyError};

/// Exclusive access to one path for the duration of a read-modify-write.
pub struct PathGuard {
    path: PathBuf,
    _guard: OwnedMutexGuard<()>,
}

impl PathGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Debug, Clone, Serialize)]
struct SnapshotEntry {
    /// Backup file name inside the round directory; `None` when the file was
    /// created during the round.
    backup: Option<String>,
    /// Missing ancestors of a created file, deepest first.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    created_dirs: Vec<PathBuf>,
}

/// Outcome of a successful rollback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollbackReport {
    pub restored: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
    /// Directories the round created for new files, removed once empty.
    pub removed_dirs: Vec<PathBuf>,
}

pub struct RoundSnapshot {
    root: PathBuf,
    dir: PathBuf,
    entries: tokio::sync::Mutex<BTreeMap<PathBuf, SnapshotEntry>>,
    locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
    next_backup: AtomicUsize,
}

impl RoundSnapshot {
    /// Snapshot for `round`, backing up into a fresh directory under `backup_root`.
    pub fn new(root: impl Into<PathBuf>, backup_root: &Path, round: u32) -> Self {
        let stamp = chrono::Utc::now().format("%Y%m%d%H%M%S%3f");
        Self {
            root: root.into(),
            dir: backup_root.join(format!("round-{}-{}", round, stamp)),
            entries: tokio::sync::Mutex::new(BTreeMap::new()),
            locks: Mutex::new(HashMap::new()),
            next_backup: AtomicUsize::new(0),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn backup_dir(&self) -> &Path {
        &self.dir
    }

    /// Acquire the per-path lock for `rel`.
    pub async fn lock(&self, rel: &Path) -> PathGuard {
        let mutex = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.entry(rel.to_path_buf()).or_default().clone()
        };
        PathGuard {
            path: rel.to_path_buf(),
            _guard: mutex.lock_owned().await,
        }
    }

    /// Record the path's original content unless already recorded this round.
    pub async fn ensure(&self, guard: &PathGuard) -> Result<()> {
        let rel = guard.path();
        if self.entries.lock().await.contains_key(rel) {
            return Ok(());
        }

        let source = self.root.join(rel);
        let entry = match tokio::fs::read(&source).await {
            Ok(bytes) => {
                tokio::fs::create_dir_all(&self.dir)
                    .await
                    .map_err(|e| TidyError::Snapshot(format!("Failed to create {}: {}", self.dir.display(), e)))?;
                let name = format!("{:05}.bak", self.next_backup.fetch_add(1, Ordering::SeqCst));
                tokio::fs::write(self.dir.join(&name), bytes)
                    .await
                    .map_err(|e| TidyError::Snapshot(format!("Failed to back up {}: {}", rel.display(), e)))?;
                SnapshotEntry {
                    backup: Some(name),
                    created_dirs: Vec::new(),
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => SnapshotEntry {
                backup: None,
                created_dirs: self.missing_parents(rel).await,
            },
            Err(e) => return Err(TidyError::Snapshot(format!("Failed to read {}: {}", rel.display(), e))),
        };

        let mut entries = self.entries.lock().await;
        entries.entry(rel.to_path_buf()).or_insert(entry);
        self.write_manifest(&entries).await;
        Ok(())
    }

    /// Ancestors of `rel` below the root that do not exist yet, deepest first.
    async fn missing_parents(&self, rel: &Path) -> Vec<PathBuf> {
        let mut missing = Vec::new();
        let mut dir = rel.parent();
        while let Some(d) = dir {
            if d.as_os_str().is_empty() || tokio::fs::try_exists(self.root.join(d)).await.unwrap_or(true) {
                break;
            }
            missing.push(d.to_path_buf());
            dir = d.parent();
        }
        missing
    }

    async fn write_manifest(&self, entries: &BTreeMap<PathBuf, SnapshotEntry>) {
        if !self.dir.exists() {
            return;
        }
        match serde_json::to_string_pretty(entries) {
            Ok(json) => {
                if let Err(e) = tokio::fs::write(self.dir.join("manifest.json"), json).await {
                    log::warn!("Failed to write snapshot manifest: {}", e);
                }
            }
            Err(e) => log::warn!("Failed to serialize snapshot manifest: {}", e),
        }
    }

    /// Paths snapshotted this round, sorted.
    pub async fn touched(&self) -> Vec<PathBuf> {
        self.entries.lock().await.keys().cloned().collect()
    }

    /// Restore every touched path. Backups are deleted only if every restore
    /// succeeded; otherwise they are kept and an error names the failures.
    pub async fn rollback(&self) -> Result<RollbackReport> {
        let entries = self.entries.lock().await.clone();
        let mut report = RollbackReport::default();
        let mut failures = Vec::new();
        let mut created_dirs: Vec<PathBuf> = Vec::new();

        for (rel, entry) in &entries {
            let target = self.root.join(rel);
            let outcome = match &entry.backup {
                Some(name) => match tokio::fs::read(self.dir.join(name)).await {
                    Ok(bytes) => tokio::fs::write(&target, bytes).await.map(|_| report.restored.push(rel.clone())),
                    Err(e) => Err(e),
                },
                None => match tokio::fs::remove_file(&target).await {
                    Ok(()) => {
                        report.removed.push(rel.clone());
                        created_dirs.extend(entry.created_dirs.iter().cloned());
                        Ok(())
                    }
                    Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                    Err(e) => Err(e),
                },
            };
            if let Err(e) = outcome {
                failures.push(format!("{}: {}", rel.display(), e));
            }
        }

        created_dirs.sort_by(|a, b| b.components().count().cmp(&a.components().count()).then(a.cmp(b)));
        created_dirs.dedup();
        for dir in created_dirs {
            match tokio::fs::remove_dir(self.root.join(&dir)).await {
                Ok(()) => report.removed_dirs.push(dir),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => log::debug!("Keeping directory {}: {}", dir.display(), e),
            }
        }

        if !failures.is_empty() {
            log::error!(
                "Rollback incomplete, backups retained at {}: {}",
                self.dir.display(),
                failures.join("; ")
            );
            return Err(TidyError::Snapshot(format!(
                "Failed to restore {} file(s), backups kept at {}: {}",
                failures.len(),
                self.dir.display(),
                failures.join("; ")
            )));
        }

        self.entries.lock().await.clear();
        self.remove_backups().await?;
        log::info!(
            "Rolled back {} restored, {} removed",
            report.restored.len(),
            report.removed.len()
        );
        Ok(report)
    }

    /// Accept the round: forget the snapshot and delete its backups.
    pub async fn discard(&self) -> Result<()> {
        self.entries.lock().await.clear();
        self.remove_backups().await
    }

    async fn remove_backups(&self) -> Result<()> {
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(TidyError::Snapshot(format!(
                "Failed to remove backups at {}: {}",
                self.dir.display(),
                e
            ))),
        }
    }
}
