//! Bounded-parallel agent invocation over one round's issues.
//!
//! Issues are grouped by file. Groups run concurrently up to the worker
//! limit; inside a group issues run one after another, bottom of the file
//! first, so removing a line cannot shift the line of an issue not yet fixed.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use futures::StreamExt;
use futures::stream;
use tokio_util::sync::CancellationToken;

use super::router::{AgentRouter, IssueOutcome};
use crate::domain::Issue;
use crate::error::{Result, TidyError};
use crate::safety::FileEditor;

pub struct BatchCoordinator {
    router: Arc<AgentRouter>,
    workers: usize,
}

impl BatchCoordinator {
    pub fn new(router: Arc<AgentRouter>, workers: usize) -> Self {
        Self {
            router,
            workers: workers.max(1),
        }
    }

    pub fn router(&self) -> &Arc<AgentRouter> {
        &self.router
    }

    /// Attempt every issue. Outcomes come back in input order; issues not
    /// reached before cancellation have no outcome.
    pub async fn fix_all(
        &self,
        issues: &[Issue],
        editor: Arc<FileEditor>,
        cancel: &CancellationToken,
    ) -> Result<Vec<IssueOutcome>> {
        let mut groups: BTreeMap<PathBuf, Vec<(usize, Issue)>> = BTreeMap::new();
        for (index, issue) in issues.iter().enumerate() {
            groups
                .entry(issue.file_path.clone())
                .or_default()
                .push((index, issue.clone()));
        }
        for group in groups.values_mut() {
            group.sort_by(|a, b| b.1.line_number.cmp(&a.1.line_number));
        }

        log::debug!(
            "Fixing {} issue(s) across {} file(s) with {} worker(s)",
            issues.len(),
            groups.len(),
            self.workers
        );

        let results: Vec<Result<Vec<(usize, IssueOutcome)>>> = stream::iter(groups.into_values().map(|group| {
            let router = self.router.clone();
            let editor = editor.clone();
            let cancel = cancel.clone();
            async move {
                let mut outcomes = Vec::with_capacity(group.len());
                for (index, issue) in group {
                    if cancel.is_cancelled() {
                        break;
                    }
                    outcomes.push((index, router.fix(&issue, &editor).await?));
                }
                Ok::<_, TidyError>(outcomes)
            }
        }))
        .buffer_unordered(self.workers)
        .collect()
        .await;

        let mut outcomes = Vec::with_capacity(issues.len());
        for result in results {
            outcomes.extend(result?);
        }
        outcomes.sort_by_key(|(index, _)| *index);
        Ok(outcomes.into_iter().map(|(_, outcome)| outcome).collect())
    }
}
