//! Per-issue agent selection, fall-through and decision caching.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::agents::{FixAgent, Routes};
use crate::cache::DecisionCache;
use crate::config::AutofixConfig;
use crate::domain::{FixResult, Issue};
use crate::error::Result;
use crate::safety::{EditSession, FileEditor};

#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub min_confidence: f64,
    pub max_attempts: usize,
    pub agent_timeout: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::from(&AutofixConfig::default())
    }
}

impl From<&AutofixConfig> for RouterConfig {
    fn from(config: &AutofixConfig) -> Self {
        Self {
            min_confidence: config.min_confidence,
            max_attempts: config.max_attempts_per_issue,
            agent_timeout: config.agent_timeout(),
        }
    }
}

/// What happened to one issue in one round.
#[derive(Debug, Clone, Serialize)]
pub struct IssueOutcome {
    pub issue: Issue,
    /// Agent whose result is reported; the last one tried on failure.
    pub agent: Option<String>,
    pub result: FixResult,
    pub attempts: usize,
    /// Replayed from the decision cache instead of invoking the agent.
    pub from_cache: bool,
    /// Written to the decision cache this round.
    pub stored: bool,
}

impl IssueOutcome {
    fn unhandled(issue: &Issue) -> Self {
        Self {
            issue: issue.clone(),
            agent: None,
            result: FixResult::failure(format!("No eligible agent for {} issues", issue.issue_type)),
            attempts: 0,
            from_cache: false,
            stored: false,
        }
    }

    pub fn fixed(&self) -> bool {
        self.result.success
    }

    /// Whether this outcome put a decision in play that a rollback should
    /// take back out of the cache.
    pub fn touched_cache(&self) -> bool {
        self.stored || self.from_cache
    }
}

pub struct AgentRouter {
    routes: Routes,
    cache: Arc<DecisionCache>,
    config: RouterConfig,
}

impl AgentRouter {
    pub fn new(routes: Routes, cache: Arc<DecisionCache>, config: RouterConfig) -> Self {
        Self { routes, cache, config }
    }

    pub fn cache(&self) -> &Arc<DecisionCache> {
        &self.cache
    }

    /// Candidates for `issue` at or above the confidence threshold, highest
    /// first. Ties keep routing order.
    pub fn eligible(&self, issue: &Issue) -> Vec<(Arc<dyn FixAgent>, f64)> {
        let mut eligible: Vec<(Arc<dyn FixAgent>, f64)> = self
            .routes
            .get(&issue.issue_type)
            .map(|agents| {
                agents
                    .iter()
                    .map(|agent| (agent.clone(), agent.can_handle(issue)))
                    .filter(|(_, confidence)| *confidence >= self.config.min_confidence)
                    .collect()
            })
            .unwrap_or_default();
        eligible.sort_by(|a, b| b.1.total_cmp(&a.1));
        eligible
    }

    /// Try eligible agents in order until one succeeds or the attempt budget
    /// is spent. Failed attempts revert their own edits.
    pub async fn fix(&self, issue: &Issue, editor: &Arc<FileEditor>) -> Result<IssueOutcome> {
        let candidates = self.eligible(issue);
        if candidates.is_empty() {
            log::debug!("No eligible agent for {}", issue);
            return Ok(IssueOutcome::unhandled(issue));
        }

        let fingerprint = issue.fingerprint();
        let mut outcome = IssueOutcome::unhandled(issue);

        for (agent, confidence) in candidates.into_iter().take(self.config.max_attempts.max(1)) {
            outcome.attempts += 1;
            outcome.agent = Some(agent.name().to_string());
            let session = EditSession::new(editor.clone());

            if let Some(cached) = self.cache.get(agent.name(), &fingerprint)? {
                if !cached.edits.is_empty() && session.replay(&cached.edits).await? {
                    log::debug!("Replayed cached {} fix for {}", agent.name(), issue.location());
                    outcome.result = cached;
                    outcome.from_cache = true;
                    return Ok(outcome);
                }
                log::debug!("Cached {} fix for {} no longer applies", agent.name(), issue.location());
            }

            let result = self.attempt(agent.as_ref(), issue, &session).await;
            if result.success {
                log::debug!(
                    "{} fixed {} (confidence {:.2}, eligibility {:.2})",
                    agent.name(),
                    issue.location(),
                    result.confidence,
                    confidence
                );
                outcome.stored = self.cache.put(agent.name(), &fingerprint, &result)?;
                outcome.result = result;
                return Ok(outcome);
            }

            session.revert().await?;
            log::debug!(
                "{} failed on {}: {}",
                agent.name(),
                issue.location(),
                result.failure_reason().unwrap_or("unknown")
            );
            outcome.result = result;
        }

        Ok(outcome)
    }

    /// One agent invocation under the agent timeout. Every failure mode comes
    /// back as an unsuccessful [`FixResult`].
    async fn attempt(&self, agent: &dyn FixAgent, issue: &Issue, session: &EditSession) -> FixResult {
        let outcome = tokio::time::timeout(self.config.agent_timeout, agent.analyze_and_fix(issue, session)).await;
        match outcome {
            Ok(Ok(mut result)) if result.success => {
                result.edits = session.edits().await;
                if result.edits.is_empty() {
                    return FixResult::failure(format!("{} reported success without editing", agent.name()));
                }
                for edit in &result.edits {
                    result.files_modified.retain(|p| p != &edit.path);
                    result.files_modified.push(edit.path.clone());
                }
                result
            }
            Ok(Ok(result)) => result,
            Ok(Err(e)) => FixResult::failure(e.to_string()),
            Err(_) => FixResult::failure(format!(
                "{} timed out after {:?}",
                agent.name(),
                self.config.agent_timeout
            )),
        }
    }
}
