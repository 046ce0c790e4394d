//! The convergence loop.
//!
//! Each round: COLLECT → ROUTE_AND_FIX → VALIDATE → RE-RUN → ACCEPT, with
//! ROLLBACK whenever validation fails or the re-run finds more issues than
//! the round started with. Termination is checked at the top of every round
//! against that round's COLLECT list.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::coordinator::BatchCoordinator;
use super::report::{AutofixReport, RoundDisposition, RoundReport, Termination};
use super::router::IssueOutcome;
use crate::cache::DecisionCache;
use crate::config::AutofixConfig;
use crate::domain::{Issue, collect_issues, count_issues, fingerprint_set};
use crate::error::Result;
use crate::hooks::{HookExecutor, HookStrategy};
use crate::safety::{FileEditor, RoundSnapshot, SafetyValidator};

/// Source of a round's issue list.
#[async_trait]
pub trait IssueCollector: Send + Sync {
    async fn collect(&self) -> Result<Vec<Issue>>;
}

/// Collects by running one strategy through the hook engine.
pub struct StrategyCollector {
    executor: Arc<HookExecutor>,
    strategy: HookStrategy,
    files: Option<Vec<PathBuf>>,
}

impl StrategyCollector {
    pub fn new(executor: Arc<HookExecutor>, strategy: HookStrategy, files: Option<Vec<PathBuf>>) -> Self {
        Self {
            executor,
            strategy,
            files,
        }
    }
}

#[async_trait]
impl IssueCollector for StrategyCollector {
    async fn collect(&self) -> Result<Vec<Issue>> {
        let results = self.executor.execute(&self.strategy, self.files.as_deref()).await?;
        Ok(collect_issues(&results))
    }
}

#[derive(Debug, Clone)]
pub struct ConvergenceConfig {
    /// Fix rounds allowed before EXHAUSTED.
    pub max_iterations: u32,
    /// Identical COLLECT lists in a row that count as STUCK.
    pub stuck_rounds: usize,
    pub backup_dir: PathBuf,
}

impl From<&AutofixConfig> for ConvergenceConfig {
    fn from(config: &AutofixConfig) -> Self {
        Self {
            max_iterations: config.max_iterations,
            stuck_rounds: config.stuck_rounds,
            backup_dir: config.backup_dir(),
        }
    }
}

/// Phase of the current round, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Collect,
    RouteAndFix,
    Validate,
    Rerun,
    Accept,
    Rollback,
    Terminated(Termination),
}

/// Progress history used for termination checks.
#[derive(Debug, Clone, Default)]
pub struct ConvergenceState {
    pub iteration: u32,
    pub issue_count_history: Vec<usize>,
    pub fingerprint_history: Vec<Vec<String>>,
    pub files_modified_this_round: Vec<PathBuf>,
}

impl ConvergenceState {
    pub fn record(&mut self, collected: &[Issue]) {
        self.issue_count_history.push(count_issues(collected));
        self.fingerprint_history.push(fingerprint_set(collected));
    }

    /// Whether the last `window` COLLECT lists match in count and fingerprints.
    pub fn is_stuck(&self, window: usize) -> bool {
        let n = self.issue_count_history.len();
        if window < 2 || n < window {
            return false;
        }
        let counts = &self.issue_count_history[n - window..];
        let prints = &self.fingerprint_history[n - window..];
        counts.windows(2).all(|w| w[0] == w[1]) && prints.windows(2).all(|w| w[0] == w[1])
    }
}

enum RoundEnd {
    Next(Vec<Issue>),
    Cancelled,
}

pub struct ConvergenceLoop {
    root: PathBuf,
    collector: Arc<dyn IssueCollector>,
    coordinator: BatchCoordinator,
    validator: SafetyValidator,
    config: ConvergenceConfig,
    cancel: CancellationToken,
}

impl ConvergenceLoop {
    pub fn new(
        root: impl Into<PathBuf>,
        collector: Arc<dyn IssueCollector>,
        coordinator: BatchCoordinator,
        config: ConvergenceConfig,
    ) -> Self {
        let root = root.into();
        Self {
            validator: SafetyValidator::new(root.clone()),
            root,
            collector,
            coordinator,
            config,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn cache(&self) -> &Arc<DecisionCache> {
        self.coordinator.router().cache()
    }

    /// Collect, then run rounds until a terminal state.
    pub async fn run(&self) -> Result<AutofixReport> {
        let initial = self.collector.collect().await?;
        self.run_from(initial).await
    }

    /// Run rounds starting from an already collected issue list.
    ///
    /// Errors are infrastructure faults only (collector, snapshot store or
    /// cache); every local failure ends up in the report.
    pub async fn run_from(&self, initial: Vec<Issue>) -> Result<AutofixReport> {
        let started = Instant::now();
        let initial_issues = count_issues(&initial);
        let mut state = ConvergenceState::default();
        let mut rounds = Vec::new();
        let mut current = initial;

        let termination = loop {
            state.iteration += 1;
            let round = state.iteration;
            self.transition(round, LoopState::Collect);
            state.record(&current);
            tracing::info!(round, issues = count_issues(&current), "Round collected");

            if count_issues(&current) == 0 {
                break Termination::Converged;
            }
            if state.is_stuck(self.config.stuck_rounds) {
                break Termination::Stuck;
            }
            if round > self.config.max_iterations {
                break Termination::Exhausted;
            }
            if self.cancel.is_cancelled() {
                break Termination::Cancelled;
            }

            let mut report = RoundReport::new(round, &current);
            let round_started = Instant::now();
            let end = self.round(&mut state, &mut report, &current).await?;
            report.duration = round_started.elapsed();
            tracing::info!(
                round,
                fixed = report.fixed,
                attempted = report.attempted,
                disposition = ?report.disposition,
                "Round finished"
            );
            rounds.push(report);

            match end {
                RoundEnd::Next(next) => current = next,
                RoundEnd::Cancelled => break Termination::Cancelled,
            }
        };

        self.transition(state.iteration, LoopState::Terminated(termination));
        let report = AutofixReport {
            termination,
            iterations: state.iteration,
            initial_issues,
            rounds,
            final_issues: current,
            duration: started.elapsed(),
        };
        log::info!("{}", report.summary());
        Ok(report)
    }

    async fn round(&self, state: &mut ConvergenceState, report: &mut RoundReport, collected: &[Issue]) -> Result<RoundEnd> {
        let round = state.iteration;
        let snapshot = Arc::new(RoundSnapshot::new(&self.root, &self.config.backup_dir, round));
        let editor = Arc::new(FileEditor::new(snapshot.clone()));

        self.transition(round, LoopState::RouteAndFix);
        let outcomes = match self.coordinator.fix_all(collected, editor, &self.cancel).await {
            Ok(outcomes) => outcomes,
            Err(e) => {
                if let Err(rollback_err) = snapshot.rollback().await {
                    log::error!("Rollback after failed fix phase also failed: {}", rollback_err);
                }
                return Err(e);
            }
        };
        report.attempted = outcomes.iter().filter(|o| o.attempts > 0).count();
        report.fixed = outcomes.iter().filter(|o| o.fixed()).count();
        report.from_cache = outcomes.iter().filter(|o| o.from_cache).count();

        let touched = snapshot.touched().await;
        state.files_modified_this_round = touched.clone();
        report.files_modified = touched.clone();

        if self.cancel.is_cancelled() {
            self.rollback(round, &snapshot, &outcomes).await?;
            report.disposition = RoundDisposition::Cancelled;
            return Ok(RoundEnd::Cancelled);
        }
        if touched.is_empty() {
            report.disposition = RoundDisposition::NoChanges;
            return Ok(RoundEnd::Next(collected.to_vec()));
        }

        self.transition(round, LoopState::Validate);
        let validation = self.validator.validate(&touched).await;
        if !validation.is_ok() {
            self.rollback(round, &snapshot, &outcomes).await?;
            report.disposition = RoundDisposition::RolledBack {
                reason: format!("validation failed: {}", validation.failures.join("; ")),
            };
            return Ok(RoundEnd::Next(collected.to_vec()));
        }

        self.transition(round, LoopState::Rerun);
        let rerun = match self.collector.collect().await {
            Ok(issues) => issues,
            Err(e) => {
                if let Err(rollback_err) = self.rollback(round, &snapshot, &outcomes).await {
                    log::error!("Rollback after failed re-run also failed: {}", rollback_err);
                }
                return Err(e);
            }
        };
        let before = count_issues(collected);
        let after = count_issues(&rerun);
        report.issues_after = Some(after);

        if after > before {
            self.rollback(round, &snapshot, &outcomes).await?;
            report.disposition = RoundDisposition::RolledBack {
                reason: format!("regression: {} -> {} issues", before, after),
            };
            return Ok(RoundEnd::Next(collected.to_vec()));
        }

        self.transition(round, LoopState::Accept);
        snapshot.discard().await?;
        report.disposition = RoundDisposition::Accepted;
        Ok(RoundEnd::Next(rerun))
    }

    async fn rollback(&self, round: u32, snapshot: &RoundSnapshot, outcomes: &[IssueOutcome]) -> Result<()> {
        self.transition(round, LoopState::Rollback);
        snapshot.rollback().await?;
        for outcome in outcomes.iter().filter(|o| o.touched_cache()) {
            if let Some(agent) = &outcome.agent {
                self.cache().invalidate(agent, &outcome.issue.fingerprint())?;
            }
        }
        Ok(())
    }

    fn transition(&self, round: u32, state: LoopState) {
        tracing::debug!(round, state = ?state, "Convergence state");
    }
}
