//! Hook execution engine.
//!
//! Runs a strategy's hooks in dependency batches. Within a batch, parallel-safe
//! hooks share a semaphore-bounded pool and the rest run one at a time after
//! them. Every hook's timeout is capped by what is left of the strategy budget.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::definition::{HookDefinition, HookStrategy};
use super::targeting::{HookTarget, TargetSet, relative_to_root, target_for};
use crate::adapters::{AdapterRegistry, AdapterSpec, IssueNormalizer, RawOutput, ToolAdapter};
use crate::config::ExecutionConfig;
use crate::domain::ExecutionResult;
use crate::error::{Result, TidyError};
use crate::vcs::{ChangedFiles, existing_only};

/// Engine-wide knobs, independent of any one strategy.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Cap on concurrent hooks; a strategy may ask for fewer.
    pub max_workers: usize,
    pub incremental: bool,
    pub base_ref: String,
    pub incremental_threshold: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        ExecutionConfig::default().into()
    }
}

impl From<ExecutionConfig> for EngineOptions {
    fn from(config: ExecutionConfig) -> Self {
        Self {
            max_workers: config.max_workers.max(1),
            incremental: config.incremental,
            base_ref: config.base_ref,
            incremental_threshold: config.incremental_threshold,
        }
    }
}

/// Schedules strategies against a project root.
pub struct HookExecutor {
    root: PathBuf,
    adapters: AdapterRegistry,
    normalizer: IssueNormalizer,
    options: EngineOptions,
    changed_files: Option<Arc<dyn ChangedFiles>>,
    cancel: CancellationToken,
}

impl HookExecutor {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            normalizer: IssueNormalizer::new(root.clone()),
            root,
            adapters: AdapterRegistry::builtin(),
            options: EngineOptions::default(),
            changed_files: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_adapters(mut self, adapters: AdapterRegistry) -> Self {
        self.adapters = adapters;
        self
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_changed_files(mut self, changed_files: Arc<dyn ChangedFiles>) -> Self {
        self.changed_files = Some(changed_files);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Run `strategy` and return one result per hook that ran, in declaration order.
    ///
    /// `files` restricts the run to an explicit file set. Without it, an
    /// incremental engine asks version control for changed files.
    pub async fn execute(&self, strategy: &HookStrategy, files: Option<&[PathBuf]>) -> Result<Vec<ExecutionResult>> {
        let batches = plan_batches(strategy)?;
        let adapters = strategy
            .hooks
            .iter()
            .map(|hook| {
                let spec = AdapterSpec::new(&hook.name)
                    .with_command(hook.command.clone())
                    .with_issue_type(hook.issue_type);
                self.adapters.create(&hook.adapter, &spec)
            })
            .collect::<Result<Vec<_>>>()?;

        let targets = self.resolve_targets(files).await;
        let hook_targets: Vec<HookTarget> = strategy.hooks.iter().map(|h| target_for(h, &targets)).collect();

        let deadline = Instant::now() + strategy.timeout;
        let workers = strategy.max_workers.min(self.options.max_workers).max(1);
        let semaphore = Semaphore::new(workers);
        let mut results: Vec<Option<ExecutionResult>> = vec![None; strategy.hooks.len()];

        tracing::info!(
            strategy = %strategy.name,
            hooks = strategy.hooks.len(),
            batches = batches.len(),
            workers,
            full_scan = targets.is_full(),
            "Executing strategy"
        );

        for batch in batches {
            if self.cancel.is_cancelled() {
                log::info!("Strategy {} cancelled", strategy.name);
                break;
            }

            let runnable: Vec<usize> = batch
                .into_iter()
                .filter(|&i| {
                    let skip = hook_targets[i] == HookTarget::Skip;
                    if skip {
                        log::debug!("Skipping {}: no applicable files", strategy.hooks[i].name);
                    }
                    !skip
                })
                .collect();
            let (concurrent, serial): (Vec<usize>, Vec<usize>) = runnable
                .into_iter()
                .partition(|&i| strategy.parallel && strategy.hooks[i].parallel_safe);

            let semaphore = &semaphore;
            let outcomes = join_all(concurrent.into_iter().map(|i| {
                let hook = &strategy.hooks[i];
                let adapter = adapters[i].as_ref();
                let target = &hook_targets[i];
                async move {
                    let _permit = semaphore.acquire().await.ok()?;
                    self.run_cancellable(hook, adapter, target, deadline).await.map(|r| (i, r))
                }
            }))
            .await;
            for (i, result) in outcomes.into_iter().flatten() {
                results[i] = Some(result);
            }

            for i in serial {
                if let Some(result) = self
                    .run_cancellable(&strategy.hooks[i], adapters[i].as_ref(), &hook_targets[i], deadline)
                    .await
                {
                    results[i] = Some(result);
                }
            }
        }

        Ok(results.into_iter().flatten().collect())
    }

    /// Work out which files this run is scoped to.
    pub async fn resolve_targets(&self, files: Option<&[PathBuf]>) -> TargetSet {
        if let Some(files) = files {
            let files = existing_only(&self.root, relative_to_root(&self.root, files));
            return TargetSet::Files(files);
        }
        if !self.options.incremental {
            return TargetSet::Full;
        }
        let Some(source) = &self.changed_files else {
            log::warn!("Incremental mode without a change source, running a full scan");
            return TargetSet::Full;
        };
        match source.changed_files(&self.options.base_ref).await {
            Ok(changed) => {
                let changed = existing_only(&self.root, changed);
                TargetSet::incremental(changed, self.options.incremental_threshold)
            }
            Err(e) => {
                log::warn!("Could not list changed files ({}), running a full scan", e);
                TargetSet::Full
            }
        }
    }

    async fn run_cancellable(
        &self,
        hook: &HookDefinition,
        adapter: &dyn ToolAdapter,
        target: &HookTarget,
        deadline: Instant,
    ) -> Option<ExecutionResult> {
        tokio::select! {
            _ = self.cancel.cancelled() => {
                log::info!("Hook {} cancelled", hook.name);
                None
            }
            result = self.run_hook(hook, adapter, target, deadline) => Some(result),
        }
    }

    async fn run_hook(
        &self,
        hook: &HookDefinition,
        adapter: &dyn ToolAdapter,
        target: &HookTarget,
        deadline: Instant,
    ) -> ExecutionResult {
        let files = target.files();
        let max_attempts = hook.retry_policy.max_attempts();
        let mut attempt = 0;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                log::warn!("{}: strategy deadline reached before start", hook.name);
                let mut result = ExecutionResult::timeout(&hook.name, Duration::ZERO).with_attempts(attempt);
                result.error_message = Some("Strategy timeout reached before the hook could start".to_string());
                return result.with_files_processed(files.len());
            }

            attempt += 1;
            let result = self.run_once(hook, adapter, files, hook.timeout.min(remaining)).await;

            if result.status.is_infrastructure_failure() && attempt < max_attempts {
                log::warn!(
                    "{} ended with {} on attempt {}/{}, retrying",
                    hook.name,
                    result.status,
                    attempt,
                    max_attempts
                );
                continue;
            }

            tracing::info!(
                hook = %hook.name,
                status = %result.status,
                issues = result.issues_found(),
                attempts = attempt,
                duration_ms = result.duration.as_millis() as u64,
                "Hook finished"
            );
            return result.with_files_processed(files.len()).with_attempts(attempt);
        }
    }

    async fn run_once(
        &self,
        hook: &HookDefinition,
        adapter: &dyn ToolAdapter,
        files: &[PathBuf],
        timeout: Duration,
    ) -> ExecutionResult {
        let argv = adapter.build_command(files);
        log::debug!("Running {}: {}", hook.name, argv.join(" "));

        let started = std::time::Instant::now();
        let raw = match adapter.execute(&argv, &self.root, timeout).await {
            Ok(raw) => raw,
            Err(e) => return ExecutionResult::error(&hook.name, e.to_string(), "", None, started.elapsed()),
        };
        if raw.timed_out {
            return ExecutionResult::timeout(&hook.name, timeout);
        }

        let issues = self.normalizer.normalize(adapter, &raw, &hook.name, &hook.stage);
        if issues.is_empty() && !raw.success() {
            return ExecutionResult::error(&hook.name, diagnostic(&raw), raw.combined(), raw.exit_code, raw.duration);
        }
        ExecutionResult::completed(&hook.name, raw.exit_code, raw.combined(), issues, raw.duration)
    }
}

/// Short description of why a process failed without findings.
fn diagnostic(raw: &RawOutput) -> String {
    let detail = raw
        .stderr
        .lines()
        .chain(raw.stdout.lines())
        .map(str::trim)
        .find(|l| !l.is_empty());
    match (raw.exit_code, detail) {
        (Some(code), Some(detail)) => format!("exit code {}: {}", code, detail),
        (Some(code), None) => format!("exit code {}", code),
        (None, Some(detail)) => format!("terminated: {}", detail),
        (None, None) => "terminated by signal".to_string(),
    }
}

/// Layer hooks topologically (Kahn). Each batch lists hook indices in
/// declaration order; a hook appears only after all its dependencies.
pub fn plan_batches(strategy: &HookStrategy) -> Result<Vec<Vec<usize>>> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    for (i, hook) in strategy.hooks.iter().enumerate() {
        if index.insert(hook.name.as_str(), i).is_some() {
            return Err(TidyError::InvalidStrategy(format!(
                "Strategy '{}' lists hook '{}' twice",
                strategy.name, hook.name
            )));
        }
    }

    let n = strategy.hooks.len();
    let mut indegree = vec![0usize; n];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (i, hook) in strategy.hooks.iter().enumerate() {
        for dep in &hook.depends_on {
            match index.get(dep.as_str()) {
                Some(&d) => {
                    indegree[i] += 1;
                    dependents[d].push(i);
                }
                None => log::warn!(
                    "Hook {} depends on {}, which is not in strategy {}; ignoring",
                    hook.name,
                    dep,
                    strategy.name
                ),
            }
        }
    }

    let mut batches = Vec::new();
    let mut ready: Vec<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
    let mut placed = 0;
    while !ready.is_empty() {
        placed += ready.len();
        let mut next = Vec::new();
        for &i in &ready {
            for &j in &dependents[i] {
                indegree[j] -= 1;
                if indegree[j] == 0 {
                    next.push(j);
                }
            }
        }
        next.sort_unstable();
        batches.push(std::mem::replace(&mut ready, next));
    }

    if placed < n {
        let cyclic: Vec<&str> = (0..n)
            .filter(|&i| indegree[i] > 0)
            .map(|i| strategy.hooks[i].name.as_str())
            .collect();
        return Err(TidyError::InvalidStrategy(format!(
            "Dependency cycle in strategy '{}' among: {}",
            strategy.name,
            cyclic.join(", ")
        )));
    }
    Ok(batches)
}
