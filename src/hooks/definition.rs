//! Hook and strategy definitions.

use std::path::Path;
use std::time::Duration;

use glob::Pattern;
use serde::{Deserialize, Serialize};

use crate::domain::IssueType;

/// Whether an infrastructure failure (ERROR/TIMEOUT) is re-run.
///
/// FAILED outcomes are never retried here: reporting findings is a valid
/// result, and re-running after a fix belongs to the convergence loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetryPolicy {
    #[default]
    None,
    OnError { max_attempts: u32 },
}

impl RetryPolicy {
    /// Total number of starts allowed, including the first.
    pub fn max_attempts(&self) -> u32 {
        match self {
            RetryPolicy::None => 1,
            RetryPolicy::OnError { max_attempts } => (*max_attempts).max(1),
        }
    }

    /// Build from a retry count as written in config (0 means no retry).
    pub fn from_retries(retries: u32) -> Self {
        if retries == 0 {
            RetryPolicy::None
        } else {
            RetryPolicy::OnError {
                max_attempts: retries + 1,
            }
        }
    }
}

/// One tool invocation inside a strategy.
#[derive(Debug, Clone)]
pub struct HookDefinition {
    pub name: String,

    /// Adapter registry key.
    pub adapter: String,

    /// Replacement base argv for the adapter.
    pub command: Option<Vec<String>>,

    /// Issue type for configurable adapters.
    pub issue_type: Option<IssueType>,

    pub timeout: Duration,

    pub retry_policy: RetryPolicy,

    /// Accepted file extensions without the dot; empty accepts everything.
    pub extensions: Vec<String>,

    /// Glob patterns of paths this hook never sees.
    pub exclude: Vec<String>,

    /// Hooks that must complete before this one starts.
    pub depends_on: Vec<String>,

    /// False for tools that must not share the machine with siblings.
    pub parallel_safe: bool,

    /// Whether target files are appended to the argv; false means the tool
    /// always runs project-wide.
    pub pass_files: bool,

    /// Stage label stamped on every issue the hook reports.
    pub stage: String,
}

impl HookDefinition {
    /// Hook named after its adapter, with defaults.
    pub fn new(name: impl Into<String>, adapter: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            adapter: adapter.into(),
            command: None,
            issue_type: None,
            timeout: Duration::from_secs(120),
            retry_policy: RetryPolicy::None,
            extensions: Vec::new(),
            exclude: default_excludes(),
            depends_on: Vec::new(),
            parallel_safe: true,
            pass_files: true,
            stage: "check".to_string(),
        }
    }

    pub fn with_command(mut self, command: Vec<String>) -> Self {
        self.command = Some(command);
        self
    }

    pub fn with_issue_type(mut self, issue_type: IssueType) -> Self {
        self.issue_type = Some(issue_type);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn with_extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions = extensions.iter().map(|e| e.to_string()).collect();
        self
    }

    pub fn with_exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude.push(pattern.into());
        self
    }

    pub fn depends_on(mut self, hook: impl Into<String>) -> Self {
        self.depends_on.push(hook.into());
        self
    }

    pub fn serial(mut self) -> Self {
        self.parallel_safe = false;
        self
    }

    pub fn project_wide(mut self) -> Self {
        self.pass_files = false;
        self
    }

    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = stage.into();
        self
    }

    /// Whether `path` is a target this hook accepts.
    pub fn applies_to(&self, path: &Path) -> bool {
        if !self.extensions.is_empty() {
            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            if !self.extensions.iter().any(|e| e == ext) {
                return false;
            }
        }
        let text = path.to_string_lossy();
        !self
            .exclude
            .iter()
            .filter_map(|p| Pattern::new(p).ok())
            .any(|p| p.matches(&text))
    }
}

/// Paths no hook looks at unless told otherwise.
fn default_excludes() -> Vec<String> {
    [".git/**", ".venv/**", "venv/**", "node_modules/**", "target/**", "**/__pycache__/**", "build/**", "dist/**"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Default worker count: 75% of available cores, at least one.
pub fn default_max_workers() -> usize {
    let cores = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    (cores * 3 / 4).max(1)
}

/// A named, ordered set of hooks run together.
#[derive(Debug, Clone)]
pub struct HookStrategy {
    pub name: String,
    pub description: String,
    pub hooks: Vec<HookDefinition>,
    pub max_workers: usize,
    /// Overall budget for the whole strategy.
    pub timeout: Duration,
    pub parallel: bool,
}

impl HookStrategy {
    pub fn new(name: impl Into<String>, hooks: Vec<HookDefinition>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            hooks,
            max_workers: default_max_workers(),
            timeout: Duration::from_secs(900),
            parallel: true,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    pub fn hook(&self, name: &str) -> Option<&HookDefinition> {
        self.hooks.iter().find(|h| h.name == name)
    }

    pub fn hook_names(&self) -> Vec<&str> {
        self.hooks.iter().map(|h| h.name.as_str()).collect()
    }
}
