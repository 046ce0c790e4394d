//! Agent registry - name → constructor, issue type → candidate agents

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::command::CommandFixAgent;
use super::dead_code::DeadCodeAgent;
use super::delegate::{CommandBackend, DelegatingAgent, FixBackend};
use super::formatting::WhitespaceAgent;
use super::traits::FixAgent;
use crate::config::TidyConfig;
use crate::domain::IssueType;

pub type AgentFactory = Box<dyn Fn() -> Arc<dyn FixAgent> + Send + Sync>;

/// Ordered candidate agents for one issue type.
pub type Routes = BTreeMap<IssueType, Vec<Arc<dyn FixAgent>>>;

pub struct AgentRegistry {
    factories: BTreeMap<String, AgentFactory>,
    routes: BTreeMap<IssueType, Vec<String>>,
    disabled: BTreeSet<String>,
}

impl AgentRegistry {
    /// Registry with no agents and no routes.
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
            routes: BTreeMap::new(),
            disabled: BTreeSet::new(),
        }
    }

    /// The deterministic built-in agents and their routing table.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register("ruff-format-fixer", || Arc::new(CommandFixAgent::ruff_format()));
        registry.register("ruff-fix", || Arc::new(CommandFixAgent::ruff_fix()));
        registry.register(WhitespaceAgent::NAME, || Arc::new(WhitespaceAgent::new()));
        registry.register(DeadCodeAgent::NAME, || Arc::new(DeadCodeAgent::new()));

        registry.route(IssueType::Formatting, &["ruff-format-fixer", WhitespaceAgent::NAME, "ruff-fix"]);
        registry.route(IssueType::ImportError, &["ruff-fix", DeadCodeAgent::NAME]);
        registry.route(IssueType::DeadCode, &[DeadCodeAgent::NAME, "ruff-fix"]);
        registry
    }

    /// Built-ins plus the configured backend and disabled list.
    pub fn from_config(config: &TidyConfig, root: &Path) -> Self {
        let mut registry = Self::builtin().with_command_timeout(config.autofix.agent_timeout());
        if let Some(argv) = &config.agents.backend_command {
            let backend = CommandBackend::new(argv.clone(), root, config.autofix.agent_timeout());
            registry = registry.with_backend(Arc::new(backend));
        }
        for name in &config.agents.disabled {
            if !registry.contains(name) {
                log::warn!("Cannot disable unknown agent '{}'", name);
            }
            registry.disable(name);
        }
        registry
    }

    /// Bound the external formatter agents by `timeout` instead of their default.
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.register("ruff-format-fixer", move || {
            Arc::new(CommandFixAgent::ruff_format().with_timeout(timeout))
        });
        self.register("ruff-fix", move || Arc::new(CommandFixAgent::ruff_fix().with_timeout(timeout)));
        self
    }

    /// Register the `delegate` agent for every type no other agent covers.
    pub fn with_backend(mut self, backend: Arc<dyn FixBackend>) -> Self {
        self.register(DelegatingAgent::NAME, move || Arc::new(DelegatingAgent::new(backend.clone())));
        for issue_type in IssueType::ALL {
            if !self.routes.contains_key(&issue_type) {
                self.route(issue_type, &[DelegatingAgent::NAME]);
            }
        }
        self
    }

    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Arc<dyn FixAgent> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Box::new(factory));
    }

    /// Replace the candidate list for `issue_type`.
    pub fn route(&mut self, issue_type: IssueType, agents: &[&str]) {
        self.routes
            .insert(issue_type, agents.iter().map(|a| a.to_string()).collect());
    }

    pub fn disable(&mut self, name: &str) {
        self.disabled.insert(name.to_string());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Instantiate one agent, unless unknown or disabled.
    pub fn create(&self, name: &str) -> Option<Arc<dyn FixAgent>> {
        if self.disabled.contains(name) {
            return None;
        }
        self.factories.get(name).map(|factory| factory())
    }

    /// Candidate names for `issue_type`, in routing order.
    pub fn candidates(&self, issue_type: IssueType) -> Vec<&str> {
        self.routes
            .get(&issue_type)
            .map(|names| {
                names
                    .iter()
                    .map(String::as_str)
                    .filter(|name| !self.disabled.contains(*name))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Instantiate every route once. Unknown names are dropped with a warning.
    pub fn resolve(&self) -> Routes {
        let mut instances: BTreeMap<&str, Arc<dyn FixAgent>> = BTreeMap::new();
        let mut routes = Routes::new();
        for issue_type in self.routes.keys() {
            let mut agents = Vec::new();
            for name in self.candidates(*issue_type) {
                if let Some(agent) = instances.get(name) {
                    agents.push(agent.clone());
                } else if let Some(agent) = self.create(name) {
                    instances.insert(name, agent.clone());
                    agents.push(agent);
                } else {
                    log::warn!("Route for {} names unknown agent '{}'", issue_type, name);
                }
            }
            if !agents.is_empty() {
                routes.insert(*issue_type, agents);
            }
        }
        routes
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
