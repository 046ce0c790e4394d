//! Hook catalog and strategy registry.
//!
//! The built-in hook catalog is static. Config may override individual hooks,
//! add custom ones and define new strategies; strategies are assembled from
//! the catalog after all overrides are applied.

use std::collections::BTreeMap;
use std::time::Duration;

use super::definition::{HookDefinition, HookStrategy, RetryPolicy, default_max_workers};
use crate::config::{CustomHookConfig, StrategyConfig, TidyConfig};
use crate::error::{Result, TidyError};

const PY: &[&str] = &["py", "pyi"];

fn builtin_hooks() -> Vec<HookDefinition> {
    let secs = Duration::from_secs;
    vec![
        HookDefinition::new("ruff-format", "ruff-format")
            .with_extensions(PY)
            .with_timeout(secs(60))
            .with_stage("format"),
        HookDefinition::new("ruff-check", "ruff-check")
            .with_extensions(PY)
            .with_timeout(secs(60))
            .depends_on("ruff-format")
            .with_stage("lint"),
        HookDefinition::new("codespell", "codespell")
            .with_extensions(&["py", "md", "rst", "txt", "toml", "yml", "yaml"])
            .with_timeout(secs(60))
            .with_stage("lint"),
        HookDefinition::new("vulture", "vulture")
            .with_extensions(&["py"])
            .with_timeout(secs(120))
            .with_stage("analysis"),
        HookDefinition::new("mypy", "mypy")
            .with_extensions(PY)
            .with_timeout(secs(300))
            .with_retry(RetryPolicy::OnError { max_attempts: 2 })
            .with_stage("typecheck"),
        HookDefinition::new("pyright", "pyright")
            .with_extensions(PY)
            .with_timeout(secs(300))
            .serial()
            .with_stage("typecheck"),
        HookDefinition::new("bandit", "bandit")
            .with_extensions(&["py"])
            .with_exclude("tests/**")
            .with_timeout(secs(180))
            .with_stage("security"),
        HookDefinition::new("complexipy", "complexipy")
            .with_extensions(&["py"])
            .with_timeout(secs(180))
            .with_stage("analysis"),
        HookDefinition::new("pytest", "pytest")
            .with_extensions(&["py"])
            .with_timeout(secs(600))
            .project_wide()
            .serial()
            .with_stage("test"),
        HookDefinition::new("clippy", "clippy")
            .with_extensions(&["rs"])
            .with_timeout(secs(600))
            .project_wide()
            .serial()
            .with_stage("lint"),
    ]
}

struct BuiltinStrategy {
    name: &'static str,
    description: &'static str,
    hooks: &'static [&'static str],
    timeout_secs: u64,
    parallel: bool,
}

const BUILTIN_STRATEGIES: &[BuiltinStrategy] = &[
    BuiltinStrategy {
        name: "fast",
        description: "Formatting, lint and spelling checks",
        hooks: &["ruff-format", "ruff-check", "codespell", "vulture"],
        timeout_secs: 300,
        parallel: true,
    },
    BuiltinStrategy {
        name: "comprehensive",
        description: "Every static analysis hook, including type checking and security",
        hooks: &[
            "ruff-format",
            "ruff-check",
            "mypy",
            "pyright",
            "bandit",
            "vulture",
            "complexipy",
            "codespell",
        ],
        timeout_secs: 1200,
        parallel: true,
    },
    BuiltinStrategy {
        name: "tests",
        description: "Run the test suite",
        hooks: &["pytest"],
        timeout_secs: 900,
        parallel: false,
    },
    BuiltinStrategy {
        name: "rust",
        description: "cargo clippy over the whole crate",
        hooks: &["clippy"],
        timeout_secs: 900,
        parallel: true,
    },
];

/// Catalog of hooks plus the strategies built from them.
#[derive(Debug, Clone)]
pub struct HookRegistry {
    hooks: BTreeMap<String, HookDefinition>,
    strategies: BTreeMap<String, HookStrategy>,
}

impl HookRegistry {
    /// Registry holding only the built-in hooks and strategies.
    pub fn builtin() -> Self {
        let mut registry = Self {
            hooks: builtin_hooks().into_iter().map(|h| (h.name.clone(), h)).collect(),
            strategies: BTreeMap::new(),
        };
        registry.assemble_builtin_strategies();
        registry
    }

    /// Built-ins with config overrides, custom hooks and strategies applied.
    pub fn from_config(config: &TidyConfig) -> Result<Self> {
        let mut registry = Self::builtin();

        for custom in &config.custom_hooks {
            registry.hooks.insert(custom.name.clone(), custom_hook(custom));
        }

        for (name, over) in &config.hooks {
            let Some(hook) = registry.hooks.get_mut(name) else {
                log::warn!("Override for unknown hook '{}' ignored", name);
                continue;
            };
            if let Some(timeout) = over.timeout_secs {
                hook.timeout = Duration::from_secs(timeout);
            }
            if let Some(retries) = over.retries {
                hook.retry_policy = RetryPolicy::from_retries(retries);
            }
            if let Some(command) = &over.command {
                hook.command = Some(command.clone());
            }
            hook.exclude.extend(over.exclude.iter().cloned());
        }

        registry.assemble_builtin_strategies();

        for (name, strategy) in &config.strategies {
            let assembled = registry.assemble_configured(name, strategy)?;
            registry.strategies.insert(name.clone(), assembled);
        }

        Ok(registry)
    }

    fn assemble_builtin_strategies(&mut self) {
        for builtin in BUILTIN_STRATEGIES {
            let hooks = builtin
                .hooks
                .iter()
                .filter_map(|name| self.hooks.get(*name).cloned())
                .collect();
            let mut strategy = HookStrategy::new(builtin.name, hooks)
                .with_description(builtin.description)
                .with_timeout(Duration::from_secs(builtin.timeout_secs));
            if !builtin.parallel {
                strategy = strategy.sequential();
            }
            self.strategies.insert(builtin.name.to_string(), strategy);
        }
    }

    fn assemble_configured(&self, name: &str, config: &StrategyConfig) -> Result<HookStrategy> {
        let hooks = config
            .hooks
            .iter()
            .map(|hook| {
                self.hooks.get(hook).cloned().ok_or_else(|| {
                    TidyError::InvalidStrategy(format!("Strategy '{}' references unknown hook '{}'", name, hook))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut strategy = HookStrategy::new(name, hooks)
            .with_max_workers(config.max_workers.unwrap_or_else(default_max_workers))
            .with_description(config.description.clone().unwrap_or_default());
        if let Some(timeout) = config.timeout_secs {
            strategy = strategy.with_timeout(Duration::from_secs(timeout));
        }
        if !config.parallel {
            strategy = strategy.sequential();
        }
        Ok(strategy)
    }

    /// Look up a strategy by name.
    pub fn strategy(&self, name: &str) -> Result<&HookStrategy> {
        self.strategies
            .get(name)
            .ok_or_else(|| TidyError::UnknownStrategy(name.to_string()))
    }

    pub fn strategies(&self) -> impl Iterator<Item = &HookStrategy> {
        self.strategies.values()
    }

    pub fn hook(&self, name: &str) -> Option<&HookDefinition> {
        self.hooks.get(name)
    }

    /// Add or replace a strategy.
    pub fn insert_strategy(&mut self, strategy: HookStrategy) {
        self.strategies.insert(strategy.name.clone(), strategy);
    }
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn custom_hook(config: &CustomHookConfig) -> HookDefinition {
    let mut hook = HookDefinition::new(&config.name, &config.adapter)
        .with_command(config.command.clone())
        .with_timeout(Duration::from_secs(config.timeout_secs))
        .with_retry(RetryPolicy::from_retries(config.retries))
        .with_stage(config.stage.clone().unwrap_or_else(|| "custom".to_string()));
    hook.extensions = config.extensions.clone();
    hook.exclude.extend(config.exclude.iter().cloned());
    hook.depends_on = config.depends_on.clone();
    hook.parallel_safe = config.parallel_safe;
    hook.pass_files = config.pass_files;
    hook.issue_type = config.issue_type;
    hook
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_strategies_exist() {
        let registry = HookRegistry::builtin();
        for name in ["fast", "comprehensive", "tests", "rust"] {
            assert!(registry.strategy(name).is_ok(), "missing strategy {}", name);
        }
    }

    #[test]
    fn test_unknown_strategy() {
        let registry = HookRegistry::builtin();
        let err = registry.strategy("nightly").unwrap_err();
        assert!(matches!(err, TidyError::UnknownStrategy(_)));
    }

    #[test]
    fn test_fast_strategy_order_and_dependencies() {
        let registry = HookRegistry::builtin();
        let fast = registry.strategy("fast").unwrap();
        assert_eq!(fast.hook_names(), vec!["ruff-format", "ruff-check", "codespell", "vulture"]);
        assert_eq!(fast.hook("ruff-check").unwrap().depends_on, vec!["ruff-format".to_string()]);
        assert!(fast.parallel);
    }

    #[test]
    fn test_tests_strategy_is_project_wide_and_sequential() {
        let registry = HookRegistry::builtin();
        let tests = registry.strategy("tests").unwrap();
        assert!(!tests.parallel);
        assert!(!tests.hooks[0].pass_files);
    }

    #[test]
    fn test_config_overrides_apply_to_strategies() {
        let config = TidyConfig::from_yaml("hooks:\n  mypy:\n    timeout_secs: 30\n    retries: 0\n").unwrap();
        let registry = HookRegistry::from_config(&config).unwrap();
        let mypy = registry.strategy("comprehensive").unwrap().hook("mypy").unwrap();
        assert_eq!(mypy.timeout, Duration::from_secs(30));
        assert_eq!(mypy.retry_policy, RetryPolicy::None);
    }

    #[test]
    fn test_custom_hook_and_strategy() {
        let yaml = r#"
custom_hooks:
  - name: shellcheck
    command: [shellcheck, -f, gcc]
    extensions: [sh]
strategies:
  shell:
    hooks: [shellcheck, codespell]
    max_workers: 2
    timeout_secs: 60
"#;
        let config = TidyConfig::from_yaml(yaml).unwrap();
        let registry = HookRegistry::from_config(&config).unwrap();
        let shell = registry.strategy("shell").unwrap();
        assert_eq!(shell.hook_names(), vec!["shellcheck", "codespell"]);
        assert_eq!(shell.max_workers, 2);
        assert_eq!(shell.timeout, Duration::from_secs(60));
        let hook = shell.hook("shellcheck").unwrap();
        assert_eq!(hook.adapter, "generic");
        assert_eq!(hook.stage, "custom");
    }

    #[test]
    fn test_strategy_with_unknown_hook_is_invalid() {
        let config = TidyConfig::from_yaml("strategies:\n  broken:\n    hooks: [eslint]\n").unwrap();
        let err = HookRegistry::from_config(&config).unwrap_err();
        assert!(matches!(err, TidyError::InvalidStrategy(_)));
    }
}
