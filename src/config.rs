//! Configuration loading for tidyloop
//!
//! Every section is `#[serde(default)]`, so a config file only needs to name
//! what it changes.

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::IssueType;
use crate::hooks::default_max_workers;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TidyConfig {
    pub execution: ExecutionConfig,
    pub autofix: AutofixConfig,
    pub cache: CacheConfig,
    /// Per-hook overrides keyed by hook name.
    pub hooks: BTreeMap<String, HookOverride>,
    pub custom_hooks: Vec<CustomHookConfig>,
    /// Config-defined strategies; a name matching a built-in replaces it.
    pub strategies: BTreeMap<String, StrategyConfig>,
    pub agents: AgentsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Upper bound on concurrent hooks across any strategy.
    pub max_workers: usize,
    pub default_strategy: String,
    pub incremental: bool,
    /// Above this many changed files, incremental mode runs a full scan.
    pub incremental_threshold: usize,
    pub base_ref: String,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            default_strategy: "fast".to_string(),
            incremental: false,
            incremental_threshold: 50,
            base_ref: "HEAD".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutofixConfig {
    pub enabled: bool,
    pub max_iterations: u32,
    /// Identical consecutive rounds that count as no progress.
    pub stuck_rounds: usize,
    pub min_confidence: f64,
    pub max_attempts_per_issue: usize,
    /// Files fixed concurrently within a round.
    pub agent_workers: usize,
    pub agent_timeout_ms: u64,
    /// Where per-round backups live; defaults under the data dir.
    pub backup_dir: Option<PathBuf>,
}

impl Default for AutofixConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_iterations: 10,
            stuck_rounds: 3,
            min_confidence: 0.7,
            max_attempts_per_issue: 3,
            agent_workers: 4,
            agent_timeout_ms: 120_000,
            backup_dir: None,
        }
    }
}

impl AutofixConfig {
    pub fn agent_timeout(&self) -> Duration {
        Duration::from_millis(self.agent_timeout_ms)
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.backup_dir.clone().unwrap_or_else(|| data_dir().join("backups"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub dir: PathBuf,
    pub ttl_secs: u64,
    pub memory_capacity: usize,
    /// Keep decisions on disk across runs.
    pub persist: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: data_dir().join("cache"),
            ttl_secs: 7 * 24 * 60 * 60,
            memory_capacity: 1024,
            persist: true,
        }
    }
}

impl CacheConfig {
    pub fn db_path(&self) -> PathBuf {
        self.dir.join("decisions.db")
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HookOverride {
    pub timeout_secs: Option<u64>,
    pub retries: Option<u32>,
    pub command: Option<Vec<String>>,
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomHookConfig {
    pub name: String,
    #[serde(default = "default_custom_adapter")]
    pub adapter: String,
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default)]
    pub issue_type: Option<IssueType>,
    #[serde(default = "default_custom_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub retries: u32,
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default = "default_true")]
    pub parallel_safe: bool,
    #[serde(default = "default_true")]
    pub pass_files: bool,
    #[serde(default)]
    pub stage: Option<String>,
}

fn default_custom_adapter() -> String {
    "generic".to_string()
}

fn default_custom_timeout() -> u64 {
    120
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub hooks: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub max_workers: Option<usize>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default = "default_true")]
    pub parallel: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentsConfig {
    /// argv of a proposal backend speaking JSON over stdin/stdout.
    pub backend_command: Option<Vec<String>>,
    /// Agents removed from routing.
    pub disabled: Vec<String>,
}

/// `<data_local_dir>/tidyloop`.
pub fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(env!("CARGO_PKG_NAME"))
}

impl TidyConfig {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let project_name = env!("CARGO_PKG_NAME");

        // Project-local file first: ./.tidyloop.yml
        let local_config = PathBuf::from(format!(".{}.yml", project_name));
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Then ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config = Self::from_yaml(&content)?;
        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Parse and validate YAML content.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.execution.max_workers == 0 {
            eyre::bail!("execution.max_workers must be > 0");
        }
        if self.autofix.max_iterations == 0 {
            eyre::bail!("autofix.max_iterations must be > 0");
        }
        if self.autofix.stuck_rounds < 2 {
            eyre::bail!("autofix.stuck_rounds must be >= 2");
        }
        if !(0.0..=1.0).contains(&self.autofix.min_confidence) {
            eyre::bail!("autofix.min_confidence must be within [0, 1]");
        }
        if self.autofix.max_attempts_per_issue == 0 {
            eyre::bail!("autofix.max_attempts_per_issue must be > 0");
        }
        if self.autofix.agent_workers == 0 {
            eyre::bail!("autofix.agent_workers must be > 0");
        }
        if self.autofix.agent_timeout_ms == 0 {
            eyre::bail!("autofix.agent_timeout_ms must be > 0");
        }
        if self.cache.memory_capacity == 0 {
            eyre::bail!("cache.memory_capacity must be > 0");
        }
        for hook in &self.custom_hooks {
            if hook.name.trim().is_empty() {
                eyre::bail!("custom_hooks: hook name must not be empty");
            }
            if hook.command.is_empty() {
                eyre::bail!("custom_hooks.{}: command must not be empty", hook.name);
            }
            if hook.timeout_secs == 0 {
                eyre::bail!("custom_hooks.{}: timeout_secs must be > 0", hook.name);
            }
        }
        for (name, strategy) in &self.strategies {
            if strategy.hooks.is_empty() {
                eyre::bail!("strategies.{}: must list at least one hook", name);
            }
        }
        if self.agents.backend_command.as_ref().is_some_and(Vec::is_empty) {
            eyre::bail!("agents.backend_command must not be empty when set");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = TidyConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.autofix.max_iterations, 10);
        assert_eq!(config.autofix.stuck_rounds, 3);
        assert_eq!(config.autofix.min_confidence, 0.7);
        assert_eq!(config.autofix.max_attempts_per_issue, 3);
        assert_eq!(config.execution.default_strategy, "fast");
        assert!(config.execution.max_workers >= 1);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config = TidyConfig::from_yaml("autofix:\n  enabled: true\n  max_iterations: 4\n").unwrap();
        assert!(config.autofix.enabled);
        assert_eq!(config.autofix.max_iterations, 4);
        assert_eq!(config.autofix.stuck_rounds, 3);
        assert_eq!(config.execution.incremental_threshold, 50);
    }

    #[test]
    fn test_hooks_and_strategies() {
        let yaml = r#"
hooks:
  mypy:
    timeout_secs: 600
    retries: 1
custom_hooks:
  - name: shellcheck
    command: [shellcheck, -f, gcc]
    issue_type: security
    extensions: [sh]
strategies:
  shell:
    hooks: [shellcheck]
    parallel: false
"#;
        let config = TidyConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.hooks["mypy"].timeout_secs, Some(600));
        assert_eq!(config.custom_hooks[0].adapter, "generic");
        assert_eq!(config.custom_hooks[0].issue_type, Some(IssueType::Security));
        assert!(config.custom_hooks[0].pass_files);
        assert!(!config.strategies["shell"].parallel);
    }

    #[test]
    fn test_rejects_zero_iterations() {
        let err = TidyConfig::from_yaml("autofix:\n  max_iterations: 0\n").unwrap_err();
        assert!(format!("{:#}", err).contains("max_iterations"));
    }

    #[test]
    fn test_rejects_out_of_range_confidence() {
        assert!(TidyConfig::from_yaml("autofix:\n  min_confidence: 1.5\n").is_err());
        assert!(TidyConfig::from_yaml("autofix:\n  min_confidence: -0.1\n").is_err());
    }

    #[test]
    fn test_rejects_custom_hook_without_command() {
        let yaml = "custom_hooks:\n  - name: lint\n";
        assert!(TidyConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_rejects_empty_strategy() {
        let yaml = "strategies:\n  empty:\n    hooks: []\n";
        assert!(TidyConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.yml");
        fs::write(&path, "execution:\n  incremental: true\n  base_ref: main\n").unwrap();
        let config = TidyConfig::load(Some(&path)).unwrap();
        assert!(config.execution.incremental);
        assert_eq!(config.execution.base_ref, "main");
    }

    #[test]
    fn test_load_explicit_missing_path_fails() {
        let path = PathBuf::from("/nonexistent/tidyloop.yml");
        assert!(TidyConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn test_cache_paths() {
        let config = CacheConfig {
            dir: PathBuf::from("/tmp/cache"),
            ..Default::default()
        };
        assert_eq!(config.db_path(), PathBuf::from("/tmp/cache/decisions.db"));
        assert_eq!(config.ttl(), Duration::from_secs(604_800));
    }
}
