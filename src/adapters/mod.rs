//! Tool adapters - wrap external analysis tools behind one contract
//!
//! Adapters are looked up by name in an [`AdapterRegistry`]; there is no
//! runtime discovery.

mod bandit;
mod clippy;
mod codespell;
mod complexipy;
mod generic;
mod mypy;
mod normalize;
pub mod parse;
pub mod process;
mod pyright;
mod pytest;
mod ruff;
mod traits;
mod vulture;

use std::collections::BTreeMap;
use std::sync::Arc;

pub use bandit::BanditAdapter;
pub use clippy::ClippyAdapter;
pub use codespell::CodespellAdapter;
pub use complexipy::ComplexipyAdapter;
pub use generic::GenericAdapter;
pub use mypy::MypyAdapter;
pub use normalize::IssueNormalizer;
pub use pyright::PyrightAdapter;
pub use pytest::PytestAdapter;
pub use ruff::{RuffCheckAdapter, RuffFormatAdapter, classify_rule};
pub use traits::{RawOutput, ToolAdapter, argv, command_with_files};
pub use vulture::VultureAdapter;

use crate::domain::IssueType;
use crate::error::{Result, TidyError};

/// What a hook tells the registry when asking for an adapter.
#[derive(Debug, Clone, Default)]
pub struct AdapterSpec {
    /// Hook name; used as the tool name by configurable adapters.
    pub hook_name: String,
    /// Replacement for the adapter's default base argv.
    pub command: Option<Vec<String>>,
    /// Issue type reported by configurable adapters.
    pub issue_type: Option<IssueType>,
}

impl AdapterSpec {
    pub fn new(hook_name: impl Into<String>) -> Self {
        Self {
            hook_name: hook_name.into(),
            ..Default::default()
        }
    }

    pub fn with_command(mut self, command: Option<Vec<String>>) -> Self {
        self.command = command;
        self
    }

    pub fn with_issue_type(mut self, issue_type: Option<IssueType>) -> Self {
        self.issue_type = issue_type;
        self
    }
}

/// Constructor for one adapter kind.
pub type AdapterFactory = fn(&AdapterSpec) -> Arc<dyn ToolAdapter>;

/// Name → constructor table for tool adapters.
#[derive(Clone)]
pub struct AdapterRegistry {
    factories: BTreeMap<String, AdapterFactory>,
}

impl AdapterRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registry holding every built-in adapter.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(RuffFormatAdapter::NAME, |s| {
            Arc::new(RuffFormatAdapter::with_command(s.command.clone()))
        });
        registry.register(RuffCheckAdapter::NAME, |s| Arc::new(RuffCheckAdapter::with_command(s.command.clone())));
        registry.register(MypyAdapter::NAME, |s| Arc::new(MypyAdapter::with_command(s.command.clone())));
        registry.register(PyrightAdapter::NAME, |s| Arc::new(PyrightAdapter::with_command(s.command.clone())));
        registry.register(BanditAdapter::NAME, |s| Arc::new(BanditAdapter::with_command(s.command.clone())));
        registry.register(VultureAdapter::NAME, |s| Arc::new(VultureAdapter::with_command(s.command.clone())));
        registry.register(ComplexipyAdapter::NAME, |s| {
            Arc::new(ComplexipyAdapter::with_command(s.command.clone()))
        });
        registry.register(CodespellAdapter::NAME, |s| {
            Arc::new(CodespellAdapter::with_command(s.command.clone()))
        });
        registry.register(PytestAdapter::NAME, |s| Arc::new(PytestAdapter::with_command(s.command.clone())));
        registry.register(ClippyAdapter::NAME, |s| Arc::new(ClippyAdapter::with_command(s.command.clone())));
        registry.register(GenericAdapter::NAME, |s| {
            let adapter = GenericAdapter::new(s.hook_name.clone(), s.command.clone().unwrap_or_default());
            Arc::new(adapter.with_issue_type(s.issue_type.unwrap_or(IssueType::Formatting)))
        });
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, factory: AdapterFactory) {
        self.factories.insert(name.into(), factory);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Construct the adapter registered under `name`.
    pub fn create(&self, name: &str, spec: &AdapterSpec) -> Result<Arc<dyn ToolAdapter>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| TidyError::InvalidStrategy(format!("Unknown adapter '{}' for hook '{}'", name, spec.hook_name)))?;
        Ok(factory(spec))
    }

    /// Registered adapter names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_names() {
        let registry = AdapterRegistry::builtin();
        for name in [
            "ruff-format",
            "ruff-check",
            "mypy",
            "pyright",
            "bandit",
            "vulture",
            "complexipy",
            "codespell",
            "pytest",
            "clippy",
            "generic",
        ] {
            assert!(registry.contains(name), "missing adapter {}", name);
        }
    }

    #[test]
    fn test_create_known_adapter() {
        let registry = AdapterRegistry::builtin();
        let adapter = registry.create("mypy", &AdapterSpec::new("mypy")).unwrap();
        assert_eq!(adapter.name(), "mypy");
    }

    #[test]
    fn test_create_with_command_override() {
        let registry = AdapterRegistry::builtin();
        let spec = AdapterSpec::new("ruff-check").with_command(Some(argv(&["uvx", "ruff", "check"])));
        let adapter = registry.create("ruff-check", &spec).unwrap();
        assert_eq!(adapter.build_command(&[])[0], "uvx");
    }

    #[test]
    fn test_create_generic_uses_hook_name() {
        let registry = AdapterRegistry::builtin();
        let spec = AdapterSpec::new("shellcheck")
            .with_command(Some(argv(&["shellcheck", "-f", "gcc"])))
            .with_issue_type(Some(IssueType::Security));
        let adapter = registry.create("generic", &spec).unwrap();
        assert_eq!(adapter.name(), "shellcheck");
    }

    #[test]
    fn test_create_unknown_adapter() {
        let registry = AdapterRegistry::builtin();
        let err = registry.create("eslint", &AdapterSpec::new("lint")).err().unwrap();
        assert!(matches!(err, TidyError::InvalidStrategy(_)));
    }
}
