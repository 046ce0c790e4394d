//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - run: execute a strategy, optionally fixing what it finds
//! - strategies: list available strategies
//! - cache: decision cache maintenance

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Tidyloop - run code-quality hooks and fix what they find until clean
#[derive(Parser, Debug)]
#[command(name = "tidyloop")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a strategy against the project
    Run {
        /// Strategy name (defaults to execution.default_strategy)
        #[arg(short, long)]
        strategy: Option<String>,

        /// Fix issues and re-run until converged, stuck or out of rounds
        #[arg(long)]
        fix: bool,

        /// Fix-round budget, overriding autofix.max_iterations
        #[arg(long)]
        max_iterations: Option<u32>,

        /// Only check files changed since the base ref
        #[arg(short, long)]
        incremental: bool,

        /// Base revision for incremental runs
        #[arg(long, requires = "incremental")]
        base_ref: Option<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,

        /// Project root
        #[arg(short = 'C', long, default_value = ".")]
        root: PathBuf,

        /// Restrict the run to these files
        files: Vec<PathBuf>,
    },

    /// List available strategies and their hooks
    Strategies,

    /// Decision cache maintenance
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
}

/// Decision cache subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum CacheCommands {
    /// Remove expired decisions
    Purge,

    /// Show entry counts
    Stats,

    /// Remove every decision
    Clear,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_debug_assert() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_defaults() {
        let cli = Cli::try_parse_from(["tidyloop", "run"]).unwrap();
        match cli.command {
            Commands::Run {
                strategy,
                fix,
                incremental,
                json,
                root,
                files,
                ..
            } => {
                assert!(strategy.is_none());
                assert!(!fix);
                assert!(!incremental);
                assert!(!json);
                assert_eq!(root, PathBuf::from("."));
                assert!(files.is_empty());
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_run_with_options() {
        let cli = Cli::try_parse_from([
            "tidyloop",
            "run",
            "--strategy",
            "comprehensive",
            "--fix",
            "--max-iterations",
            "4",
            "--incremental",
            "--base-ref",
            "origin/main",
            "src/app.py",
            "src/util.py",
        ])
        .unwrap();
        match cli.command {
            Commands::Run {
                strategy,
                fix,
                max_iterations,
                base_ref,
                files,
                ..
            } => {
                assert_eq!(strategy.as_deref(), Some("comprehensive"));
                assert!(fix);
                assert_eq!(max_iterations, Some(4));
                assert_eq!(base_ref.as_deref(), Some("origin/main"));
                assert_eq!(files.len(), 2);
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_base_ref_requires_incremental() {
        assert!(Cli::try_parse_from(["tidyloop", "run", "--base-ref", "HEAD~1"]).is_err());
    }

    #[test]
    fn test_cache_subcommands() {
        let cli = Cli::try_parse_from(["tidyloop", "cache", "purge"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Cache {
                command: CacheCommands::Purge
            }
        ));

        let cli = Cli::try_parse_from(["tidyloop", "cache", "stats"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Cache {
                command: CacheCommands::Stats
            }
        ));
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::try_parse_from(["tidyloop", "strategies", "-v", "--config", "/tmp/t.yml"]).unwrap();
        assert!(cli.is_verbose());
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/t.yml")));
        assert!(matches!(cli.command, Commands::Strategies));
    }

    #[test]
    fn test_missing_subcommand_is_error() {
        assert!(Cli::try_parse_from(["tidyloop"]).is_err());
    }
}
