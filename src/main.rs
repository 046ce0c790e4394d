use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

mod cli;

use cli::Cli;
use cli::commands::{CacheCommands, Commands};
use cli::output;
use tidyloop::agents::AgentRegistry;
use tidyloop::autofix::{AgentRouter, BatchCoordinator, ConvergenceConfig, ConvergenceLoop, RouterConfig, StrategyCollector};
use tidyloop::cache::DecisionCache;
use tidyloop::config::{TidyConfig, data_dir};
use tidyloop::domain::{collect_issues, total_issues};
use tidyloop::hooks::{EngineOptions, HookExecutor, HookRegistry};
use tidyloop::vcs::GitChangedFiles;

fn setup_logging() -> Result<()> {
    let log_dir = data_dir().join("logs");
    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("tidyloop.log");
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

struct RunArgs<'a> {
    strategy: Option<&'a str>,
    fix: bool,
    max_iterations: Option<u32>,
    incremental: bool,
    base_ref: Option<&'a str>,
    json: bool,
    root: &'a PathBuf,
    files: &'a [PathBuf],
}

/// Returns whether the run ended clean.
async fn handle_run_command(args: RunArgs<'_>, config: &TidyConfig, verbose: bool) -> Result<bool> {
    let root = args
        .root
        .canonicalize()
        .context(format!("Project root {} does not exist", args.root.display()))?;
    let registry = HookRegistry::from_config(config).context("Failed to build hook registry")?;
    let strategy_name = args.strategy.unwrap_or(&config.execution.default_strategy);
    let strategy = registry.strategy(strategy_name)?.clone();
    info!("Running strategy '{}' in {}", strategy.name, root.display());

    let mut options = EngineOptions::from(config.execution.clone());
    options.incremental |= args.incremental;
    if let Some(base_ref) = args.base_ref {
        options.base_ref = base_ref.to_string();
    }

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, cancelling");
            interrupt.cancel();
        }
    });

    let executor = Arc::new(
        HookExecutor::new(root.clone())
            .with_options(options)
            .with_changed_files(Arc::new(GitChangedFiles::new(root.clone())))
            .with_cancellation(cancel.clone()),
    );
    let files = (!args.files.is_empty()).then(|| args.files.to_vec());

    let results = executor.execute(&strategy, files.as_deref()).await?;
    if !args.json {
        println!("{} {}", "Strategy:".cyan(), strategy.name.bold());
        print!("{}", output::render_results(&results, verbose));
    }

    if !(args.fix || config.autofix.enabled) || total_issues(&results) == 0 {
        if args.json {
            println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "results": results }))?);
        }
        return Ok(total_issues(&results) == 0);
    }

    let autofix = &config.autofix;
    let cache = Arc::new(
        DecisionCache::from_config(&config.cache, autofix.min_confidence).context("Failed to open decision cache")?,
    );
    let routes = AgentRegistry::from_config(config, &root).resolve();
    let router = Arc::new(AgentRouter::new(routes, cache, RouterConfig::from(autofix)));
    let coordinator = BatchCoordinator::new(router, autofix.agent_workers);
    let collector = Arc::new(StrategyCollector::new(executor.clone(), strategy.clone(), files));

    let mut convergence = ConvergenceConfig::from(autofix);
    if let Some(max) = args.max_iterations {
        convergence.max_iterations = max;
    }

    if !args.json {
        println!("{}", "Fixing...".cyan());
    }
    let report = ConvergenceLoop::new(root, collector, coordinator, convergence)
        .with_cancellation(cancel)
        .run_from(collect_issues(&results))
        .await
        .context("Autofix loop failed")?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "results": results, "autofix": report }))?
        );
    } else {
        print!("{}", output::render_report(&report));
    }
    Ok(report.is_clean())
}

fn handle_strategies_command(config: &TidyConfig) -> Result<()> {
    let registry = HookRegistry::from_config(config).context("Failed to build hook registry")?;
    print!(
        "{}",
        output::render_strategies(registry.strategies(), &config.execution.default_strategy)
    );
    Ok(())
}

fn handle_cache_command(command: &CacheCommands, config: &TidyConfig) -> Result<()> {
    let cache = DecisionCache::open(
        &config.cache.db_path(),
        config.cache.memory_capacity,
        config.cache.ttl(),
        config.autofix.min_confidence,
    )
    .context("Failed to open decision cache")?;

    match command {
        CacheCommands::Purge => {
            let removed = cache.purge_expired()?;
            println!("{} {} expired decision(s)", "Purged".green(), removed);
        }
        CacheCommands::Stats => {
            print!("{}", output::render_cache_stats(&cache.stats()?));
        }
        CacheCommands::Clear => {
            cache.clear()?;
            println!("{}", "Decision cache cleared".green());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();

    let config = TidyConfig::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!("Starting with config from: {:?}", cli.config);

    let clean = match &cli.command {
        Commands::Run {
            strategy,
            fix,
            max_iterations,
            incremental,
            base_ref,
            json,
            root,
            files,
        } => {
            let args = RunArgs {
                strategy: strategy.as_deref(),
                fix: *fix,
                max_iterations: *max_iterations,
                incremental: *incremental,
                base_ref: base_ref.as_deref(),
                json: *json,
                root,
                files,
            };
            handle_run_command(args, &config, cli.is_verbose())
                .await
                .context("Run failed")?
        }
        Commands::Strategies => {
            handle_strategies_command(&config)?;
            true
        }
        Commands::Cache { command } => {
            handle_cache_command(command, &config)?;
            true
        }
    };

    if !clean {
        std::process::exit(1);
    }
    Ok(())
}
