//! Terminal rendering for run results and autofix reports.

use colored::*;

use tidyloop::autofix::{AutofixReport, RoundDisposition, Termination};
use tidyloop::cache::CacheStats;
use tidyloop::domain::{ExecutionResult, HookStatus, total_issues};
use tidyloop::hooks::HookStrategy;

fn status_label(status: HookStatus) -> ColoredString {
    let label = format!("{:<7}", status.as_str().to_uppercase());
    match status {
        HookStatus::Passed => label.green(),
        HookStatus::Failed => label.red(),
        HookStatus::Error => label.magenta(),
        HookStatus::Timeout => label.yellow(),
    }
}

/// One line per hook, then the issues when `verbose`.
pub fn render_results(results: &[ExecutionResult], verbose: bool) -> String {
    let mut out = String::new();
    let width = results.iter().map(|r| r.hook_name.len()).max().unwrap_or(0);

    for result in results {
        out.push_str(&format!(
            "  {:<width$}  {}  {:>4} issue(s)  {:>6}ms",
            result.hook_name,
            status_label(result.status),
            result.issues_found(),
            result.duration.as_millis(),
            width = width
        ));
        if let Some(message) = &result.error_message {
            out.push_str(&format!("  {}", message.dimmed()));
        }
        out.push('\n');

        if verbose {
            for issue in &result.issues {
                out.push_str(&format!("      {} {}\n", issue.location().cyan(), issue.message));
            }
        }
    }

    let total = total_issues(results);
    let summary = format!("{} issue(s) from {} hook(s)", total, results.len());
    out.push_str(&if total == 0 {
        summary.green().to_string()
    } else {
        summary.yellow().to_string()
    });
    out.push('\n');
    out
}

pub fn render_report(report: &AutofixReport) -> String {
    let mut out = String::new();
    for round in &report.rounds {
        let disposition = match &round.disposition {
            RoundDisposition::Accepted => "accepted".green().to_string(),
            RoundDisposition::NoChanges => "no changes".dimmed().to_string(),
            RoundDisposition::Cancelled => "cancelled".yellow().to_string(),
            RoundDisposition::RolledBack { reason } => format!("{} ({})", "rolled back".red(), reason),
        };
        let after = round
            .issues_after
            .map(|n| format!(" -> {}", n))
            .unwrap_or_default();
        out.push_str(&format!(
            "  round {:>2}: {} issue(s){}, {} fixed ({} cached) of {} attempted, {} file(s) changed, {}\n",
            round.round,
            round.issues_to_fix,
            after,
            round.fixed,
            round.from_cache,
            round.attempted,
            round.files_modified.len(),
            disposition
        ));
    }

    let summary = report.summary();
    let summary = match report.termination {
        Termination::Converged => summary.green().bold(),
        Termination::Stuck | Termination::Exhausted => summary.yellow().bold(),
        Termination::Cancelled => summary.red().bold(),
    };
    out.push_str(&format!("{}\n", summary));

    for issue in &report.final_issues {
        out.push_str(&format!("    {}\n", issue));
    }
    out
}

pub fn render_strategies<'a>(strategies: impl Iterator<Item = &'a HookStrategy>, default: &str) -> String {
    let mut out = String::new();
    for strategy in strategies {
        let marker = if strategy.name == default { " (default)" } else { "" };
        out.push_str(&format!("{}{}\n", strategy.name.bold(), marker.dimmed()));
        if !strategy.description.is_empty() {
            out.push_str(&format!("  {}\n", strategy.description));
        }
        out.push_str(&format!(
            "  hooks: {}\n  timeout: {}s, workers: {}, {}\n",
            strategy.hook_names().join(", "),
            strategy.timeout.as_secs(),
            strategy.max_workers,
            if strategy.parallel { "parallel" } else { "sequential" }
        ));
    }
    out
}

pub fn render_cache_stats(stats: &CacheStats) -> String {
    format!(
        "{}\n  disk entries:   {}\n  memory entries: {}\n",
        "Decision cache".bold(),
        stats.disk_entries,
        stats.memory_entries
    )
}
