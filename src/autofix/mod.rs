//! Autofix - routing issues to agents and driving rounds to convergence

mod convergence;
mod coordinator;
mod report;
mod router;

pub use convergence::{
    ConvergenceConfig, ConvergenceLoop, ConvergenceState, IssueCollector, LoopState, StrategyCollector,
};
pub use coordinator::BatchCoordinator;
pub use report::{AutofixReport, RoundDisposition, RoundReport, Termination};
pub use router::{AgentRouter, IssueOutcome, RouterConfig};
