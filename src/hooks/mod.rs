//! Hook System - definitions, strategies, targeting and the execution engine

mod definition;
mod engine;
mod registry;
mod targeting;

pub use definition::{HookDefinition, HookStrategy, RetryPolicy, default_max_workers};
pub use engine::{EngineOptions, HookExecutor, plan_batches};
pub use registry::HookRegistry;
pub use targeting::{HookTarget, TargetSet, target_for};
