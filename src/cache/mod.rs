//! Decision cache for fix agents

mod decision;

pub use decision::{CacheStats, DecisionCache};
