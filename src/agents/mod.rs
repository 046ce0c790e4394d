//! Fix agents - deterministic fixers and the model-backed delegate
//!
//! Agents are static implementations of [`FixAgent`] looked up by name in an
//! [`AgentRegistry`], which also holds the issue type → candidates table.

mod command;
mod dead_code;
mod delegate;
mod formatting;
mod registry;
mod traits;

pub use command::CommandFixAgent;
pub use dead_code::DeadCodeAgent;
pub use delegate::{CommandBackend, DelegatingAgent, FixBackend, Proposal};
pub use formatting::{WhitespaceAgent, normalize_whitespace};
pub use registry::{AgentFactory, AgentRegistry, Routes};
pub use traits::{FixAgent, has_extension};
