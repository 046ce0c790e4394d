//! Tidyloop - run code-quality hooks and fix what they find until clean
//!
//! The hook engine runs a named strategy's tools concurrently and normalizes
//! their output into issues. The autofix loop routes those issues to fix
//! agents, validates and re-checks each round's edits, and rolls a round back
//! when it makes things worse.

pub mod adapters;
pub mod agents;
pub mod autofix;
pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod hooks;
pub mod safety;
pub mod vcs;

pub use error::{Result, TidyError};
