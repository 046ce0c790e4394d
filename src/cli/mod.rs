//! CLI module for tidyloop - command-line interface and subcommands.
//!
//! Provides the entry points for running strategies (optionally with
//! autofix), listing strategies and maintaining the decision cache.

pub mod commands;
pub mod output;

pub use commands::Cli;
