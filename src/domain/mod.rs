//! Domain types for Tidyloop
//!
//! This module contains the core data model shared by every layer:
//! - Issue: one normalized defect from one tool
//! - ExecutionResult: the outcome of running one hook once
//! - FixResult: the outcome of one agent attempt on one issue

pub mod execution;
pub mod fix;
pub mod issue;

pub use execution::{ExecutionResult, HookStatus, collect_issues, total_issues};
pub use fix::{FileEdit, FixResult, content_hash};
pub use issue::{Issue, IssueType, Severity, count_issues, fingerprint, fingerprint_set};
