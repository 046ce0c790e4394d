//! Error types for Tidyloop
//!
//! Centralized error handling using thiserror. Failures local to one hook,
//! one parsed entry or one agent attempt are converted into typed results by
//! their callers; the variants here are what is left to propagate.

use thiserror::Error;

/// All error types that can occur in Tidyloop
#[derive(Debug, Error)]
pub enum TidyError {
    /// External tool failed to start, crashed or timed out
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// Tool output could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// A fix agent raised or produced invalid content
    #[error("Agent fix error: {0}")]
    AgentFix(String),

    /// Post-apply syntax check failed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Decision cache store is inaccessible
    #[error("Cache error: {0}")]
    Cache(String),

    /// Snapshot or rollback store failure
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// No strategy registered under this name
    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),

    /// Strategy definition cannot be scheduled
    #[error("Invalid strategy: {0}")]
    InvalidStrategy(String),

    /// Path escapes the project root
    #[error("Sandbox violation: {0}")]
    Sandbox(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// SQLite error from the on-disk decision cache
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type alias for Tidyloop operations
pub type Result<T> = std::result::Result<T, TidyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_execution_error() {
        let err = TidyError::ToolExecution("ruff not found".to_string());
        assert_eq!(err.to_string(), "Tool execution error: ruff not found");
    }

    #[test]
    fn test_unknown_strategy_error() {
        let err = TidyError::UnknownStrategy("nightly".to_string());
        assert_eq!(err.to_string(), "Unknown strategy: nightly");
    }

    #[test]
    fn test_validation_error() {
        let err = TidyError::Validation("src/lib.rs: syntax errors detected".to_string());
        assert_eq!(err.to_string(), "Validation error: src/lib.rs: syntax errors detected");
    }

    #[test]
    fn test_cache_error() {
        let err = TidyError::Cache("database is locked".to_string());
        assert_eq!(err.to_string(), "Cache error: database is locked");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: TidyError = io_err.into();
        assert!(matches!(err, TidyError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let err: TidyError = json_err.into();
        assert!(matches!(err, TidyError::Json(_)));
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_ok() -> Result<i32> {
            Ok(42)
        }

        fn returns_err() -> Result<i32> {
            Err(TidyError::InvalidStrategy("cycle".to_string()))
        }

        assert!(returns_ok().is_ok());
        assert!(returns_err().is_err());
    }
}
