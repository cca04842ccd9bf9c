/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use super::types::Priority;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Thread creation errors with serialization support
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum ThreadError {
    #[error("Priority {0} out of range")]
    #[diagnostic(
        code(thread::invalid_priority),
        help("Priority must be between PRI_MIN (0) and PRI_MAX (63).")
    )]
    InvalidPriority(Priority),

    #[error("Thread limit reached: {limit} threads")]
    #[diagnostic(
        code(thread::limit_reached),
        help("Raise max_threads in the scheduler configuration or let threads exit first.")
    )]
    LimitReached { limit: usize },

    #[error("Failed to create thread: {0}")]
    #[diagnostic(
        code(thread::creation_failed),
        help("The host refused to start a backing thread. Check system resources.")
    )]
    CreationFailed(String),
}

/// Configuration errors
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum ConfigError {
    #[error("Invalid scheduler mode '{0}'")]
    #[diagnostic(
        code(config::invalid_mode),
        help("Valid modes: priority, mlfqs.")
    )]
    InvalidMode(String),

    #[error("Invalid value '{value}' for {key}")]
    #[diagnostic(
        code(config::invalid_value),
        help("The value must be a positive integer.")
    )]
    InvalidValue { key: String, value: String },

    #[error("Unknown kernel option '{0}'")]
    #[diagnostic(code(config::unknown_option), help("Supported options: -o mlfqs."))]
    UnknownOption(String),
}

/// Unified kernel error type with miette diagnostics
#[derive(Error, Debug, Diagnostic)]
pub enum KernelError {
    #[error("Thread error: {0}")]
    #[diagnostic(transparent)]
    Thread(#[from] ThreadError),

    #[error("Configuration error: {0}")]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ThreadError::InvalidPriority(64).to_string(),
            "Priority 64 out of range"
        );
        assert_eq!(
            ThreadError::LimitReached { limit: 8 }.to_string(),
            "Thread limit reached: 8 threads"
        );
    }

    #[test]
    fn test_kernel_error_from() {
        let err: KernelError = ConfigError::InvalidMode("fifo".into()).into();
        assert!(matches!(err, KernelError::Config(ConfigError::InvalidMode(_))));
        assert_eq!(
            err.to_string(),
            "Configuration error: Invalid scheduler mode 'fifo'"
        );
    }

    #[test]
    fn test_error_serialization() {
        let json = serde_json::to_string(&ThreadError::InvalidPriority(-1)).unwrap();
        assert_eq!(
            json,
            r#"{"error_type":"invalid_priority","details":-1}"#
        );
    }
}
