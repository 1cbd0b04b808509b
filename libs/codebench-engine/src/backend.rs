/// Execution backend seam.
///
/// A backend knows HOW to run code (local processes, a remote judge) and
/// returns raw metrics. It does not score, suggest or decide failover;
/// those live above it.

use crate::languages::LanguageConfig;
use async_trait::async_trait;
use codebench_common::types::{ErrorKind, ExecutionPath, ExecutionRequest};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What a finished run produced, whichever path ran it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMetrics {
    pub stdout: String,
    pub stderr: String,
    pub return_code: i32,
    /// Seconds
    pub execution_time: f64,
    /// Megabytes
    pub memory_usage: u64,
}

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("Unsupported language '{language}'. Supported languages: {supported}")]
    UnsupportedLanguage { language: String, supported: String },

    #[error("Compile Error: {diagnostics}")]
    Compile { diagnostics: String },

    #[error("{message}")]
    Runtime { message: String, metrics: RawMetrics },

    #[error("Wrong Answer: {message}")]
    WrongOutput { message: String, metrics: RawMetrics },

    #[error("{0}")]
    Timeout(String),

    #[error("Submission failed: {0}")]
    Submission(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Could not parse remote result: {0}")]
    ResultParsing(String),

    #[error("Toolchain unavailable: {0}")]
    ToolchainUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExecError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExecError::UnsupportedLanguage { .. } => ErrorKind::UnsupportedLanguage,
            ExecError::Compile { .. } => ErrorKind::CompileError,
            ExecError::Runtime { .. } => ErrorKind::RuntimeError,
            ExecError::WrongOutput { .. } => ErrorKind::WrongOutput,
            ExecError::Timeout(_) => ErrorKind::Timeout,
            ExecError::Submission(_) => ErrorKind::Submission,
            ExecError::Network(_) => ErrorKind::Network,
            ExecError::ResultParsing(_) => ErrorKind::ResultParsing,
            ExecError::ToolchainUnavailable(_) => ErrorKind::ToolchainUnavailable,
            ExecError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Partial output captured before the failure, when there was a run
    pub fn metrics(&self) -> Option<&RawMetrics> {
        match self {
            ExecError::Runtime { metrics, .. } | ExecError::WrongOutput { metrics, .. } => Some(metrics),
            _ => None,
        }
    }

    pub fn timeout(seconds: f64) -> Self {
        ExecError::Timeout(format!("Execution timed out after {:.1}s", seconds))
    }
}

/// One execution path. Implementations must be cheap to share across tasks.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    fn path(&self) -> ExecutionPath;

    /// Whether this path can run `config`'s language right now
    async fn is_available(&self, config: &LanguageConfig) -> bool;

    async fn execute(
        &self,
        request: &ExecutionRequest,
        config: &LanguageConfig,
    ) -> Result<RawMetrics, ExecError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(ExecError::timeout(1.0).kind(), ErrorKind::Timeout);
        assert_eq!(
            ExecError::Compile { diagnostics: "x".into() }.kind(),
            ErrorKind::CompileError
        );
        assert_eq!(ExecError::Network("down".into()).kind(), ErrorKind::Network);
        assert!(ExecError::Submission("503".into()).kind().triggers_failover());
        assert!(!ExecError::Compile { diagnostics: "x".into() }.kind().triggers_failover());
    }

    #[test]
    fn test_messages_are_never_empty() {
        let err = ExecError::Compile { diagnostics: "main.rs:1: expected ;".into() };
        assert!(err.to_string().starts_with("Compile Error:"));
        assert!(ExecError::timeout(2.0).to_string().contains("2.0s"));
    }

    #[test]
    fn test_runtime_error_keeps_metrics() {
        let err = ExecError::Runtime {
            message: "boom".into(),
            metrics: RawMetrics { return_code: 1, stderr: "boom".into(), ..Default::default() },
        };
        assert_eq!(err.metrics().map(|m| m.return_code), Some(1));
        assert!(ExecError::Internal("x".into()).metrics().is_none());
    }
}
