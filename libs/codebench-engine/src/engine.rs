/// Local execution engine
///
/// **Responsibility:** run one request as OS processes inside a private
/// workspace and report raw metrics.
///
/// Steps per request:
/// 1. Reject oversized sources before touching disk
/// 2. Write the normalized source into a fresh workspace
/// 3. Compile (if the language has a compile step) under a fixed timeout
/// 4. Run under the language timeout, sampling memory
/// 5. Map the outcome onto `RawMetrics` or an `ExecError`
///
/// The workspace guard is dropped on every path, removing all artifacts.

use crate::backend::{ExecError, ExecutionBackend, RawMetrics};
use crate::languages::{normalize_source, render_command, LanguageConfig, TemplateContext, JAVA_CLASS_NAME};
use crate::process::{run_bounded, ProcessOutcome, ProcessSpec};
use crate::workspace::Workspace;
use async_trait::async_trait;
use codebench_common::types::{ExecutionPath, ExecutionRequest};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Sources larger than this never reach disk
pub const MAX_SOURCE_BYTES: usize = 1024 * 1024;
pub const COMPILE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct LocalEngine {
    compile_timeout: Duration,
    enforce_memory_limit: bool,
}

impl Default for LocalEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalEngine {
    pub fn new() -> Self {
        Self {
            compile_timeout: COMPILE_TIMEOUT,
            enforce_memory_limit: true,
        }
    }

    pub fn with_compile_timeout(mut self, timeout: Duration) -> Self {
        self.compile_timeout = timeout;
        self
    }

    /// Report runs that exceed the language memory ceiling as runtime errors
    pub fn with_memory_limit(mut self, enforce: bool) -> Self {
        self.enforce_memory_limit = enforce;
        self
    }

    #[instrument(skip(self, request, config), fields(language = %config.language))]
    pub async fn run_local(
        &self,
        request: &ExecutionRequest,
        config: &LanguageConfig,
    ) -> Result<RawMetrics, ExecError> {
        if request.source.len() > MAX_SOURCE_BYTES {
            return Err(ExecError::Submission(format!(
                "source is {} bytes, limit is {} bytes",
                request.source.len(),
                MAX_SOURCE_BYTES
            )));
        }

        let workspace = Workspace::create()
            .map_err(|e| ExecError::Internal(format!("failed to create workspace: {}", e)))?;
        let source = normalize_source(config.language, &request.source);
        let file = workspace
            .write_source(&config.source_file_name(), &source)
            .await
            .map_err(|e| ExecError::Internal(format!("failed to write source: {}", e)))?;

        let ctx = TemplateContext {
            file: file.to_string_lossy().into_owned(),
            dir: workspace.path().to_string_lossy().into_owned(),
            output: workspace.file(config.output_file_name()).to_string_lossy().into_owned(),
            class_name: JAVA_CLASS_NAME.to_string(),
        };

        if let Some(template) = &config.compile_command {
            self.compile(template, &ctx, workspace.path()).await?;
        }

        let argv = render_command(&config.run_command, &ctx)?;
        let timeout = effective_timeout(config, request);
        debug!(argv = ?argv, timeout_secs = timeout.as_secs_f64(), "Running program");

        let outcome = run_bounded(ProcessSpec {
            argv: &argv,
            cwd: workspace.path(),
            stdin: request.stdin.as_deref(),
            timeout,
            sample_memory: true,
        })
        .await?;

        match outcome {
            ProcessOutcome::TimedOut { captured } => {
                warn!(elapsed_ms = captured.elapsed.as_millis() as u64, "Run timed out");
                Err(ExecError::timeout(timeout.as_secs_f64()))
            }
            ProcessOutcome::Exited { code, captured } => {
                let metrics = RawMetrics {
                    stdout: captured.stdout,
                    stderr: captured.stderr,
                    return_code: code,
                    execution_time: captured.elapsed.as_secs_f64(),
                    memory_usage: captured.memory_mb,
                };
                info!(
                    return_code = code,
                    execution_time_ms = captured.elapsed.as_millis() as u64,
                    memory_mb = metrics.memory_usage,
                    "Run finished"
                );

                if code != 0 {
                    let message = runtime_message(&metrics);
                    return Err(ExecError::Runtime { message, metrics });
                }
                if self.enforce_memory_limit && metrics.memory_usage > config.memory_limit_mb {
                    let message = format!(
                        "Memory limit exceeded: {} MB used, limit is {} MB",
                        metrics.memory_usage, config.memory_limit_mb
                    );
                    return Err(ExecError::Runtime { message, metrics });
                }
                Ok(metrics)
            }
        }
    }

    async fn compile(&self, template: &str, ctx: &TemplateContext, cwd: &Path) -> Result<(), ExecError> {
        let argv = render_command(template, ctx)?;
        debug!(argv = ?argv, "Compiling");
        let outcome = run_bounded(ProcessSpec {
            argv: &argv,
            cwd,
            stdin: None,
            timeout: self.compile_timeout,
            sample_memory: false,
        })
        .await?;

        match outcome {
            ProcessOutcome::TimedOut { .. } => Err(ExecError::Timeout(format!(
                "Compilation timed out after {:.1}s",
                self.compile_timeout.as_secs_f64()
            ))),
            ProcessOutcome::Exited { code: 0, .. } => Ok(()),
            ProcessOutcome::Exited { code, captured } => {
                let mut diagnostics = captured.stderr.trim().to_string();
                let stdout = captured.stdout.trim();
                if !stdout.is_empty() {
                    if !diagnostics.is_empty() {
                        diagnostics.push('\n');
                    }
                    diagnostics.push_str(stdout);
                }
                if diagnostics.is_empty() {
                    diagnostics = format!("compiler exited with code {}", code);
                }
                Err(ExecError::Compile { diagnostics })
            }
        }
    }
}

#[async_trait]
impl ExecutionBackend for LocalEngine {
    fn path(&self) -> ExecutionPath {
        ExecutionPath::Local
    }

    async fn is_available(&self, config: &LanguageConfig) -> bool {
        config.is_installed()
    }

    async fn execute(
        &self,
        request: &ExecutionRequest,
        config: &LanguageConfig,
    ) -> Result<RawMetrics, ExecError> {
        self.run_local(request, config).await
    }
}

/// The request override can only tighten the language timeout
pub fn effective_timeout(config: &LanguageConfig, request: &ExecutionRequest) -> Duration {
    let secs = match request.timeout_secs {
        Some(t) if t > 0 => t.min(config.timeout_secs),
        _ => config.timeout_secs,
    };
    Duration::from_secs(secs)
}

fn runtime_message(metrics: &RawMetrics) -> String {
    let stderr = metrics.stderr.trim();
    if stderr.is_empty() {
        format!("Process exited with code {}", metrics.return_code)
    } else {
        format!("Runtime Error: {}", stderr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::languages::LanguageRegistry;

    #[test]
    fn test_timeout_override_only_tightens() {
        let registry = LanguageRegistry::builtin();
        let python = registry.get("python").unwrap();

        let req = ExecutionRequest::new("", "python");
        assert_eq!(effective_timeout(python, &req), Duration::from_secs(15));

        let req = ExecutionRequest::new("", "python").with_timeout_secs(1);
        assert_eq!(effective_timeout(python, &req), Duration::from_secs(1));

        let req = ExecutionRequest::new("", "python").with_timeout_secs(600);
        assert_eq!(effective_timeout(python, &req), Duration::from_secs(15));
    }

    #[test]
    fn test_runtime_message_prefers_stderr() {
        let metrics = RawMetrics { stderr: "ZeroDivisionError\n".into(), return_code: 1, ..Default::default() };
        assert_eq!(runtime_message(&metrics), "Runtime Error: ZeroDivisionError");
        let metrics = RawMetrics { return_code: 2, ..Default::default() };
        assert_eq!(runtime_message(&metrics), "Process exited with code 2");
    }

    #[tokio::test]
    async fn test_oversized_source_rejected() {
        let registry = LanguageRegistry::builtin();
        let python = registry.get("python").unwrap();
        let req = ExecutionRequest::new("#".repeat(MAX_SOURCE_BYTES + 1), "python");
        let err = LocalEngine::new().run_local(&req, python).await.unwrap_err();
        assert!(matches!(err, ExecError::Submission(_)));
    }

    #[tokio::test]
    async fn test_missing_toolchain() {
        let mut registry = LanguageRegistry::builtin();
        registry
            .apply_overrides(r#"{"languages":[{"name":"ruby","executable":"no-such-ruby-xyz","run_command":"no-such-ruby-xyz {file}"}]}"#)
            .unwrap();
        let ruby = registry.get("ruby").unwrap();
        assert!(!ruby.is_installed());
        let req = ExecutionRequest::new("puts 1", "ruby");
        let err = LocalEngine::new().run_local(&req, ruby).await.unwrap_err();
        assert!(matches!(err, ExecError::ToolchainUnavailable(_)));
    }
}
