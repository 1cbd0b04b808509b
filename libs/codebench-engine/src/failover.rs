//! Single-hop failover between the local and remote paths.
//!
//! ```text
//! Start -> TryPrimary -> Success
//!                     -> TrySecondary -> Success
//!                                     -> Failure
//!                     -> Failure        (verdict on the code, or no eligible secondary)
//! ```

use crate::backend::{ExecError, ExecutionBackend, RawMetrics};
use crate::languages::LanguageConfig;
use codebench_common::types::{ErrorKind, ExecutionMode, ExecutionPath, ExecutionRequest};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Everything the coordinator learned while running one request
#[derive(Debug)]
pub struct CoordinatedOutcome {
    /// Path that produced the final outcome, `None` if nothing ran
    pub path: Option<ExecutionPath>,
    /// Paths tried, in order
    pub attempts: Vec<ExecutionPath>,
    pub result: Result<RawMetrics, FailureReport>,
    /// Set when the secondary succeeded after a primary failure
    pub note: Option<String>,
}

#[derive(Debug)]
pub struct FailureReport {
    pub kind: ErrorKind,
    /// Primary diagnostics first, then the secondary's
    pub message: String,
    /// Output of the last failed run, if it got that far
    pub metrics: Option<RawMetrics>,
}

impl FailureReport {
    fn from_error(err: &ExecError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            metrics: err.metrics().cloned(),
        }
    }
}

enum State {
    Start,
    TryPrimary { primary: ExecutionPath, secondary: Option<ExecutionPath> },
    TrySecondary { path: ExecutionPath, primary_error: ExecError, primary: ExecutionPath },
    Success { path: ExecutionPath, metrics: RawMetrics, note: Option<String> },
    Failure { path: Option<ExecutionPath>, report: FailureReport },
}

pub struct FailoverCoordinator {
    local: Arc<dyn ExecutionBackend>,
    remote: Option<Arc<dyn ExecutionBackend>>,
}

impl FailoverCoordinator {
    pub fn new(local: Arc<dyn ExecutionBackend>, remote: Option<Arc<dyn ExecutionBackend>>) -> Self {
        Self { local, remote }
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    fn backend(&self, path: ExecutionPath) -> Option<&Arc<dyn ExecutionBackend>> {
        match path {
            ExecutionPath::Local => Some(&self.local),
            ExecutionPath::Remote => self.remote.as_ref(),
        }
    }

    async fn remote_eligible(&self, config: &LanguageConfig) -> bool {
        match &self.remote {
            Some(remote) => remote.is_available(config).await,
            None => false,
        }
    }

    /// Preferred (primary, secondary) order for a mode, before eligibility
    async fn preferred_order(&self, mode: ExecutionMode, config: &LanguageConfig) -> (ExecutionPath, ExecutionPath) {
        match mode {
            ExecutionMode::Local => (ExecutionPath::Local, ExecutionPath::Remote),
            ExecutionMode::Remote => (ExecutionPath::Remote, ExecutionPath::Local),
            ExecutionMode::Auto => {
                if self.local.is_available(config).await {
                    (ExecutionPath::Local, ExecutionPath::Remote)
                } else {
                    (ExecutionPath::Remote, ExecutionPath::Local)
                }
            }
        }
    }

    pub async fn run(&self, request: &ExecutionRequest, config: &LanguageConfig) -> CoordinatedOutcome {
        let mut attempts = Vec::with_capacity(2);
        // Remote eligibility is probed at most once per request
        let mut remote_checked: Option<bool> = None;
        let mut state = State::Start;

        loop {
            state = match state {
                State::Start => {
                    let (primary, secondary) = self.preferred_order(request.mode, config).await;
                    if primary == ExecutionPath::Remote {
                        let eligible = self.remote_eligible(config).await;
                        remote_checked = Some(eligible);
                        if eligible {
                            State::TryPrimary { primary, secondary: Some(secondary) }
                        } else {
                            info!(language = %config.language, "Remote path unavailable, running locally");
                            State::TryPrimary { primary: ExecutionPath::Local, secondary: None }
                        }
                    } else {
                        State::TryPrimary { primary, secondary: Some(secondary) }
                    }
                }

                State::TryPrimary { primary, secondary } => {
                    attempts.push(primary);
                    match self.attempt(primary, request, config).await {
                        Ok(metrics) => State::Success { path: primary, metrics, note: None },
                        Err(err) if !err.kind().triggers_failover() => {
                            debug!(path = %primary, kind = %err.kind(), "Failure is a verdict, no failover");
                            State::Failure { path: Some(primary), report: FailureReport::from_error(&err) }
                        }
                        Err(err) => {
                            let next = match secondary {
                                Some(ExecutionPath::Remote) => {
                                    let eligible = match remote_checked {
                                        Some(known) => known,
                                        None => self.remote_eligible(config).await,
                                    };
                                    eligible.then_some(ExecutionPath::Remote)
                                }
                                other => other,
                            };
                            match next {
                                Some(path) => {
                                    warn!(from = %primary, to = %path, kind = %err.kind(), "Primary path failed, failing over");
                                    State::TrySecondary { path, primary_error: err, primary }
                                }
                                None => State::Failure { path: Some(primary), report: FailureReport::from_error(&err) },
                            }
                        }
                    }
                }

                State::TrySecondary { path, primary_error, primary } => {
                    attempts.push(path);
                    match self.attempt(path, request, config).await {
                        Ok(metrics) => {
                            let note = format!("{} execution failed ({}); result produced by {} execution", primary, primary_error, path);
                            State::Success { path, metrics, note: Some(note) }
                        }
                        Err(err) => {
                            let mut report = FailureReport::from_error(&err);
                            report.message = format!(
                                "{} execution failed: {}\n{} execution failed: {}",
                                primary, primary_error, path, err
                            );
                            State::Failure { path: Some(path), report }
                        }
                    }
                }

                State::Success { path, metrics, note } => {
                    return CoordinatedOutcome { path: Some(path), attempts, result: Ok(metrics), note };
                }

                State::Failure { path, report } => {
                    return CoordinatedOutcome { path, attempts, result: Err(report), note: None };
                }
            };
        }
    }

    async fn attempt(
        &self,
        path: ExecutionPath,
        request: &ExecutionRequest,
        config: &LanguageConfig,
    ) -> Result<RawMetrics, ExecError> {
        let backend = self
            .backend(path)
            .ok_or_else(|| ExecError::Internal(format!("no {} backend configured", path)))?;
        backend.execute(request, config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockExecutionBackend;
    use crate::languages::LanguageRegistry;

    fn ok_metrics(stdout: &str) -> RawMetrics {
        RawMetrics { stdout: stdout.to_string(), ..Default::default() }
    }

    fn backend(
        path: ExecutionPath,
        available: bool,
        result: fn() -> Result<RawMetrics, ExecError>,
        calls: usize,
    ) -> Arc<dyn ExecutionBackend> {
        let mut mock = MockExecutionBackend::new();
        mock.expect_path().return_const(path);
        mock.expect_is_available().returning(move |_| available);
        mock.expect_execute().times(calls).returning(move |_, _| result());
        Arc::new(mock)
    }

    fn python() -> LanguageConfig {
        LanguageRegistry::builtin().get("python").unwrap().clone()
    }

    #[tokio::test]
    async fn test_local_success_no_remote_attempt() {
        let local = backend(ExecutionPath::Local, true, || Ok(ok_metrics("local")), 1);
        let remote = backend(ExecutionPath::Remote, true, || Ok(ok_metrics("remote")), 0);
        let coordinator = FailoverCoordinator::new(local, Some(remote));

        let req = ExecutionRequest::new("print(1)", "python");
        let outcome = coordinator.run(&req, &python()).await;
        assert_eq!(outcome.path, Some(ExecutionPath::Local));
        assert_eq!(outcome.attempts, vec![ExecutionPath::Local]);
        assert_eq!(outcome.result.unwrap().stdout, "local");
        assert!(outcome.note.is_none());
    }

    #[tokio::test]
    async fn test_local_timeout_fails_over_to_remote() {
        let local = backend(ExecutionPath::Local, true, || Err(ExecError::timeout(1.0)), 1);
        let remote = backend(ExecutionPath::Remote, true, || Ok(ok_metrics("remote")), 1);
        let coordinator = FailoverCoordinator::new(local, Some(remote));

        let req = ExecutionRequest::new("x", "python");
        let outcome = coordinator.run(&req, &python()).await;
        assert_eq!(outcome.path, Some(ExecutionPath::Remote));
        assert_eq!(outcome.attempts, vec![ExecutionPath::Local, ExecutionPath::Remote]);
        assert!(outcome.result.is_ok());
        assert!(outcome.note.unwrap().contains("local execution failed"));
    }

    #[tokio::test]
    async fn test_compile_error_is_not_retried() {
        let local = backend(
            ExecutionPath::Local,
            true,
            || Err(ExecError::Compile { diagnostics: "expected ;".into() }),
            1,
        );
        let remote = backend(ExecutionPath::Remote, true, || Ok(ok_metrics("remote")), 0);
        let coordinator = FailoverCoordinator::new(local, Some(remote));

        let outcome = coordinator.run(&ExecutionRequest::new("x", "python"), &python()).await;
        let report = outcome.result.unwrap_err();
        assert_eq!(report.kind, ErrorKind::CompileError);
        assert_eq!(outcome.attempts, vec![ExecutionPath::Local]);
    }

    #[tokio::test]
    async fn test_remote_forced_but_unavailable_runs_locally() {
        let local = backend(ExecutionPath::Local, true, || Ok(ok_metrics("local")), 1);
        let remote = backend(ExecutionPath::Remote, false, || Ok(ok_metrics("remote")), 0);
        let coordinator = FailoverCoordinator::new(local, Some(remote));

        let req = ExecutionRequest::new("x", "python").with_mode(ExecutionMode::Remote);
        let outcome = coordinator.run(&req, &python()).await;
        assert_eq!(outcome.path, Some(ExecutionPath::Local));
        assert_eq!(outcome.attempts, vec![ExecutionPath::Local]);
    }

    #[tokio::test]
    async fn test_remote_forced_without_client_runs_locally() {
        let local = backend(ExecutionPath::Local, true, || Ok(ok_metrics("local")), 1);
        let coordinator = FailoverCoordinator::new(local, None);

        let req = ExecutionRequest::new("x", "python").with_mode(ExecutionMode::Remote);
        let outcome = coordinator.run(&req, &python()).await;
        assert_eq!(outcome.path, Some(ExecutionPath::Local));
        assert!(outcome.result.is_ok());
    }

    #[tokio::test]
    async fn test_both_fail_concatenates_diagnostics() {
        let local = backend(
            ExecutionPath::Local,
            true,
            || Err(ExecError::ToolchainUnavailable("python3 missing".into())),
            1,
        );
        let remote = backend(ExecutionPath::Remote, true, || Err(ExecError::Network("refused".into())), 1);
        let coordinator = FailoverCoordinator::new(local, Some(remote));

        let outcome = coordinator.run(&ExecutionRequest::new("x", "python"), &python()).await;
        let report = outcome.result.unwrap_err();
        assert_eq!(report.kind, ErrorKind::Network);
        let local_pos = report.message.find("python3 missing").unwrap();
        let remote_pos = report.message.find("refused").unwrap();
        assert!(local_pos < remote_pos);
        assert_eq!(outcome.attempts.len(), 2);
    }

    #[tokio::test]
    async fn test_never_more_than_one_hop() {
        let local = backend(ExecutionPath::Local, true, || Err(ExecError::timeout(1.0)), 1);
        let remote = backend(ExecutionPath::Remote, true, || Err(ExecError::timeout(1.0)), 1);
        let coordinator = FailoverCoordinator::new(local, Some(remote));

        let req = ExecutionRequest::new("x", "python").with_mode(ExecutionMode::Remote);
        let outcome = coordinator.run(&req, &python()).await;
        assert_eq!(outcome.attempts, vec![ExecutionPath::Remote, ExecutionPath::Local]);
        assert_eq!(outcome.result.unwrap_err().kind, ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn test_auto_prefers_remote_without_local_toolchain() {
        let local = backend(ExecutionPath::Local, false, || Ok(ok_metrics("local")), 0);
        let remote = backend(ExecutionPath::Remote, true, || Ok(ok_metrics("remote")), 1);
        let coordinator = FailoverCoordinator::new(local, Some(remote));

        let req = ExecutionRequest::new("x", "python").with_mode(ExecutionMode::Auto);
        let outcome = coordinator.run(&req, &python()).await;
        assert_eq!(outcome.path, Some(ExecutionPath::Remote));
        assert_eq!(outcome.attempts, vec![ExecutionPath::Remote]);
    }

    #[tokio::test]
    async fn test_auto_prefers_local_when_installed() {
        let local = backend(ExecutionPath::Local, true, || Ok(ok_metrics("local")), 1);
        let remote = backend(ExecutionPath::Remote, true, || Ok(ok_metrics("remote")), 0);
        let coordinator = FailoverCoordinator::new(local, Some(remote));

        let req = ExecutionRequest::new("x", "python").with_mode(ExecutionMode::Auto);
        let outcome = coordinator.run(&req, &python()).await;
        assert_eq!(outcome.path, Some(ExecutionPath::Local));
    }
}
