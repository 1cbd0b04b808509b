//! `CodeBench`: the request boundary tying registry, coordinator,
//! performance model, suggestions and history together.
//!
//! Nothing here is global. Binaries build one instance with
//! [`CodeBenchBuilder`] and share it behind an `Arc`.

use crate::backend::{ExecError, ExecutionBackend};
use crate::baselines::{BaselineError, Baselines};
use crate::deps::DependencyScanner;
use crate::engine::{effective_timeout, LocalEngine};
use crate::failover::{CoordinatedOutcome, FailoverCoordinator};
use crate::judge::{JudgeConfig, RemoteJudgeClient};
use crate::languages::{LanguageRegistry, RegistryError};
use crate::performance::{classify_complexity, BaselineComparison, PerformanceModel};
use crate::suggestions::SuggestionGenerator;
use async_trait::async_trait;
use codebench_common::config::Settings;
use codebench_common::history::{ExecutionHistoryStore, InMemoryHistory};
use codebench_common::types::{
    BenchmarkResult, ComplexityClass, ErrorKind, ExecutionRecord, ExecutionRequest, ExecutionResult,
    Language, OptimizationSuggestion,
};
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

/// Execution plus everything the performance model says about it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub execution: ExecutionResult,
    pub complexity: ComplexityClass,
    pub benchmark: Option<BenchmarkResult>,
    pub suggestions: Vec<OptimizationSuggestion>,
    pub recommendations: Vec<String>,
    pub baseline_comparison: Option<BaselineComparison>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeReview {
    pub summary: String,
    pub comments: Vec<String>,
    pub score: Option<f64>,
}

#[derive(Debug, Error)]
#[error("review failed: {0}")]
pub struct ReviewError(pub String);

/// Post-hoc review of a finished execution
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CodeReviewer: Send + Sync {
    async fn review(
        &self,
        code: &str,
        language: Language,
        result: &ExecutionResult,
    ) -> Result<CodeReview, ReviewError>;
}

#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Baselines(#[from] BaselineError),
    #[error("failed to open benchmark log in {path}: {source}")]
    DataDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to set up remote judge: {0}")]
    Remote(#[source] ExecError),
}

#[derive(Default)]
pub struct CodeBenchBuilder {
    registry: Option<LanguageRegistry>,
    local: Option<Arc<dyn ExecutionBackend>>,
    remote: Option<Arc<dyn ExecutionBackend>>,
    baselines: Option<Baselines>,
    performance: Option<Arc<PerformanceModel>>,
    history: Option<Arc<dyn ExecutionHistoryStore>>,
    reviewer: Option<Arc<dyn CodeReviewer>>,
    data_dir: Option<PathBuf>,
}

impl CodeBenchBuilder {
    /// Registry overrides, benchmark log directory and the remote judge
    /// (when a key is configured) taken from `settings`
    pub fn from_settings(settings: &Settings) -> Result<Self, SetupError> {
        let mut builder = Self::default();
        if let Some(path) = &settings.languages_config {
            builder.registry = Some(LanguageRegistry::with_overrides(path)?);
        }
        if let Some(path) = &settings.baselines_config {
            builder.baselines = Some(Baselines::from_file(path)?);
        }
        builder.data_dir = settings.data_dir.clone();
        if settings.remote_enabled() {
            let client = RemoteJudgeClient::new(JudgeConfig::from_settings(settings)).map_err(SetupError::Remote)?;
            info!(url = %settings.judge0_url, "Remote judge configured");
            builder.remote = Some(Arc::new(client));
        }
        Ok(builder)
    }

    pub fn registry(mut self, registry: LanguageRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn local_backend(mut self, backend: Arc<dyn ExecutionBackend>) -> Self {
        self.local = Some(backend);
        self
    }

    pub fn remote_backend(mut self, backend: Arc<dyn ExecutionBackend>) -> Self {
        self.remote = Some(backend);
        self
    }

    pub fn baselines(mut self, baselines: Baselines) -> Self {
        self.baselines = Some(baselines);
        self
    }

    pub fn performance(mut self, model: Arc<PerformanceModel>) -> Self {
        self.performance = Some(model);
        self
    }

    pub fn history(mut self, store: Arc<dyn ExecutionHistoryStore>) -> Self {
        self.history = Some(store);
        self
    }

    pub fn reviewer(mut self, reviewer: Arc<dyn CodeReviewer>) -> Self {
        self.reviewer = Some(reviewer);
        self
    }

    pub fn build(self) -> Result<CodeBench, SetupError> {
        let performance = match (self.performance, self.data_dir) {
            (Some(model), _) => model,
            (None, Some(dir)) => {
                let model = PerformanceModel::with_data_dir(self.baselines.unwrap_or_default(), &dir)
                    .map_err(|source| SetupError::DataDir { path: dir.display().to_string(), source })?;
                Arc::new(model)
            }
            (None, None) => Arc::new(PerformanceModel::new(self.baselines.unwrap_or_default())),
        };
        let local = self.local.unwrap_or_else(|| Arc::new(LocalEngine::new()));

        Ok(CodeBench {
            registry: Arc::new(self.registry.unwrap_or_default()),
            coordinator: FailoverCoordinator::new(local, self.remote),
            scanner: DependencyScanner::new(),
            performance,
            suggestions: SuggestionGenerator::new(),
            history: self.history.unwrap_or_else(|| Arc::new(InMemoryHistory::new())),
            reviewer: self.reviewer,
        })
    }
}

/// What one request produced before it is split into the public shapes
struct Processed {
    result: ExecutionResult,
    complexity: ComplexityClass,
    benchmark: Option<BenchmarkResult>,
    suggestions: Vec<OptimizationSuggestion>,
}

pub struct CodeBench {
    registry: Arc<LanguageRegistry>,
    coordinator: FailoverCoordinator,
    scanner: DependencyScanner,
    performance: Arc<PerformanceModel>,
    suggestions: SuggestionGenerator,
    history: Arc<dyn ExecutionHistoryStore>,
    reviewer: Option<Arc<dyn CodeReviewer>>,
}

impl CodeBench {
    pub fn builder() -> CodeBenchBuilder {
        CodeBenchBuilder::default()
    }

    pub fn registry(&self) -> &LanguageRegistry {
        &self.registry
    }

    pub fn performance(&self) -> &PerformanceModel {
        &self.performance
    }

    pub fn history(&self) -> &dyn ExecutionHistoryStore {
        self.history.as_ref()
    }

    pub fn has_remote(&self) -> bool {
        self.coordinator.has_remote()
    }

    /// Run and score a request. The benchmark log is not touched.
    pub async fn execute(&self, request: &ExecutionRequest) -> ExecutionResult {
        self.guarded(request, false).await.result
    }

    /// Run a request and, on success, record its benchmark
    pub async fn execute_with_analysis(&self, request: &ExecutionRequest) -> AnalysisReport {
        let processed = self.guarded(request, true).await;
        let recommendations = processed
            .benchmark
            .as_ref()
            .map(PerformanceModel::recommendations)
            .unwrap_or_default();
        let baseline_comparison = processed
            .benchmark
            .as_ref()
            .map(|b| self.performance.compare_with_baseline(b));

        AnalysisReport {
            execution: processed.result,
            complexity: processed.complexity,
            benchmark: processed.benchmark,
            suggestions: processed.suggestions,
            recommendations,
            baseline_comparison,
        }
    }

    /// Optional AI review; never affects the execution result
    pub async fn review(&self, code: &str, language: Language, result: &ExecutionResult) -> Option<CodeReview> {
        let reviewer = self.reviewer.as_ref()?;
        match reviewer.review(code, language, result).await {
            Ok(review) => Some(review),
            Err(e) => {
                warn!(language = %language, execution_id = %result.execution_id, "Code review failed: {}", e);
                None
            }
        }
    }

    async fn guarded(&self, request: &ExecutionRequest, record_benchmark: bool) -> Processed {
        match AssertUnwindSafe(self.process(request, record_benchmark)).catch_unwind().await {
            Ok(processed) => processed,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(language = %request.language, "Execution panicked: {}", message);
                let result = ExecutionResult::failure(
                    request.language.clone(),
                    ErrorKind::Internal,
                    format!("internal error: {}", message),
                );
                self.history.append(ExecutionRecord::from_result(&result));
                Processed {
                    complexity: classify_complexity(&request.source),
                    result,
                    benchmark: None,
                    suggestions: Vec::new(),
                }
            }
        }
    }

    #[instrument(skip(self, request), fields(language = %request.language, mode = %request.mode))]
    async fn process(&self, request: &ExecutionRequest, record_benchmark: bool) -> Processed {
        let complexity = classify_complexity(&request.source);

        let config = match self.registry.get(&request.language) {
            Ok(config) => config,
            Err(e) => {
                warn!("Rejected request: {}", e);
                let mut result = ExecutionResult::failure(request.language.clone(), e.kind(), e.to_string());
                result.optimization_suggestions = SuggestionGenerator::for_failure(&result);
                self.history.append(ExecutionRecord::from_result(&result));
                return Processed { result, complexity, benchmark: None, suggestions: Vec::new() };
            }
        };
        let language = config.language;
        let dependencies: Vec<String> = self.scanner.scan(&request.source, language).into_iter().collect();

        let outcome = self.coordinator.run(request, config).await;
        let mut result = base_result(language, &outcome, dependencies);

        let (benchmark, suggestions) = match outcome.result {
            Ok(metrics) => {
                let benchmark = if record_benchmark {
                    self.performance.analyze_execution(
                        &result.execution_id.to_string(),
                        &request.source,
                        language,
                        metrics.execution_time,
                        metrics.memory_usage,
                        None,
                    )
                } else {
                    self.performance
                        .assess(&request.source, language, metrics.execution_time, metrics.memory_usage, None)
                };
                let suggestions = self.suggestions.generate(&request.source, language, &benchmark);

                result.success = true;
                result.stdout = metrics.stdout;
                result.stderr = metrics.stderr;
                result.return_code = metrics.return_code;
                result.execution_time = metrics.execution_time;
                result.memory_usage = metrics.memory_usage;
                result.performance_score = benchmark.performance_score;
                result.optimization_suggestions = suggestions.iter().map(OptimizationSuggestion::summary).collect();
                (Some(benchmark), suggestions)
            }
            Err(report) => {
                if let Some(metrics) = report.metrics {
                    result.stdout = metrics.stdout;
                    result.stderr = metrics.stderr;
                    result.return_code = metrics.return_code;
                    result.execution_time = metrics.execution_time;
                    result.memory_usage = metrics.memory_usage;
                }
                if report.kind == ErrorKind::Timeout {
                    // The run was cut off at the limit
                    result.execution_time = effective_timeout(config, request).as_secs_f64();
                }
                result.error = Some(report.message);
                result.error_kind = Some(report.kind);
                result.optimization_suggestions = SuggestionGenerator::for_failure(&result);
                (None, Vec::new())
            }
        };

        info!(
            execution_id = %result.execution_id,
            success = result.success,
            path = ?result.path,
            execution_time_ms = (result.execution_time * 1000.0) as u64,
            score = result.performance_score,
            "Execution finished"
        );

        let mut record = ExecutionRecord::from_result(&result);
        if let Some(b) = &benchmark {
            record = record.with_benchmark(b);
        }
        self.history.append(record);

        Processed {
            complexity: benchmark.as_ref().map_or(complexity, |b| b.algorithm_complexity),
            result,
            benchmark,
            suggestions,
        }
    }
}

/// Result skeleton carrying the coordinator's bookkeeping; outcome fields
/// are filled in by the caller
fn base_result(language: Language, outcome: &CoordinatedOutcome, dependencies: Vec<String>) -> ExecutionResult {
    let mut result = ExecutionResult::failure(language.as_str(), ErrorKind::Internal, "pending");
    result.error = None;
    result.error_kind = None;
    result.return_code = 0;
    result.path = outcome.path;
    result.attempts = outcome.attempts.clone();
    result.dependencies_detected = dependencies;
    result.notes = outcome.note.iter().cloned().collect();
    result
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MockExecutionBackend, RawMetrics};
    use codebench_common::types::{ExecutionMode, ExecutionPath};

    fn local(result: fn() -> Result<RawMetrics, ExecError>) -> Arc<dyn ExecutionBackend> {
        let mut mock = MockExecutionBackend::new();
        mock.expect_path().return_const(ExecutionPath::Local);
        mock.expect_is_available().returning(|_| true);
        mock.expect_execute().returning(move |_, _| result());
        Arc::new(mock)
    }

    fn hello() -> Result<RawMetrics, ExecError> {
        Ok(RawMetrics {
            stdout: "Hello World!\n".to_string(),
            execution_time: 0.02,
            memory_usage: 8,
            ..Default::default()
        })
    }

    fn bench_with(backend: Arc<dyn ExecutionBackend>) -> (CodeBench, Arc<InMemoryHistory>) {
        let history = Arc::new(InMemoryHistory::new());
        let bench = CodeBench::builder()
            .local_backend(backend)
            .history(history.clone())
            .build()
            .unwrap();
        (bench, history)
    }

    #[tokio::test]
    async fn test_unsupported_language_lists_valid_ids() {
        let (bench, history) = bench_with(local(hello));
        let result = bench.execute(&ExecutionRequest::new("print(1)", "cobol")).await;
        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ErrorKind::UnsupportedLanguage));
        let error = result.error.unwrap();
        assert!(error.contains("python") && error.contains("csharp"));
        assert!(result.attempts.is_empty());
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn test_execute_scores_without_recording() {
        let (bench, history) = bench_with(local(hello));
        let req = ExecutionRequest::new("print('Hello World!')", "py");
        let result = bench.execute(&req).await;

        assert!(result.success);
        assert_eq!(result.language, "python");
        assert_eq!(result.stdout, "Hello World!\n");
        assert_eq!(result.return_code, 0);
        assert!(result.error.is_none());
        assert!((0.0..=100.0).contains(&result.performance_score));
        assert_eq!(result.attempts, vec![ExecutionPath::Local]);
        assert_eq!(result.path, Some(ExecutionPath::Local));
        assert!(bench.performance().is_empty());

        let records = history.recent(10);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].execution_id, result.execution_id);
        assert!(records[0].code_hash.is_some());
    }

    #[tokio::test]
    async fn test_analysis_records_benchmark() {
        let (bench, _) = bench_with(local(hello));
        let req = ExecutionRequest::new("print('Hello World!')", "python");
        let report = bench.execute_with_analysis(&req).await;

        assert!(report.execution.success);
        assert_eq!(report.complexity, ComplexityClass::Constant);
        let benchmark = report.benchmark.unwrap();
        assert_eq!(benchmark.execution_id, report.execution.execution_id.to_string());
        assert_eq!(benchmark.comparative_ranking, 50.0);
        assert!(!report.recommendations.is_empty());
        assert!(report.baseline_comparison.is_some());
        assert_eq!(bench.performance().len(), 1);
    }

    #[tokio::test]
    async fn test_runtime_error_keeps_output() {
        let (bench, _) = bench_with(local(|| {
            Err(ExecError::Runtime {
                message: "Runtime Error: ZeroDivisionError".to_string(),
                metrics: RawMetrics {
                    stdout: "before\n".to_string(),
                    stderr: "ZeroDivisionError".to_string(),
                    return_code: 1,
                    ..Default::default()
                },
            })
        }));
        let report = bench.execute_with_analysis(&ExecutionRequest::new("1/0", "python")).await;
        let result = report.execution;
        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ErrorKind::RuntimeError));
        assert_eq!(result.stdout, "before\n");
        assert_eq!(result.return_code, 1);
        assert!(report.benchmark.is_none());
        assert!(bench.performance().is_empty());
    }

    #[tokio::test]
    async fn test_timeout_has_failure_hints() {
        let (bench, _) = bench_with(local(|| Err(ExecError::timeout(1.0))));
        let result = bench.execute(&ExecutionRequest::new("while True: pass", "python")).await;
        assert_eq!(result.error_kind, Some(ErrorKind::Timeout));
        assert!(result.error.unwrap().contains("timed out"));
        assert!(result.optimization_suggestions[0].contains("infinite loops"));
    }

    #[tokio::test]
    async fn test_timeout_reports_the_limit_as_time() {
        let (bench, history) = bench_with(local(|| Err(ExecError::timeout(15.0))));
        let result = bench.execute(&ExecutionRequest::new("while True: pass", "python")).await;
        assert_eq!(result.error_kind, Some(ErrorKind::Timeout));
        assert_eq!(result.execution_time, 15.0);
        assert_eq!(history.recent(1)[0].execution_time, 15.0);

        let request = ExecutionRequest::new("while True: pass", "python").with_timeout_secs(2);
        assert_eq!(bench.execute(&request).await.execution_time, 2.0);
    }

    #[tokio::test]
    async fn test_forced_remote_without_client_runs_locally() {
        let (bench, _) = bench_with(local(hello));
        let req = ExecutionRequest::new("print('Hello World!')", "python").with_mode(ExecutionMode::Remote);
        let result = bench.execute(&req).await;
        assert!(result.success);
        assert_eq!(result.attempts, vec![ExecutionPath::Local]);
    }

    #[tokio::test]
    async fn test_failover_note_attached() {
        let mut remote = MockExecutionBackend::new();
        remote.expect_path().return_const(ExecutionPath::Remote);
        remote.expect_is_available().returning(|_| true);
        remote.expect_execute().returning(|_, _| hello());

        let bench = CodeBench::builder()
            .local_backend(local(|| Err(ExecError::ToolchainUnavailable("python3 not found".into()))))
            .remote_backend(Arc::new(remote))
            .build()
            .unwrap();
        let result = bench.execute(&ExecutionRequest::new("print(1)", "python")).await;
        assert!(result.success);
        assert_eq!(result.path, Some(ExecutionPath::Remote));
        assert_eq!(result.notes.len(), 1);
        assert!(result.notes[0].contains("local execution failed"));
    }

    struct Exploding;

    #[async_trait]
    impl ExecutionBackend for Exploding {
        fn path(&self) -> ExecutionPath {
            ExecutionPath::Local
        }

        async fn is_available(&self, _config: &crate::languages::LanguageConfig) -> bool {
            true
        }

        async fn execute(
            &self,
            _request: &ExecutionRequest,
            _config: &crate::languages::LanguageConfig,
        ) -> Result<RawMetrics, ExecError> {
            panic!("backend exploded")
        }
    }

    #[tokio::test]
    async fn test_panic_becomes_internal_failure() {
        let (bench, history) = bench_with(Arc::new(Exploding));
        let result = bench.execute(&ExecutionRequest::new("print(1)", "python")).await;
        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ErrorKind::Internal));
        assert!(result.error.unwrap().contains("backend exploded"));
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn test_review_failure_is_swallowed() {
        let mut reviewer = MockCodeReviewer::new();
        reviewer
            .expect_review()
            .returning(|_, _, _| Err(ReviewError("model offline".to_string())));
        let bench = CodeBench::builder()
            .local_backend(local(hello))
            .reviewer(Arc::new(reviewer))
            .build()
            .unwrap();
        let result = bench.execute(&ExecutionRequest::new("print(1)", "python")).await;
        assert!(bench.review("print(1)", Language::Python, &result).await.is_none());
        assert!(result.success);
    }

    #[tokio::test]
    async fn test_review_without_reviewer() {
        let (bench, _) = bench_with(local(hello));
        let result = ExecutionResult::failure("python", ErrorKind::Internal, "x");
        assert!(bench.review("print(1)", Language::Python, &result).await.is_none());
    }

    #[test]
    fn test_data_dir_builds_persistent_model() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings { data_dir: Some(dir.path().to_path_buf()), ..Settings::default() };
        let bench = CodeBenchBuilder::from_settings(&settings).unwrap().build().unwrap();
        assert!(!bench.has_remote());
        bench.performance().analyze("print(1)", Language::Python, 0.01, 5, None);
        assert!(dir.path().join(crate::performance::BENCHMARK_LOG_FILE).exists());
    }

    #[test]
    fn test_baselines_file_from_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("baselines.json");
        std::fs::write(&path, r#"{"python": {"time": {"O(1)": 0.5}}}"#).unwrap();
        let settings = Settings { baselines_config: Some(path), ..Settings::default() };
        let bench = CodeBenchBuilder::from_settings(&settings).unwrap().build().unwrap();
        let (time, _) = bench.performance().baselines().lookup(Language::Python, ComplexityClass::Constant);
        assert_eq!(time, 0.5);

        let missing = Settings { baselines_config: Some(dir.path().join("nope.json")), ..Settings::default() };
        assert!(matches!(CodeBenchBuilder::from_settings(&missing), Err(SetupError::Baselines(_))));
    }
}
